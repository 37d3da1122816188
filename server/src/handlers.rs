use std::sync::Arc;

use anyhow::Result;
use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use warp::filters::path::FullPath;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Buf, Reply};

use payload_auth::{unix_time, AuthError, TokenParams};

use crate::storage::{Owner, PayloadWriter};
use crate::ServerConfig;

pub async fn post(
    config: Arc<ServerConfig>,
    path: FullPath,
    query: String,
    body: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
) -> Response {
    process_result(post_internal(config, path, query, body).await)
}

async fn post_internal(
    config: Arc<ServerConfig>,
    path: FullPath,
    query: String,
    body: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
) -> Result<impl Reply> {
    let uri = full_uri(&path, &query);
    info!("POST {uri}");

    store_payload(&config, Owner::Anonymous, body).await
}

pub async fn put(
    config: Arc<ServerConfig>,
    path: FullPath,
    query: String,
    body: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
) -> Response {
    process_result(put_internal(config, path, query, body).await)
}

async fn put_internal(
    config: Arc<ServerConfig>,
    path: FullPath,
    query: String,
    body: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
) -> Result<impl Reply> {
    let uri = full_uri(&path, &query);
    info!("PUT {uri}");

    let params = TokenParams::split(&uri)?.ok_or(AuthError::Unauthenticated)?;
    let password = config
        .accounts
        .get(params.login())
        .ok_or(AuthError::UnknownLogin)?;
    params.verify(password, &config.allowed_hosts)?;

    info!("Token OK for {}, resource: {}", params.login(), params.uri());

    store_payload(&config, Owner::Account(params.login()), body).await
}

async fn store_payload(
    config: &ServerConfig,
    owner: Owner<'_>,
    body: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
) -> Result<impl Reply> {
    let mut writer = PayloadWriter::create(&config.storage_path).await?;
    if let Err(err) = write_body(&mut writer, body).await {
        error!("Payload write error from {owner}: {:?}", err);
        writer.discard().await?;
        return Err(err);
    }
    debug!("Received {} bytes from {owner}", writer.size());
    writer
        .persist(&config.storage_path, owner, unix_time()?)
        .await?;

    Ok(warp::reply::with_status("OK", StatusCode::OK))
}

async fn write_body(
    writer: &mut PayloadWriter,
    mut body: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
) -> Result<()> {
    while let Some(buf) = body.next().await {
        let mut buf = buf?;
        while buf.has_remaining() {
            let chunk = buf.chunk();
            let len = chunk.len();
            writer.write(chunk).await?;
            buf.advance(len);
        }
    }
    Ok(())
}

/// Path and query as received, the way the client signed them.
fn full_uri(path: &FullPath, query: &str) -> String {
    if query.is_empty() {
        path.as_str().to_string()
    } else {
        format!("{}?{}", path.as_str(), query)
    }
}

fn status_of(error: &anyhow::Error) -> StatusCode {
    match error.downcast_ref::<AuthError>() {
        Some(AuthError::MissingParams | AuthError::InvalidTime | AuthError::InvalidEncoding(_)) => {
            StatusCode::BAD_REQUEST
        }
        Some(AuthError::Clock) | None => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::FORBIDDEN,
    }
}

fn process_result(result: Result<impl Reply>) -> Response {
    match result {
        Ok(res) => res.into_response(),
        Err(error) => {
            let status = status_of(&error);
            if status.is_server_error() {
                error!("{}", error);
            } else {
                warn!("Rejected: {}", error);
            }
            warp::reply::with_status(error.to_string(), status).into_response()
        }
    }
}
