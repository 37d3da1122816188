use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use warp::reply::Response;
use warp::{Filter, Rejection};

mod handlers;
mod storage;

#[derive(Debug, serde::Deserialize)]
pub struct ServerConfig {
    listen_addr: SocketAddr,
    max_payload_size: u64,
    storage_path: PathBuf,
    /// Hosts (with port when not default) the signing clients address.
    allowed_hosts: Vec<String>,
    /// Login to password.
    accounts: HashMap<String, String>,
}

impl ServerConfig {
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read server config file {path:?}"))?;
        let mut config: ServerConfig =
            serde_json::from_str(&content).context("Failed to parse server config file")?;

        std::fs::create_dir_all(&config.storage_path)?;
        config.storage_path = config
            .storage_path
            .canonicalize()
            .context("Failed to canonicalize storage path")?;

        Ok(config)
    }
}

/// Raw query string, empty when the request has none.
fn raw_query() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::query::raw().or_else(|_| async { Ok::<_, Rejection>((String::new(),)) })
}

pub fn routes(
    config: Arc<ServerConfig>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let max_payload_size = config.max_payload_size;
    let with_config = warp::any().map(move || config.clone());

    let put = warp::put()
        .and(with_config.clone())
        .and(warp::path::full())
        .and(raw_query())
        .and(warp::body::content_length_limit(max_payload_size))
        .and(warp::body::stream())
        .then(handlers::put);

    let post = warp::post()
        .and(with_config)
        .and(warp::path::full())
        .and(raw_query())
        .and(warp::body::content_length_limit(max_payload_size))
        .and(warp::body::stream())
        .then(handlers::post);

    put.or(post).unify()
}

#[tokio::main]
async fn main() {
    log4rs::init_file("log_config.yml", Default::default()).expect("Error initializing logging");

    let config = Arc::new(ServerConfig::load("server_config.json").expect("Failed to load server config"));
    let listen_addr = config.listen_addr;

    let (addr, web_server) =
        warp::serve(routes(config)).bind_with_graceful_shutdown(listen_addr, async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen to shutdown signal");
            info!("CTRL+C received");
        });

    let web_server_task = tokio::task::spawn(web_server);

    info!("Started payload receiver on {addr}");

    tokio::join!(web_server_task).0.expect("Failed to run task");

    info!("Gracefully shut down");
}
