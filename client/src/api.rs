use std::fmt;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use thiserror::Error;

use payload_auth::{AuthError, SignedRequest, TokenRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Post => f.write_str("POST"),
            Method::Put => f.write_str("PUT"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("Error for {method} requests: {body}")]
    HttpStatus {
        method: Method,
        status: StatusCode,
        body: String,
    },
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub trait Api {
    fn post(&self, url: &str, payload: Vec<u8>) -> Result<String, ApiError>;
    fn put(&self, request: &SignedRequest, payload: Vec<u8>) -> Result<String, ApiError>;
}

/// Signs `url` with the current time and sends the payload with PUT.
pub fn put_with_token(
    api: &impl Api,
    url: &str,
    payload: Vec<u8>,
    login: &str,
    password: &str,
) -> Result<String, ApiError> {
    let request = TokenRequest::new(url.to_string(), login.to_string())?.sign(password);
    api.put(&request, payload)
}

/// Prefixes `http://` unless the URL already names the http or https scheme.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// `None` keeps requests unbounded in time.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

impl Api for HttpClient {
    fn post(&self, url: &str, payload: Vec<u8>) -> Result<String, ApiError> {
        info!("POST {url}, {} bytes", payload.len());

        let response = self.client.post(url).body(payload).send()?;

        response_text(Method::Post, response)
    }

    fn put(&self, request: &SignedRequest, payload: Vec<u8>) -> Result<String, ApiError> {
        info!(
            "PUT {} as {}, time: {}, {} bytes",
            request.url(),
            request.login(),
            request.time(),
            payload.len()
        );

        let response = self
            .client
            .put(request.signed_url())
            .body(payload)
            .send()?;

        response_text(Method::Put, response)
    }
}

fn response_text(method: Method, response: Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text()?;
    debug!("{method} response status: {status}");

    if status != StatusCode::OK {
        return Err(ApiError::HttpStatus {
            method,
            status,
            body,
        });
    }

    Ok(body)
}
