pub mod consts;
pub mod hasher;

use std::ops::Deref;
use std::time::SystemTime;

use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::consts::*;
use crate::hasher::Hasher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("The following three parameters must be set together (for authorization): gbLogin, gbToken, gbTime")]
    MissingParams,
    #[error("Parameter gbTime is incorrect. It must be unsigned integer - number of seconds since epoch")]
    InvalidTime,
    #[error("URL formatted incorrectly: {0}")]
    InvalidEncoding(String),
    #[error("The time window for the token has expired ({0} seconds). Client's and server's clocks must be synchronized.")]
    Expired(u64),
    #[error("There is no user with given login")]
    UnknownLogin,
    #[error("Wrong password")]
    WrongPassword,
    #[error("You have no privileges to send HTTP PUT requests.")]
    Unauthenticated,
    #[error("System clock is set before unix epoch")]
    Clock,
}

/// SHA1 hex of login followed by password. Never sent over the wire.
pub fn identity(login: &str, password: &str) -> String {
    Hasher::new().chain(login).chain(password).finalize_hex()
}

/// SHA1 hex of url, identity and the decimal timestamp, in that order.
pub fn token(url: &str, identity: &str, time: &str) -> String {
    Hasher::new()
        .chain(url)
        .chain(identity)
        .chain(time)
        .finalize_hex()
}

pub fn unix_time() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .map_err(|_| AuthError::Clock)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    url: String,
    login: String,
    time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    request: TokenRequest,
    token: String,
}

impl TokenRequest {
    pub fn with_time(url: String, login: String, time: u64) -> Self {
        Self { url, login, time }
    }

    pub fn new(url: String, login: String) -> Result<Self, AuthError> {
        Ok(Self::with_time(url, login, unix_time()?))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn sign(self, password: &str) -> SignedRequest {
        let identity = identity(&self.login, password);
        let token = token(&self.url, &identity, &self.time.to_string());

        SignedRequest {
            request: self,
            token,
        }
    }
}

impl SignedRequest {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The request URL with the token parameters appended.
    ///
    /// The base URL is expected to carry a query string already, the
    /// parameters are always joined with `&` and the login is not escaped.
    pub fn signed_url(&self) -> String {
        format!(
            "{}&{PARAM_LOGIN}={}&{PARAM_TIME}={}&{PARAM_TOKEN}={}",
            self.request.url, self.request.login, self.request.time, self.token
        )
    }
}

impl Deref for SignedRequest {
    type Target = TokenRequest;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

/// Token parameters taken off a received request URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    uri: String,
    login: String,
    time: String,
    token: String,
}

impl TokenParams {
    /// Splits `gbLogin`, `gbTime` and `gbToken` off the tail of `full_uri`
    /// (path and query of the received request).
    ///
    /// Segments are scanned backwards from the end until all three are found.
    /// The remaining URI ends right before the `&` that started the earliest
    /// consumed segment, or right after it when that separator is `?`.
    /// Returns `Ok(None)` when the URI carries none of the three.
    pub fn split(full_uri: &str) -> Result<Option<Self>, AuthError> {
        let mut login = None;
        let mut time = None;
        let mut token = None;
        let mut end = full_uri.len();
        let mut cut = None;

        for (pos, separator) in full_uri.char_indices().rev() {
            if pos == 0 {
                break;
            }
            if separator != '&' && separator != '?' {
                continue;
            }

            let segment = &full_uri[pos + 1..end];
            if let Some(value) = param_value(segment, PARAM_LOGIN) {
                login = Some(value);
            } else if let Some(value) = param_value(segment, PARAM_TOKEN) {
                token = Some(value);
            } else if let Some(value) = param_value(segment, PARAM_TIME) {
                time = Some(value);
            }
            end = pos;

            if login.is_some() && time.is_some() && token.is_some() {
                cut = Some(if separator == '?' { pos + 1 } else { pos });
                break;
            }
            if separator == '?' {
                break;
            }
        }

        let (Some(login), Some(time), Some(token), Some(cut)) = (login, time, token, cut) else {
            return if login.is_none() && time.is_none() && token.is_none() {
                Ok(None)
            } else {
                Err(AuthError::MissingParams)
            };
        };

        let params = Self {
            uri: full_uri[..cut].to_string(),
            login: url_decode(login)?,
            time: url_decode(time)?,
            token: url_decode(token)?,
        };
        params.time_secs()?;

        Ok(Some(params))
    }

    /// Request URI with the token parameters removed.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn time_secs(&self) -> Result<u64, AuthError> {
        self.time.parse().map_err(|_| AuthError::InvalidTime)
    }

    pub fn verify(&self, password: &str, allowed_hosts: &[String]) -> Result<(), AuthError> {
        self.verify_at(password, allowed_hosts, unix_time()?)
    }

    /// Checks the token against every allowed host, over both `http` and `https`.
    pub fn verify_at(
        &self,
        password: &str,
        allowed_hosts: &[String],
        now: u64,
    ) -> Result<(), AuthError> {
        let time_diff = now.abs_diff(self.time_secs()?);
        if time_diff > MAX_CLIENT_TIME_DIFF {
            return Err(AuthError::Expired(time_diff));
        }

        let identity = identity(&self.login, password);
        let authenticated = allowed_hosts
            .iter()
            .flat_map(|host| ["http://", "https://"].map(|scheme| format!("{scheme}{host}{}", self.uri)))
            .any(|url| token(&url, &identity, &self.time) == self.token);

        if authenticated {
            Ok(())
        } else {
            Err(AuthError::WrongPassword)
        }
    }
}

fn param_value<'a>(segment: &'a str, name: &str) -> Option<&'a str> {
    segment.strip_prefix(name)?.strip_prefix('=')
}

fn url_decode(fragment: &str) -> Result<String, AuthError> {
    percent_decode_str(fragment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|err| AuthError::InvalidEncoding(err.to_string()))
}
