use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_SEED_URL: &str = "https://dummyjson.com/todos";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Recognised network-layer conditions, each with a stable reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCode {
    TimedOut,
    CannotConnect,
    ConnectionLost,
    TooManyRedirects,
}

impl TransportCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportCode::TimedOut => "timed_out",
            TransportCode::CannotConnect => "cannot_connect",
            TransportCode::ConnectionLost => "connection_lost",
            TransportCode::TooManyRedirects => "too_many_redirects",
        }
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome classes of a single GET. None of them are retried here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network request failed ({0})")]
    TransportSpecific(TransportCode),
    #[error("network request failed: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
    #[error("server responded with status {0}")]
    Server(u16),
    #[error("server returned an empty body")]
    NoData,
    #[error("reply was not a well-formed HTTP response")]
    Unknown,
}

/// Where seed data comes from. The HTTP client is the production source.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Raw body of one successful fetch.
    async fn fetch(&self) -> Result<Vec<u8>, FetchError>;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;
}

pub struct HttpFetchClient {
    client: reqwest::Client,
    url: String,
}

impl HttpFetchClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tasklist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| FetchError::Transport(Box::new(err)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteSource for HttpFetchClient {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            let classified = classify(err);
            error!(target: "tasklist", event = "fetch_failed", url = %self.url, error = %classified);
            classified
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                target: "tasklist",
                event = "fetch_server_error",
                url = %self.url,
                status = status.as_u16()
            );
            return Err(FetchError::Server(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|err| {
            let classified = classify(err);
            error!(target: "tasklist", event = "fetch_body_failed", url = %self.url, error = %classified);
            classified
        })?;
        if body.is_empty() {
            error!(target: "tasklist", event = "fetch_no_data", url = %self.url);
            return Err(FetchError::NoData);
        }

        info!(
            target: "tasklist",
            event = "fetch_ok",
            url = %self.url,
            status = status.as_u16(),
            bytes = body.len()
        );
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn io_source<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a io::Error> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err);
        }
        current = e.source();
    }
    None
}

fn classify_io(kind: io::ErrorKind) -> Option<TransportCode> {
    match kind {
        io::ErrorKind::TimedOut => Some(TransportCode::TimedOut),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => {
            Some(TransportCode::CannotConnect)
        }
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(TransportCode::ConnectionLost),
        _ => None,
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::TransportSpecific(TransportCode::TimedOut);
    }
    if err.is_connect() {
        return FetchError::TransportSpecific(TransportCode::CannotConnect);
    }
    if err.is_redirect() {
        return FetchError::TransportSpecific(TransportCode::TooManyRedirects);
    }
    if let Some(kind) = io_source(&err).map(io::Error::kind) {
        return match classify_io(kind) {
            Some(code) => FetchError::TransportSpecific(code),
            None => FetchError::Transport(Box::new(err)),
        };
    }
    // The request went out but what came back could not be parsed as HTTP.
    if err.is_request() {
        return FetchError::Unknown;
    }
    FetchError::Transport(Box::new(err))
}
