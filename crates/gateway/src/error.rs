//! Error types for the gateway.

use std::{
    fmt::{Display, Formatter},
    num::ParseIntError,
    path::PathBuf,
    time::Duration,
};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The code used in a [`Rejection`] when the request never produced a usable response.
pub const TRANSPORT_FAILURE: i64 = -1;

/// The error value handed to callers of the convenience methods.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rejection {
    pub code: i64,
    pub msg: String,
}

impl Rejection {
    pub fn new(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    pub fn transport(error: &TransportError) -> Self {
        Self::new(TRANSPORT_FAILURE, error.to_string())
    }

    pub fn is_transport_failure(&self) -> bool {
        self.code == TRANSPORT_FAILURE
    }

    /// True for codes in `[400, 500)`, the range where the server message is shown verbatim.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Self { code, msg } = self;
        write!(f, "({code}) {msg}")
    }
}

impl std::error::Error for Rejection {}

impl From<TransportError> for Rejection {
    fn from(error: TransportError) -> Self {
        Self::transport(&error)
    }
}

/// Failures below the envelope level, as seen by the interceptors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    #[error("Request failed with status code {}", .0.as_u16())]
    Status(StatusCode),

    #[error("Network Error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Request cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Network(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not infer a data directory")]
    NoDataDir,

    #[error("Could not access storage at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage at {path:?} is corrupt, consider removing it: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} is not a number of milliseconds: {source}")]
    InvalidTimeout {
        var: &'static str,
        #[source]
        source: ParseIntError,
    },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to create reqwest client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Failed to read session storage: {0}")]
    Storage(#[from] StoreError),
}
