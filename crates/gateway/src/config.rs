//! Gateway configuration

use std::{env, time::Duration};

use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, TransportError};

pub const API_URL_VAR: &str = "PORTAL_API_URL";
pub const TIMEOUT_VAR: &str = "PORTAL_API_TIMEOUT_MS";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Prefix for every relative request path
    pub base_url: Url,

    /// Limit for a whole request, response body included
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Keep and send cookies set by the backend
    #[serde(default = "default_with_credentials")]
    pub with_credentials: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl GatewayConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            with_credentials: default_with_credentials(),
            user_agent: default_user_agent(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var(API_URL_VAR).map_err(|_| ConfigError::Missing(API_URL_VAR))?;
        let base_url = Url::parse(&base_url).map_err(|source| ConfigError::InvalidUrl {
            var: API_URL_VAR,
            source,
        })?;
        let timeout = env::var(TIMEOUT_VAR)
            .ok()
            .map(|t| t.parse())
            .transpose()
            .map_err(|source| ConfigError::InvalidTimeout {
                var: TIMEOUT_VAR,
                source,
            })?;

        debug!("Building gateway config for {base_url} from env");
        let config = Self::new(base_url);
        Ok(match timeout {
            Some(ms) => config.with_timeout(Duration::from_millis(ms)),
            None => config,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Combine the base URL with a request path.
    ///
    /// Absolute URLs are used as they are. Relative paths are appended to the base URL, so a
    /// base of `http://host/api` and a path of `/users` yield `http://host/api/users`.
    pub fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        let combined = if is_absolute(path) {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Url::parse(&combined)
            .map_err(|e| TransportError::InvalidRequest(format!("{combined}: {e}")))
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_with_credentials() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("portal/{}", env!("CARGO_PKG_VERSION"))
}
