//! The `{code, msg, data}` shape every JSON endpoint of the backend answers with.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::Rejection;

pub const SUCCESS: i64 = 200;
pub const SESSION_INVALID: i64 = 403;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS
    }

    pub fn is_session_invalid(&self) -> bool {
        self.code == SESSION_INVALID
    }

    /// Codes that `post`, `put` and `del` hand back to the caller instead of rejecting.
    ///
    /// A session-invalid response is accepted here because the global sign-out flow has
    /// already dealt with it.
    pub fn is_accepted(&self) -> bool {
        self.is_success() || self.is_session_invalid()
    }

    pub fn rejection(&self) -> Rejection {
        Rejection::new(self.code, self.msg.clone())
    }

    pub fn decode_data<T>(self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.data)
    }
}
