//! Hooks applied to every request on its way out and every response on its way back.

use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::{header::HeaderValue, RequestBuilder};
use serde_json::Value;

use crate::{
    cancel::CancelHandle,
    envelope::ResponseEnvelope,
    error::TransportError,
    notifier::Alert,
    store::{TOKEN_KEY, USER_INFO_KEY},
    RequestGateway,
};

/// Carries the stored auth token.
pub const TOKEN_HEADER: &str = "token";

/// A response that passed transport-level validation, body fully read.
pub(crate) struct RawResponse {
    pub(crate) body: Bytes,
}

impl RawResponse {
    pub(crate) fn envelope(&self) -> Result<ResponseEnvelope, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as JSON whatever it holds: empty is `null`, anything unparsable a string.
    pub(crate) fn json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }

    fn peek_envelope(&self) -> Option<ResponseEnvelope> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl RequestGateway {
    /// Register the request's cancel handle and stamp the auth token on it.
    ///
    /// An empty stored token counts as no token.
    pub(crate) fn on_request(
        &self,
        builder: RequestBuilder,
        handle: &CancelHandle,
    ) -> Result<reqwest::Request, TransportError> {
        self.registry.register(handle.clone());
        let token = self.store.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let builder = match token {
            Some(token) => {
                let value = HeaderValue::from_str(&token).map_err(|e| {
                    TransportError::InvalidRequest(format!("{TOKEN_HEADER} header: {e}"))
                })?;
                builder.header(TOKEN_HEADER, value)
            }
            None => builder,
        };
        builder
            .build()
            .map_err(|e| TransportError::from_reqwest(e, self.config.timeout))
    }

    /// Watch for the session-invalid code and swallow cancellations.
    ///
    /// A cancelled request never completes: the returned future stays pending forever, so the
    /// caller neither sees an error nor triggers any error handling of its own.
    pub(crate) async fn on_response(
        &self,
        outcome: Result<RawResponse, TransportError>,
    ) -> Result<RawResponse, TransportError> {
        match outcome {
            Ok(response) => {
                if let Some(envelope) = response
                    .peek_envelope()
                    .filter(ResponseEnvelope::is_session_invalid)
                {
                    self.invalidate_session(&envelope.msg);
                }
                Ok(response)
            }
            Err(e) if e.is_cancel() => {
                debug!("Request cancelled, suspending it indefinitely");
                std::future::pending().await
            }
            Err(e) => Err(e),
        }
    }

    fn invalidate_session(&self, message: &str) {
        info!("Backend rejected the session, signing out");
        for key in [TOKEN_KEY, USER_INFO_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Could not remove {key} from storage: {e}");
            }
        }
        self.session.clear();
        self.cancel_all();
        self.notifier.alert(Alert::session_expired(message));
    }
}
