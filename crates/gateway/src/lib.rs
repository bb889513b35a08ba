//! A request gateway for the portal backend.
//!
//! Every call goes through [`RequestGateway`], which stamps the stored auth token and the
//! language header on outgoing requests, registers each request with a [`CancelRegistry`], and
//! watches responses for the backend's session-invalid code.
pub mod cancel;
pub mod config;
pub mod envelope;
pub mod error;
mod gateway;
mod interceptor;
pub mod locale;
pub mod notifier;
pub mod session;
pub mod store;

pub use cancel::{CancelHandle, CancelRegistry};
pub use config::GatewayConfig;
pub use envelope::ResponseEnvelope;
pub use error::{BuildError, ConfigError, Rejection, StoreError, TransportError};
pub use gateway::{GatewayBuilder, RequestGateway, REMOTE_SERVER_ERROR};
pub use interceptor::TOKEN_HEADER;
pub use locale::{Locale, LANGUAGE_HEADER};
pub use notifier::{Acknowledge, Alert, LogNotifier, Notifier, RecordingNotifier};
pub use session::{Session, SessionState};
pub use store::{FileStore, MemoryStore, SessionStore};
