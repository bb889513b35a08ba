//! The in-memory mirror of the signed-in session.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::warn;
use serde_json::Value;

use crate::{
    error::StoreError,
    store::{SessionStore, TOKEN_KEY, USER_INFO_KEY},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user_info: Option<Value>,
}

/// Shared handle to the current [`Session`]; clones observe the same session.
#[derive(Clone, Debug, Default)]
pub struct SessionState(Arc<Mutex<Session>>);

impl SessionState {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Seed the state from durable storage.
    ///
    /// A stored user profile that is not valid JSON is ignored.
    pub fn load(store: &dyn SessionStore) -> Result<Self, StoreError> {
        let token = store.get(TOKEN_KEY)?;
        let user_info = match store.get(USER_INFO_KEY)? {
            Some(text) => match serde_json::from_str(&text) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Ignoring stored {USER_INFO_KEY} because it could not be parsed: {e}");
                    None
                }
            },
            None => None,
        };
        Ok(Self::new(Session { token, user_info }))
    }

    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn clear(&self) {
        *self.lock() = Session::default();
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().token.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
