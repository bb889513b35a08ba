//! User-facing alerts.
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::error;

/// What happens once the user acknowledges an [`Alert`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Acknowledge {
    Dismiss,
    /// Reload the application from the server, discarding all client-side state.
    Reload,
}

/// A blocking error message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alert {
    pub message: String,
    /// Whether clicking outside the dialog dismisses it.
    pub close_on_click_modal: bool,
    pub on_acknowledge: Acknowledge,
}

impl Alert {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            close_on_click_modal: true,
            on_acknowledge: Acknowledge::Dismiss,
        }
    }

    pub fn session_expired(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            close_on_click_modal: false,
            on_acknowledge: Acknowledge::Reload,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn alert(&self, alert: Alert);
}

/// Writes alerts to the log; used when nothing better is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, alert: Alert) {
        let Alert {
            message,
            on_acknowledge,
            ..
        } = alert;
        error!("{message} (on acknowledge: {on_acknowledge:?})");
    }
}

/// Keeps every alert so that it can be inspected later.
#[derive(Debug, Default)]
pub struct RecordingNotifier(Mutex<Vec<Alert>>);

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|a| a.message.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Alert>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, alert: Alert) {
        self.lock().push(alert);
    }
}
