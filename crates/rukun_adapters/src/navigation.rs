use std::sync::{Mutex, PoisonError};

use rukun_core::ports::Navigator;
use tracing::info;

/// Navigator for headless front ends: logs the redirect and remembers it so
/// the caller can tell the user what to do next.
#[derive(Default)]
pub struct LoggingNavigator {
    pending: Mutex<Option<String>>,
}

impl LoggingNavigator {
    /// Take the last requested route, if any
    pub fn take_redirect(&self) -> Option<String> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Navigator for LoggingNavigator {
    fn navigate_to(&self, route: &str) {
        info!(route, "redirecting");
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(route.to_string());
    }
}
