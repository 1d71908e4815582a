//! User-visible diagnostic channel.
//!
//! The dashboard shell surfaces these as toast notifications; this core
//! only defines the seam and a tracing-backed default for headless use.

use tracing::warn;

/// Sink for user-visible diagnostics: a fixed label plus a detail string
/// derived from the underlying error.
pub trait Notifier: Send + Sync {
    fn notify(&self, label: &str, detail: &str);
}

/// Notifier that reports through the log stream instead of a UI surface.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, label: &str, detail: &str) {
        warn!(notice = label, detail, "user-visible diagnostic");
    }
}
