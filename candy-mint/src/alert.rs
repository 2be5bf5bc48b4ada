//! Alert Slot
//!
//! A single user-visible alert. Every new event overwrites the previous one;
//! alerts are never queued.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Alert severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
    #[default]
    None,
}

/// The alert shown to the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub visible: bool,
    pub message: String,
    pub severity: Severity,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            visible: true,
            message: message.into(),
            severity,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Latest-wins alert cell shared with UI bindings
#[derive(Debug)]
pub struct AlertSlot {
    tx: watch::Sender<Alert>,
}

impl Default for AlertSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Alert::default());
        Self { tx }
    }

    /// Replace the current alert
    pub fn show(&self, alert: Alert) {
        self.tx.send_replace(alert);
    }

    /// Hide the current alert, keeping its text
    pub fn dismiss(&self) {
        self.tx.send_modify(|alert| alert.visible = false);
    }

    pub fn current(&self) -> Alert {
        self.tx.borrow().clone()
    }

    /// Watch for alert changes
    pub fn subscribe(&self) -> watch::Receiver<Alert> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_alert_wins() {
        let slot = AlertSlot::new();
        assert!(!slot.current().visible);
        assert_eq!(slot.current().severity, Severity::None);

        slot.show(Alert::success("first"));
        slot.show(Alert::error("second"));

        let current = slot.current();
        assert_eq!(current.message, "second");
        assert_eq!(current.severity, Severity::Error);
    }

    #[test]
    fn test_dismiss_keeps_message() {
        let slot = AlertSlot::new();
        slot.show(Alert::warning("careful"));
        slot.dismiss();

        let current = slot.current();
        assert!(!current.visible);
        assert_eq!(current.message, "careful");
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let slot = AlertSlot::new();
        let mut rx = slot.subscribe();

        slot.show(Alert::info("hello"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().message, "hello");
    }
}
