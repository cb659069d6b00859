//! Transient user notifications.
//!
//! Every notification is logged when raised and kept for a short time so
//! the caller can render what is still live.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use uuid::Uuid;

/// How long a notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationKind {
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationKind::Success => "✓",
            NotificationKind::Error => "✕",
            NotificationKind::Warning => "⚠",
            NotificationKind::Info => "ℹ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub raised_at: Instant,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.icon(), self.message)
    }
}

/// Queue of live notifications.
pub struct Notifier {
    items: Vec<Notification>,
    ttl: Duration,
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_ttl(NOTIFICATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            ttl,
        }
    }

    /// Raise a notification and return its id.
    pub fn show(&mut self, message: impl Into<String>, kind: NotificationKind) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            message: message.into(),
            kind,
            raised_at: Instant::now(),
        };

        match kind {
            NotificationKind::Error => error!(message = %notification.message, "Notification"),
            NotificationKind::Warning => warn!(message = %notification.message, "Notification"),
            _ => info!(message = %notification.message, "Notification"),
        }
        println!("{}", notification);

        let id = notification.id;
        self.items.push(notification);
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> Uuid {
        self.show(message, NotificationKind::Success)
    }

    pub fn error(&mut self, message: impl Into<String>) -> Uuid {
        self.show(message, NotificationKind::Error)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> Uuid {
        self.show(message, NotificationKind::Warning)
    }

    pub fn info(&mut self, message: impl Into<String>) -> Uuid {
        self.show(message, NotificationKind::Info)
    }

    /// Dismiss a notification early.
    pub fn remove(&mut self, id: Uuid) {
        self.items.retain(|n| n.id != id);
    }

    /// Notifications still within their lifetime at `now`.
    pub fn active_at(&mut self, now: Instant) -> &[Notification] {
        let ttl = self.ttl;
        self.items
            .retain(|n| now.saturating_duration_since(n.raised_at) < ttl);
        &self.items
    }

    pub fn active(&mut self) -> &[Notification] {
        self.active_at(Instant::now())
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_and_removal() {
        let mut notifier = Notifier::new();
        let first = notifier.success("Trade placed successfully!");
        notifier.warning("Please enter a valid quantity");

        let start = Instant::now();
        assert_eq!(notifier.active_at(start).len(), 2);

        notifier.remove(first);
        assert_eq!(notifier.active_at(start).len(), 1);
        assert_eq!(notifier.active_at(start)[0].kind, NotificationKind::Warning);

        let later = start + NOTIFICATION_TTL + Duration::from_millis(1);
        assert!(notifier.active_at(later).is_empty());
    }

    #[test]
    fn test_display_uses_icon() {
        let mut notifier = Notifier::new();
        notifier.error("Quantity exceeds available amount");
        let active = notifier.active();
        assert_eq!(active[0].to_string(), "✕ Quantity exceeds available amount");
    }
}
