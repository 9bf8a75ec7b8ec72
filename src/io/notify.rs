//! User-facing outcome notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One toast-style message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Receives success and failure outcomes
pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

/// Emits notices as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(message = %notice.message, "notice"),
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "notice"),
        }
    }
}

/// Keeps every notice it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub notices: Vec<Notice>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(|n| n.level == NoticeLevel::Error)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_filters_errors() {
        let mut n = RecordingNotifier::default();
        n.notify(Notice::success("saved"));
        n.notify(Notice::error("failed"));
        assert_eq!(n.notices.len(), 2);
        let errors: Vec<&str> = n.errors().map(|x| x.message.as_str()).collect();
        assert_eq!(errors, vec!["failed"]);
    }
}
