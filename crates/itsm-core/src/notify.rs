//! Presentational side channel: human-readable notices for a toast area.
//!
//! Notices never affect correctness. The graph emits one per operation; a
//! caller that does not care installs nothing and gets [`TracingNotifier`].

use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::error::{LinkError, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_error(err: &LinkError) -> Self {
        let level = match err.severity() {
            Severity::Warning => NoticeLevel::Warning,
            Severity::Error => NoticeLevel::Error,
        };
        Self {
            level,
            message: err.to_string(),
        }
    }
}

pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Success => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
    }
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self, notice: &Notice) {
        (**self).notify(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_linked_becomes_warning() {
        let err = LinkError::AlreadyLinked {
            incident: "INC-001".to_string(),
            target: "KB-101".to_string(),
        };
        let notice = Notice::from_error(&err);
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.message.contains("KB-101"));
    }

    #[test]
    fn collecting_notifier_keeps_order() {
        let n = CollectingNotifier::new();
        n.notify(&Notice::success("one"));
        n.notify(&Notice::success("two"));
        assert_eq!(n.notices().len(), 2);
        assert_eq!(n.last().unwrap().message, "two");
    }
}
