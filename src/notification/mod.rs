//! User-facing notices (sync failures, rejected moves, confirmations)

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoticeLevel {
    #[default]
    Info,
    Error,
}

impl NoticeLevel {
    /// Convert level to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A message for the user, shown by the front end and written to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.message)
    }
}

/// Sending half of the notice channel
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Notice>,
}

/// Create a notifier and the receiver the front end drains
pub fn notice_channel() -> (Notifier, mpsc::UnboundedReceiver<Notice>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Notifier { sender }, receiver)
}

impl Notifier {
    /// Log the notice and hand it to the front end. A closed receiver only loses the
    /// on-screen copy.
    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(message = %notice.message, "notice"),
            NoticeLevel::Error => warn!(message = %notice.message, "error notice"),
        }
        let _ = self.sender.send(notice);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notice::error(message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notice::info(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_reach_receiver_in_order() {
        let (notifier, mut receiver) = notice_channel();
        notifier.info("saved");
        notifier.error("could not save the new order");

        assert_eq!(receiver.try_recv(), Ok(Notice::info("saved")));
        let error = receiver.try_recv().expect("second notice queued");
        assert_eq!(error.level, NoticeLevel::Error);
        assert_eq!(error.to_string(), "[error] could not save the new order");
    }

    #[test]
    fn test_notify_after_receiver_dropped_is_harmless() {
        let (notifier, receiver) = notice_channel();
        drop(receiver);
        notifier.error("nobody listening");
    }
}
