//! User-visible, toast-style messages.

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Sink for messages the user should see. The UI decides how to present
/// them.
pub trait Notices: Send + Sync {
    fn show(&self, level: NoticeLevel, message: &str);
}

/// Default sink: the log is the only surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotices;

impl Notices for TracingNotices {
    fn show(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!(notice = message),
            NoticeLevel::Error => error!(notice = message),
        }
    }
}
