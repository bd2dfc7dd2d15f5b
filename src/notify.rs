use std::cell::RefCell;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Fire-and-forget user-visible notification.
pub trait Notifier {
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the diagnostic log. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier {
    pub sound_enabled: bool,
}

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        if self.sound_enabled {
            log_info!("🔔 {title}: {body}");
        } else {
            log_info!("{title}: {body}");
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RefCell<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.borrow().clone()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.sent.borrow().iter().filter(|(t, _)| t == title).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent
            .borrow_mut()
            .push((title.to_string(), body.to_string()));
    }
}
