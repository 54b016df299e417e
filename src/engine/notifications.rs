//! Bounded, newest-first log of user-facing notifications.

use chrono::Utc;
use std::collections::VecDeque;
use tracing::{error, info};

use crate::types::{Notification, Severity};

/// How many notifications presentation keeps on screen.
pub const DEFAULT_CAPACITY: usize = 5;

pub struct NotificationSink {
    entries: VecDeque<Notification>,
    capacity: usize,
    next_id: u64,
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Prepend a notification, dropping the oldest beyond capacity.
    /// Returns the id assigned to it.
    pub fn append(&mut self, message: impl Into<String>, severity: Severity) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let notification = Notification {
            id,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        };

        match severity {
            Severity::Error => error!(id, message = %notification.message, "Notification"),
            _ => info!(id, severity = %severity, message = %notification.message, "Notification"),
        }

        self.entries.push_front(notification);
        self.entries.truncate(self.capacity);
        id
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }

    /// Notifications with an id greater than `after_id`, oldest first.
    pub fn since(&self, after_id: u64) -> Vec<Notification> {
        self.entries
            .iter()
            .rev()
            .filter(|n| n.id > after_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the most recent notification, 0 when none was ever appended.
    pub fn last_id(&self) -> u64 {
        self.next_id - 1
    }
}
