//! # Notifications
//!
//! Outbound messages produced by the rules. They are queued in the registry
//! outbox and drained by the service layer, which owns delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What raised the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTopic {
    ApprovalRequired,
    ChecklistEscalated,
    DocumentExpiry,
    TicketReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: NotificationTopic,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

/// FIFO queue of undelivered notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbox {
    queue: VecDeque<Notification>,
}

impl Outbox {
    pub fn push(&mut self, notification: Notification) {
        self.queue.push_back(notification);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    /// Take every queued notification, oldest first.
    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }
}
