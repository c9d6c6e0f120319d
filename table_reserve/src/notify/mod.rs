//! Customer notifications.
//!
//! The waitlist manager never talks to an SMS or email gateway directly.
//! It hands a [`NotificationTemplate`] to a [`NotificationDispatcher`] after
//! the state change has been persisted. Delivery failures are logged by the
//! caller and never roll back a transition.

use crate::waitlist::WaitlistEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message kinds sent to waitlisted guests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationTemplate {
    /// Added to the waitlist
    Waitlisted,
    /// A table is ready and must be confirmed before `expires_at`
    TableReady { expires_at: DateTime<Utc> },
    /// The guest accepted the table
    Confirmed,
    /// The entry was withdrawn
    Cancelled,
    /// The confirmation window lapsed; back in the queue
    Requeued,
    /// Removed from the waitlist by staff
    Expired,
}

impl NotificationTemplate {
    /// Plain-text body for the template
    pub fn render(&self, entry: &WaitlistEntry) -> String {
        match self {
            NotificationTemplate::Waitlisted => format!(
                "Hi {}, you're on the waitlist for {} guests on {}.",
                entry.name, entry.guest_count, entry.preferred_date
            ),
            NotificationTemplate::TableReady { expires_at } => format!(
                "Hi {}, your table for {} is ready. Please confirm by {} UTC.",
                entry.name,
                entry.guest_count,
                expires_at.format("%H:%M")
            ),
            NotificationTemplate::Confirmed => {
                format!("Thanks {}, your table is confirmed.", entry.name)
            }
            NotificationTemplate::Cancelled => {
                format!("Hi {}, your waitlist entry has been cancelled.", entry.name)
            }
            NotificationTemplate::Requeued => format!(
                "Hi {}, we didn't hear back in time, so you're back in the queue.",
                entry.name
            ),
            NotificationTemplate::Expired => {
                format!("Hi {}, your waitlist entry has expired.", entry.name)
            }
        }
    }
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Entry has neither email nor phone
    #[error("No contact channel for waitlist entry {0}")]
    NoChannel(uuid::Uuid),

    /// Gateway rejected or failed the message
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Sends notifications to guests
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        entry: &WaitlistEntry,
        template: &NotificationTemplate,
    ) -> Result<(), NotificationError>;
}

/// Dispatcher that writes notifications to the log. Used in development
/// and whenever no gateway is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(
        &self,
        entry: &WaitlistEntry,
        template: &NotificationTemplate,
    ) -> Result<(), NotificationError> {
        let channel = match (&entry.email, &entry.phone) {
            (Some(email), _) => email.as_str(),
            (None, Some(phone)) => phone.as_str(),
            (None, None) => return Err(NotificationError::NoChannel(entry.id)),
        };

        log::info!(
            "Notification to {} for entry {}: {}",
            channel,
            entry.id,
            template.render(entry)
        );
        Ok(())
    }
}

/// Recording dispatcher for tests
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::sync::{Mutex, PoisonError};

    /// Records every dispatched notification, optionally failing them all
    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        sent: Mutex<Vec<(uuid::Uuid, NotificationTemplate)>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// A dispatcher whose deliveries always fail
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }

        /// Notifications recorded so far, oldest first
        pub fn sent(&self) -> Vec<(uuid::Uuid, NotificationTemplate)> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            entry: &WaitlistEntry,
            template: &NotificationTemplate,
        ) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((entry.id, template.clone()));

            if self.fail {
                Err(NotificationError::Delivery("gateway unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }
}
