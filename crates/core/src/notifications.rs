//! User-visible status messages.
//!
//! Notifications are append-only apart from their read flag. Nothing is delivered out of band;
//! recipients poll their history.

use crate::caller::CallerContext;
use crate::ids::{NotificationId, UserId};
use crate::model::Notification;
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use riskcare_types::NonEmptyText;
use std::sync::Arc;

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn RecordStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Appends `message` to the recipient's history.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the recipient has no account
    /// - [`CoreError::InvalidInput`] if the message is blank
    pub fn notify(&self, recipient: UserId, message: &str) -> CoreResult<Notification> {
        let message = NonEmptyText::new(message)
            .map_err(|_| CoreError::InvalidInput("notification message cannot be empty".into()))?;
        if self.store.get_user(recipient)?.is_none() {
            return Err(CoreError::not_found("user", recipient));
        }

        let notification = self.store.append_notification(Notification {
            id: NotificationId::new(),
            recipient_id: recipient,
            message,
            is_read: false,
            created_at: Utc::now(),
            sequence: 0,
        })?;
        tracing::debug!("notified {}: {}", recipient, notification.message);
        Ok(notification)
    }

    /// The caller's notifications, most recent first.
    pub fn list(&self, caller: &CallerContext) -> CoreResult<Vec<Notification>> {
        self.store.list_notifications(caller.user_id)
    }

    pub fn unread_count(&self, caller: &CallerContext) -> CoreResult<usize> {
        Ok(self
            .list(caller)?
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }

    /// Marks one notification read.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no such notification exists
    /// - [`CoreError::NotNotificationRecipient`] if it belongs to someone else
    pub fn mark_read(&self, id: NotificationId, caller: &CallerContext) -> CoreResult<Notification> {
        let notification = self
            .store
            .get_notification(id)?
            .ok_or_else(|| CoreError::not_found("notification", id))?;
        if notification.recipient_id != caller.user_id {
            return Err(CoreError::NotNotificationRecipient);
        }
        if !self.store.mark_notification_read(id)? {
            return Err(CoreError::not_found("notification", id));
        }
        Ok(Notification {
            is_read: true,
            ..notification
        })
    }

    /// Marks all of the caller's notifications read, returning how many changed.
    pub fn mark_all_read(&self, caller: &CallerContext) -> CoreResult<usize> {
        self.store.mark_all_notifications_read(caller.user_id)
    }
}
