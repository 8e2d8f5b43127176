//! # Notification Service
//!
//! Notifications tell a target's owner that somebody liked, commented on or
//! followed something of theirs. They are the third of the three facts the
//! coordinators keep in agreement, and the least important one: a missed
//! notification is a cosmetic problem, a lost like is not.
//!
//! ## Rules
//!
//! - **Self-action suppression**: when the sender is also the recipient,
//!   creating is a silent no-op ([`Delivery::SelfAction`]), never an error.
//! - **One per edge**: like and follow notifications are written under a
//!   deterministic id derived from `(recipient, sender, type, target)`, so a
//!   retried create cannot produce a second record.
//! - **Delete all matches**: removal queries `(recipient, sender, type, target)`
//!   and deletes every hit, healing any duplicate left by older clients.
//! - **Best effort**: every method returns its store error to the caller, but
//!   the coordinators log and drop those errors. A notification failure never
//!   rolls back or blocks the edge/counter change.
//!
//! ## Target Ids
//!
//! `targetId` is always the liked/commented/followed thing itself: the post,
//! the comment, or the followed user. `LIKE_COMMENT` notifications also carry
//! the parent `postId` so a client can open the right thread.

use crate::error::StoreResult;
use crate::model::{
    notification_id, to_fields, Collection, Filter, Notification, NotificationFilter,
    NotificationType, StoredNotification, TargetType, UserProfile,
};
use crate::store::RemoteStore;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What a create call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Created(String),
    AlreadyPresent,
    SelfAction,
    /// The target document (and so its owner) could not be found.
    TargetMissing,
    Disabled,
}

/// Owner of a like target, plus the parent post for comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOwner {
    pub owner_id: String,
    pub post_id: Option<String>,
}

pub struct NotificationService<S> {
    store: Arc<S>,
    enabled: bool,
}

impl<S> Clone for NotificationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            enabled: self.enabled,
        }
    }
}

impl<S: RemoteStore> NotificationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            enabled: true,
        }
    }

    /// Turn creation off. Deletes still run so stale records get cleaned up.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resolve who owns a post or comment (`userId` field).
    pub async fn target_owner(
        &self,
        target_id: &str,
        target_type: TargetType,
    ) -> StoreResult<Option<TargetOwner>> {
        let Some(doc) = self.store.get(target_type.collection(), target_id).await? else {
            return Ok(None);
        };
        Ok(doc.str_field("userId").map(|owner| TargetOwner {
            owner_id: owner.to_string(),
            post_id: doc.str_field("postId").map(str::to_string),
        }))
    }

    pub async fn create_like_notification(
        &self,
        sender_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> StoreResult<Delivery> {
        if !self.enabled {
            return Ok(Delivery::Disabled);
        }
        let Some(owner) = self.target_owner(target_id, target_type).await? else {
            return Ok(Delivery::TargetMissing);
        };
        let post_id = match target_type {
            TargetType::Comment => owner.post_id,
            TargetType::Post => None,
        };
        self.create_unique(
            &owner.owner_id,
            sender_id,
            target_type.like_notification(),
            target_id,
            post_id,
        )
        .await
    }

    pub async fn create_follow_notification(
        &self,
        sender_id: &str,
        followed_id: &str,
    ) -> StoreResult<Delivery> {
        if !self.enabled {
            return Ok(Delivery::Disabled);
        }
        self.create_unique(
            followed_id,
            sender_id,
            NotificationType::Follow,
            followed_id,
            None,
        )
        .await
    }

    /// Comment notifications are one per comment, so they use store ids.
    pub async fn create_comment_notification(
        &self,
        sender_id: &str,
        post_id: &str,
        content: &str,
    ) -> StoreResult<Delivery> {
        if !self.enabled {
            return Ok(Delivery::Disabled);
        }
        let Some(owner) = self.target_owner(post_id, TargetType::Post).await? else {
            return Ok(Delivery::TargetMissing);
        };
        if owner.owner_id == sender_id {
            return Ok(Delivery::SelfAction);
        }

        let mut notification = self
            .build(&owner.owner_id, sender_id, NotificationType::Comment, post_id)
            .await?;
        notification.content = Some(content.to_string());
        let id = self
            .store
            .insert(Collection::Notifications, to_fields(&notification)?)
            .await?;
        debug!(%id, recipient = %owner.owner_id, "comment notification created");
        Ok(Delivery::Created(id))
    }

    pub async fn delete_like_notification(
        &self,
        sender_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> StoreResult<usize> {
        let kind = target_type.like_notification();
        match self.target_owner(target_id, target_type).await? {
            Some(owner) if owner.owner_id == sender_id => Ok(0),
            Some(owner) => self.delete(&owner.owner_id, sender_id, kind, target_id).await,
            // Target gone: still clear whatever this sender left behind.
            None => {
                let filters = [
                    Filter::eq("senderId", sender_id),
                    Filter::eq("type", kind.as_str()),
                    Filter::eq("targetId", target_id),
                ];
                self.store
                    .delete_matching(Collection::Notifications, &filters)
                    .await
            }
        }
    }

    pub async fn delete_follow_notification(
        &self,
        sender_id: &str,
        followed_id: &str,
    ) -> StoreResult<usize> {
        if sender_id == followed_id {
            return Ok(0);
        }
        self.delete(followed_id, sender_id, NotificationType::Follow, followed_id)
            .await
    }

    /// Notifications addressed to `recipient_id` that pass `filter`, newest first.
    pub async fn list_for(
        &self,
        recipient_id: &str,
        filter: NotificationFilter,
    ) -> StoreResult<Vec<StoredNotification>> {
        let docs = self
            .store
            .query(
                Collection::Notifications,
                &[Filter::eq("recipientId", recipient_id)],
            )
            .await?;
        let mut listed = docs
            .into_iter()
            .map(|doc| {
                Ok(StoredNotification {
                    notification: doc.decode()?,
                    id: doc.id,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        listed.retain(|n| filter.admits(n.notification.kind));
        listed.sort_by(|a, b| b.notification.timestamp.cmp(&a.notification.timestamp));
        Ok(listed)
    }

    pub async fn unread_count(&self, recipient_id: &str) -> StoreResult<usize> {
        Ok(self
            .store
            .query(Collection::Notifications, &unread_filters(recipient_id))
            .await?
            .len())
    }

    /// Mark one notification as read. Returns `false` when `id` is not a
    /// notification addressed to `recipient_id`.
    pub async fn mark_read(&self, recipient_id: &str, id: &str) -> StoreResult<bool> {
        let Some(doc) = self.store.get(Collection::Notifications, id).await? else {
            return Ok(false);
        };
        if doc.str_field("recipientId") != Some(recipient_id) {
            return Ok(false);
        }
        self.store
            .update_field(Collection::Notifications, id, "read", Value::Bool(true))
            .await?;
        Ok(true)
    }

    /// Mark every unread notification for `recipient_id` as read.
    pub async fn mark_all_read(&self, recipient_id: &str) -> StoreResult<usize> {
        let unread = self
            .store
            .query(Collection::Notifications, &unread_filters(recipient_id))
            .await?;
        for doc in &unread {
            self.store
                .update_field(Collection::Notifications, &doc.id, "read", Value::Bool(true))
                .await?;
        }
        Ok(unread.len())
    }

    async fn create_unique(
        &self,
        recipient_id: &str,
        sender_id: &str,
        kind: NotificationType,
        target_id: &str,
        post_id: Option<String>,
    ) -> StoreResult<Delivery> {
        if recipient_id == sender_id {
            return Ok(Delivery::SelfAction);
        }

        let mut notification = self.build(recipient_id, sender_id, kind, target_id).await?;
        notification.post_id = post_id;
        let id = notification_id(recipient_id, sender_id, kind, target_id);
        let created = self
            .store
            .insert_if_absent(Collection::Notifications, &id, to_fields(&notification)?)
            .await?;
        if created {
            debug!(%id, %kind, recipient = %recipient_id, "notification created");
            Ok(Delivery::Created(id))
        } else {
            Ok(Delivery::AlreadyPresent)
        }
    }

    async fn build(
        &self,
        recipient_id: &str,
        sender_id: &str,
        kind: NotificationType,
        target_id: &str,
    ) -> StoreResult<Notification> {
        let profile = match self.store.get(Collection::Users, sender_id).await? {
            Some(doc) => doc.decode::<UserProfile>()?,
            None => UserProfile::default(),
        };
        Ok(Notification {
            recipient_id: recipient_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: profile.full_name,
            sender_usertag: profile.usertag,
            kind,
            target_id: target_id.to_string(),
            post_id: None,
            content: None,
            read: false,
            timestamp: Utc::now(),
        })
    }

    async fn delete(
        &self,
        recipient_id: &str,
        sender_id: &str,
        kind: NotificationType,
        target_id: &str,
    ) -> StoreResult<usize> {
        let removed = self
            .store
            .delete_matching(
                Collection::Notifications,
                &Notification::filters(recipient_id, sender_id, kind, target_id),
            )
            .await?;
        debug!(removed, %kind, recipient = %recipient_id, "notifications deleted");
        Ok(removed)
    }
}

fn unread_filters(recipient_id: &str) -> [Filter; 2] {
    [
        Filter::eq("recipientId", recipient_id),
        Filter::eq("read", false),
    ]
}
