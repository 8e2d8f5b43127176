//! # Domain Model: Documents, Edges and Notifications
//!
//! Everything the core persists is a JSON object stored in one of a handful of
//! named collections. This module defines those collections, the generic
//! [`Document`] shape the store hands back, and the typed records the
//! coordinators read and write.
//!
//! ## Edge Identity
//!
//! An edge (a like or a follow) is logically identified by its
//! `(actor, target, kind)` triple, not by the id the store assigns. To let the
//! store enforce "at most one edge per triple" without a racy
//! query-then-insert, edges are written under a deterministic id:
//! a UUID v5 computed from the triple (see [`like_id`] and [`follow_id`]).
//! Inserting the same like twice therefore targets the same document, and
//! `insert_if_absent` turns the second attempt into a no-op.
//!
//! Like and follow notifications get the same treatment through
//! [`notification_id`], so the "exactly one notification per non-self edge"
//! rule holds even when a create is retried.
//!
//! ## Field Names
//!
//! Stored field names are camelCase (`userId`, `likeCount`, ...) so documents
//! stay compatible with the collections other clients already read.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub type Fields = Map<String, Value>;

/// Namespace for deterministic ids. Changing it orphans every existing edge.
const ECHO_NAMESPACE: Uuid = Uuid::from_u128(0x6563_686f_2d65_6467_652d_6e73_0000_0001);

pub const LIKE_COUNT: &str = "likeCount";
pub const COMMENT_COUNT: &str = "commentCount";
pub const FOLLOWER_COUNT: &str = "followerCount";
pub const FOLLOWING_COUNT: &str = "followingCount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Likes,
    Follows,
    Notifications,
    Posts,
    Comments,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Likes,
        Collection::Follows,
        Collection::Notifications,
        Collection::Posts,
        Collection::Comments,
        Collection::Users,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Likes => "likes",
            Collection::Follows => "follows",
            Collection::Notifications => "notifications",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Comment,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Post => "post",
            TargetType::Comment => "comment",
        }
    }

    /// Collection holding the target documents and their `likeCount`.
    pub fn collection(self) -> Collection {
        match self {
            TargetType::Post => Collection::Posts,
            TargetType::Comment => Collection::Comments,
        }
    }

    pub fn like_notification(self) -> NotificationType {
        match self {
            TargetType::Post => NotificationType::LikePost,
            TargetType::Comment => NotificationType::LikeComment,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    LikePost,
    LikeComment,
    Comment,
    Follow,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::LikePost => "LIKE_POST",
            NotificationType::LikeComment => "LIKE_COMMENT",
            NotificationType::Comment => "COMMENT",
            NotificationType::Follow => "FOLLOW",
        }
    }

    /// Types that mirror an edge record one-to-one.
    pub fn is_edge_backed(self) -> bool {
        !matches!(self, NotificationType::Comment)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which notifications an inbox listing shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFilter {
    #[default]
    All,
    /// `LIKE_POST` and `LIKE_COMMENT`.
    Likes,
    Comments,
}

impl NotificationFilter {
    pub fn admits(self, kind: NotificationType) -> bool {
        match self {
            NotificationFilter::All => true,
            NotificationFilter::Likes => matches!(
                kind,
                NotificationType::LikePost | NotificationType::LikeComment
            ),
            NotificationFilter::Comments => kind == NotificationType::Comment,
        }
    }
}

/// A stored document: store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Integer field, treating a missing field as zero the way increments do.
    pub fn counter(&self, name: &str) -> i64 {
        self.fields.get(name).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Encode a typed record into document fields.
pub fn to_fields<T: Serialize>(record: &T) -> StoreResult<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(
            <serde_json::Error as serde::ser::Error>::custom(format!(
                "expected a JSON object, got {}",
                other
            )),
        )),
    }
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

pub fn matches_all(filters: &[Filter], fields: &Fields) -> bool {
    filters.iter().all(|f| f.matches(fields))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    pub user_id: String,
    pub target_id: String,
    pub target_type: TargetType,
    pub timestamp: DateTime<Utc>,
}

impl LikeRecord {
    pub fn new(user_id: &str, target_id: &str, target_type: TargetType) -> Self {
        Self {
            user_id: user_id.to_string(),
            target_id: target_id.to_string(),
            target_type,
            timestamp: Utc::now(),
        }
    }

    pub fn doc_id(&self) -> String {
        like_id(&self.user_id, &self.target_id, self.target_type)
    }

    /// Filters selecting every record for this triple, including legacy
    /// duplicates stored under random ids.
    pub fn filters(user_id: &str, target_id: &str, target_type: TargetType) -> Vec<Filter> {
        vec![
            Filter::eq("userId", user_id),
            Filter::eq("targetId", target_id),
            Filter::eq("targetType", target_type.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    pub follower_id: String,
    pub following_id: String,
    pub timestamp: DateTime<Utc>,
}

impl FollowRecord {
    pub fn new(follower_id: &str, following_id: &str) -> Self {
        Self {
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn doc_id(&self) -> String {
        follow_id(&self.follower_id, &self.following_id)
    }

    pub fn filters(follower_id: &str, following_id: &str) -> Vec<Filter> {
        vec![
            Filter::eq("followerId", follower_id),
            Filter::eq("followingId", following_id),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_usertag: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub target_id: String,
    /// Parent post of a liked comment, for navigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn filters(
        recipient_id: &str,
        sender_id: &str,
        kind: NotificationType,
        target_id: &str,
    ) -> Vec<Filter> {
        vec![
            Filter::eq("recipientId", recipient_id),
            Filter::eq("senderId", sender_id),
            Filter::eq("type", kind.as_str()),
            Filter::eq("targetId", target_id),
        ]
    }
}

/// A notification together with its document id, as listed to a recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredNotification {
    pub id: String,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Sender display data copied into each notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub usertag: Option<String>,
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub following_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub like_count: i64,
    pub timestamp: DateTime<Utc>,
}

fn v5(parts: &[&str]) -> String {
    // NUL cannot appear in ids, so joined parts never collide.
    let name = parts.join("\0");
    Uuid::new_v5(&ECHO_NAMESPACE, name.as_bytes()).to_string()
}

pub fn like_id(user_id: &str, target_id: &str, target_type: TargetType) -> String {
    v5(&["like", user_id, target_type.as_str(), target_id])
}

pub fn follow_id(follower_id: &str, following_id: &str) -> String {
    v5(&["follow", follower_id, following_id])
}

pub fn notification_id(
    recipient_id: &str,
    sender_id: &str,
    kind: NotificationType,
    target_id: &str,
) -> String {
    v5(&["notification", recipient_id, sender_id, kind.as_str(), target_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_ids_are_deterministic_per_triple() {
        let a = like_id("alice", "p1", TargetType::Post);
        let b = like_id("alice", "p1", TargetType::Post);
        assert_eq!(a, b);
        assert_ne!(a, like_id("alice", "p1", TargetType::Comment));
        assert_ne!(a, like_id("bob", "p1", TargetType::Post));
    }

    #[test]
    fn follow_id_is_directed() {
        assert_ne!(follow_id("a", "b"), follow_id("b", "a"));
    }

    #[test]
    fn id_parts_do_not_run_together() {
        assert_ne!(follow_id("ab", "c"), follow_id("a", "bc"));
    }

    #[test]
    fn like_record_uses_stored_field_names() {
        let record = LikeRecord::new("alice", "p1", TargetType::Post);
        let fields = to_fields(&record).unwrap();
        assert_eq!(fields["userId"], json!("alice"));
        assert_eq!(fields["targetId"], json!("p1"));
        assert_eq!(fields["targetType"], json!("post"));
        assert!(fields.contains_key("timestamp"));
        for filter in LikeRecord::filters("alice", "p1", TargetType::Post) {
            assert!(filter.matches(&fields), "filter {:?}", filter);
        }
    }

    #[test]
    fn notification_type_serializes_screaming() {
        let n = Notification {
            recipient_id: "bob".into(),
            sender_id: "alice".into(),
            sender_name: None,
            sender_usertag: None,
            kind: NotificationType::LikeComment,
            target_id: "c1".into(),
            post_id: Some("p1".into()),
            content: None,
            read: false,
            timestamp: Utc::now(),
        };
        let fields = to_fields(&n).unwrap();
        assert_eq!(fields["type"], json!("LIKE_COMMENT"));
        assert_eq!(fields["read"], json!(false));
        assert!(!fields.contains_key("content"));
        let doc = Document::new("n1", fields);
        let back: Notification = doc.decode().unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn filters_group_notification_types() {
        use NotificationType::*;
        assert!(NotificationFilter::Likes.admits(LikePost));
        assert!(NotificationFilter::Likes.admits(LikeComment));
        assert!(!NotificationFilter::Likes.admits(Comment));
        assert!(!NotificationFilter::Likes.admits(Follow));
        assert!(NotificationFilter::Comments.admits(Comment));
        assert!(!NotificationFilter::Comments.admits(LikePost));
        assert!(NotificationFilter::All.admits(Follow));
    }

    #[test]
    fn missing_counter_reads_as_zero() {
        let doc = Document::new("p1", Fields::new());
        assert_eq!(doc.counter(LIKE_COUNT), 0);
    }
}
