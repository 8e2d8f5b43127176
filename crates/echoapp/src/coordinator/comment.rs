use super::sequence::WriteSequence;
use super::{best_effort, fetch_counter, require_actor};
use crate::error::{EchoError, Result, Step};
use crate::model::{to_fields, Collection, Comment, COMMENT_COUNT};
use crate::notifications::NotificationService;
use crate::store::RemoteStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentOutcome {
    pub comment_id: String,
    pub comment_count: Option<i64>,
}

/// Adds comments to posts and keeps `commentCount` in step.
pub struct CommentService<S> {
    store: Arc<S>,
    notifications: NotificationService<S>,
}

impl<S: RemoteStore> CommentService<S> {
    pub fn new(store: Arc<S>, notifications: NotificationService<S>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    pub async fn add_comment(
        &self,
        actor_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<CommentOutcome> {
        require_actor(actor_id)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(EchoError::InvalidInput("comment is empty".into()));
        }
        if self.store.get(Collection::Posts, post_id).await?.is_none() {
            return Err(EchoError::NotFound(format!("post {}", post_id)));
        }

        let comment = Comment {
            post_id: post_id.to_string(),
            user_id: actor_id.to_string(),
            content: content.to_string(),
            like_count: 0,
            timestamp: Utc::now(),
        };
        let fields = to_fields(&comment)?;
        let mut seq = WriteSequence::new("comment");

        let comment_id = seq
            .step(
                Step::InsertComment,
                self.store.insert(Collection::Comments, fields),
            )
            .await?;
        seq.step(
            Step::IncrementCommentCount,
            self.store
                .increment_field(Collection::Posts, post_id, COMMENT_COUNT, 1),
        )
        .await?;

        best_effort(
            "comment notification",
            self.notifications
                .create_comment_notification(actor_id, post_id, content)
                .await,
        );

        info!(actor = %actor_id, post = %post_id, comment = %comment_id, "commented");
        Ok(CommentOutcome {
            comment_count: fetch_counter(&*self.store, Collection::Posts, post_id, COMMENT_COUNT)
                .await,
            comment_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Notification, NotificationType};
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::{Fault, MemStore, Op};

    async fn setup() -> (Arc<MemStore>, CommentService<MemStore>) {
        let store = StoreFixture::new()
            .with_user("alice", "Alice")
            .await
            .with_user("bob", "Bob")
            .await
            .with_post("p1", "bob", 0)
            .await
            .store;
        let store = Arc::new(store);
        let comments =
            CommentService::new(Arc::clone(&store), NotificationService::new(Arc::clone(&store)));
        (store, comments)
    }

    #[tokio::test]
    async fn comment_bumps_count_and_notifies_owner() {
        let (store, comments) = setup().await;
        let outcome = comments
            .add_comment("alice", "p1", "  nice one ")
            .await
            .unwrap();
        assert_eq!(outcome.comment_count, Some(1));

        let stored = store
            .get(Collection::Comments, &outcome.comment_id)
            .await
            .unwrap()
            .unwrap();
        let comment: Comment = stored.decode().unwrap();
        assert_eq!(comment.content, "nice one");
        assert_eq!(comment.user_id, "alice");

        let notes = store.documents(Collection::Notifications).await;
        assert_eq!(notes.len(), 1);
        let note: Notification = notes[0].decode().unwrap();
        assert_eq!(note.kind, NotificationType::Comment);
        assert_eq!(note.target_id, "p1");
        assert_eq!(note.content.as_deref(), Some("nice one"));
    }

    #[tokio::test]
    async fn commenting_on_own_post_is_silent() {
        let (store, comments) = setup().await;
        comments.add_comment("bob", "p1", "me again").await.unwrap();
        assert!(store.documents(Collection::Notifications).await.is_empty());
    }

    #[tokio::test]
    async fn empty_comment_is_rejected_before_any_write() {
        let (store, comments) = setup().await;
        store.clear_journal();
        assert!(matches!(
            comments.add_comment("alice", "p1", "   ").await,
            Err(EchoError::InvalidInput(_))
        ));
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn missing_post_is_not_found() {
        let (_store, comments) = setup().await;
        assert!(matches!(
            comments.add_comment("alice", "nope", "hi").await,
            Err(EchoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn counter_failure_after_insert_is_partial() {
        let (store, comments) = setup().await;
        store.fail(Fault::on(Op::Increment, Collection::Posts));
        let err = comments.add_comment("alice", "p1", "hi").await.unwrap_err();
        assert!(err.left_partial_state());
        assert_eq!(store.documents(Collection::Comments).await.len(), 1);
    }
}
