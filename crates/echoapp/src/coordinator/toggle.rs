use super::sequence::WriteSequence;
use super::{aggregate_key, best_effort, fetch_counter, require_actor, InFlight};
use crate::error::{EchoError, Result, Step};
use crate::model::{to_fields, Collection, LikeRecord, TargetType, LIKE_COUNT};
use crate::notifications::NotificationService;
use crate::store::RemoteStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub liked: bool,
    /// `likeCount` read back from the store, `None` if the read failed.
    pub like_count: Option<i64>,
    /// False when the edge was already in the requested state.
    pub changed: bool,
}

/// Like/unlike of posts and comments.
pub struct ToggleCoordinator<S> {
    store: Arc<S>,
    notifications: NotificationService<S>,
    in_flight: InFlight,
}

impl<S: RemoteStore> ToggleCoordinator<S> {
    pub fn new(store: Arc<S>, notifications: NotificationService<S>, in_flight: InFlight) -> Self {
        Self {
            store,
            notifications,
            in_flight,
        }
    }

    /// Flip the like state of `target_id` for `actor_id`.
    ///
    /// `currently_liked` is the state the caller displayed before the gesture;
    /// `false` runs the like path, `true` the unlike path.
    pub async fn toggle(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
        currently_liked: bool,
    ) -> Result<ToggleOutcome> {
        require_actor(actor_id)?;
        let _guard = self
            .in_flight
            .try_acquire(actor_id, aggregate_key(target_type, target_id))?;

        if currently_liked {
            self.unlike(actor_id, target_id, target_type).await
        } else {
            self.like(actor_id, target_id, target_type).await
        }
    }

    /// Whether `actor_id` currently likes the target. An anonymous actor likes nothing.
    pub async fn like_status(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<bool> {
        if require_actor(actor_id).is_err() {
            return Ok(false);
        }
        let found = self
            .store
            .query(
                Collection::Likes,
                &LikeRecord::filters(actor_id, target_id, target_type),
            )
            .await?;
        Ok(!found.is_empty())
    }

    async fn like(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<ToggleOutcome> {
        let collection = target_type.collection();
        if self.store.get(collection, target_id).await?.is_none() {
            return Err(EchoError::NotFound(format!("{} {}", target_type, target_id)));
        }

        let record = LikeRecord::new(actor_id, target_id, target_type);
        let fields = to_fields(&record)?;
        let mut seq = WriteSequence::new("like");

        // Membership goes by the triple, so records under older random ids count.
        let existing = seq
            .step(
                Step::QueryEdges,
                self.store.query(
                    Collection::Likes,
                    &LikeRecord::filters(actor_id, target_id, target_type),
                ),
            )
            .await?;
        if !existing.is_empty() {
            return Ok(self.already_liked(actor_id, target_id, target_type).await);
        }

        let created = seq
            .step(
                Step::InsertEdge,
                self.store
                    .insert_if_absent(Collection::Likes, &record.doc_id(), fields),
            )
            .await?;
        if !created {
            return Ok(self.already_liked(actor_id, target_id, target_type).await);
        }

        seq.step(
            Step::IncrementCounter,
            self.store
                .increment_field(collection, target_id, LIKE_COUNT, 1),
        )
        .await?;

        best_effort(
            "like notification",
            self.notifications
                .create_like_notification(actor_id, target_id, target_type)
                .await,
        );

        info!(actor = %actor_id, %target_type, target = %target_id, "liked");
        Ok(ToggleOutcome {
            liked: true,
            like_count: fetch_counter(&*self.store, collection, target_id, LIKE_COUNT).await,
            changed: true,
        })
    }

    async fn already_liked(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> ToggleOutcome {
        debug!(actor = %actor_id, %target_type, target = %target_id, "already liked");
        ToggleOutcome {
            liked: true,
            like_count: fetch_counter(
                &*self.store,
                target_type.collection(),
                target_id,
                LIKE_COUNT,
            )
            .await,
            changed: false,
        }
    }

    async fn unlike(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<ToggleOutcome> {
        let collection = target_type.collection();
        let filters = LikeRecord::filters(actor_id, target_id, target_type);
        let not_found = || {
            EchoError::NotFound(format!(
                "like by {} on {} {}",
                actor_id, target_type, target_id
            ))
        };
        let mut seq = WriteSequence::new("unlike");

        let existing = seq
            .step(
                Step::QueryEdges,
                self.store.query(Collection::Likes, &filters),
            )
            .await?;
        if existing.is_empty() {
            return Err(not_found());
        }

        let removed = seq
            .step(
                Step::DeleteEdge,
                self.store.delete_matching(Collection::Likes, &filters),
            )
            .await?;
        if removed == 0 {
            // Another session removed it between our query and delete.
            return Err(not_found());
        }

        // One decrement per removed record: normally exactly one.
        seq.step(
            Step::DecrementCounter,
            self.store
                .increment_field(collection, target_id, LIKE_COUNT, -(removed as i64)),
        )
        .await?;

        best_effort(
            "like notification removal",
            self.notifications
                .delete_like_notification(actor_id, target_id, target_type)
                .await,
        );

        info!(actor = %actor_id, %target_type, target = %target_id, removed, "unliked");
        Ok(ToggleOutcome {
            liked: false,
            like_count: fetch_counter(&*self.store, collection, target_id, LIKE_COUNT).await,
            changed: true,
        })
    }
}
