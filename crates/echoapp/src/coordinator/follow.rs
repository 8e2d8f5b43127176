use super::sequence::WriteSequence;
use super::{aggregate_key, best_effort, fetch_counter, require_actor, InFlight};
use crate::error::{EchoError, Result, Step};
use crate::model::{to_fields, Collection, FollowRecord, FOLLOWER_COUNT, FOLLOWING_COUNT};
use crate::notifications::NotificationService;
use crate::store::RemoteStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowOutcome {
    pub following: bool,
    /// Target's `followerCount` after the change, if it could be read.
    pub follower_count: Option<i64>,
    /// Actor's `followingCount` after the change, if it could be read.
    pub following_count: Option<i64>,
    pub changed: bool,
}

/// Follow/unfollow between users. Touches two user documents per call.
pub struct FollowCoordinator<S> {
    store: Arc<S>,
    notifications: NotificationService<S>,
    in_flight: InFlight,
}

impl<S: RemoteStore> FollowCoordinator<S> {
    pub fn new(store: Arc<S>, notifications: NotificationService<S>, in_flight: InFlight) -> Self {
        Self {
            store,
            notifications,
            in_flight,
        }
    }

    pub async fn toggle(
        &self,
        actor_id: &str,
        target_user_id: &str,
        currently_following: bool,
    ) -> Result<FollowOutcome> {
        require_actor(actor_id)?;
        let _guard = self
            .in_flight
            .try_acquire(actor_id, aggregate_key("user", target_user_id))?;

        if currently_following {
            self.unfollow(actor_id, target_user_id).await
        } else {
            self.follow(actor_id, target_user_id).await
        }
    }

    pub async fn follow_status(&self, actor_id: &str, target_user_id: &str) -> Result<bool> {
        if require_actor(actor_id).is_err() {
            return Ok(false);
        }
        let found = self
            .store
            .query(
                Collection::Follows,
                &FollowRecord::filters(actor_id, target_user_id),
            )
            .await?;
        Ok(!found.is_empty())
    }

    async fn follow(&self, actor_id: &str, target_user_id: &str) -> Result<FollowOutcome> {
        for user in [actor_id, target_user_id] {
            if self.store.get(Collection::Users, user).await?.is_none() {
                return Err(EchoError::NotFound(format!("user {}", user)));
            }
        }

        let record = FollowRecord::new(actor_id, target_user_id);
        let fields = to_fields(&record)?;
        let mut seq = WriteSequence::new("follow");

        let existing = seq
            .step(
                Step::QueryEdges,
                self.store.query(
                    Collection::Follows,
                    &FollowRecord::filters(actor_id, target_user_id),
                ),
            )
            .await?;
        if !existing.is_empty() {
            debug!(actor = %actor_id, target = %target_user_id, "already following");
            return Ok(self.outcome(actor_id, target_user_id, true, false).await);
        }

        let created = seq
            .step(
                Step::InsertEdge,
                self.store
                    .insert_if_absent(Collection::Follows, &record.doc_id(), fields),
            )
            .await?;
        if !created {
            debug!(actor = %actor_id, target = %target_user_id, "already following");
            return Ok(self.outcome(actor_id, target_user_id, true, false).await);
        }

        seq.step(
            Step::IncrementFollowing,
            self.store
                .increment_field(Collection::Users, actor_id, FOLLOWING_COUNT, 1),
        )
        .await?;
        seq.step(
            Step::IncrementFollower,
            self.store
                .increment_field(Collection::Users, target_user_id, FOLLOWER_COUNT, 1),
        )
        .await?;

        best_effort(
            "follow notification",
            self.notifications
                .create_follow_notification(actor_id, target_user_id)
                .await,
        );

        info!(actor = %actor_id, target = %target_user_id, "followed");
        Ok(self.outcome(actor_id, target_user_id, true, true).await)
    }

    async fn unfollow(&self, actor_id: &str, target_user_id: &str) -> Result<FollowOutcome> {
        let filters = FollowRecord::filters(actor_id, target_user_id);
        let not_found =
            || EchoError::NotFound(format!("follow of {} by {}", target_user_id, actor_id));
        let mut seq = WriteSequence::new("unfollow");

        let existing = seq
            .step(
                Step::QueryEdges,
                self.store.query(Collection::Follows, &filters),
            )
            .await?;
        if existing.is_empty() {
            return Err(not_found());
        }

        let removed = seq
            .step(
                Step::DeleteEdge,
                self.store.delete_matching(Collection::Follows, &filters),
            )
            .await?;
        if removed == 0 {
            return Err(not_found());
        }
        let delta = -(removed as i64);

        seq.step(
            Step::DecrementFollowing,
            self.store
                .increment_field(Collection::Users, actor_id, FOLLOWING_COUNT, delta),
        )
        .await?;
        seq.step(
            Step::DecrementFollower,
            self.store
                .increment_field(Collection::Users, target_user_id, FOLLOWER_COUNT, delta),
        )
        .await?;

        best_effort(
            "follow notification removal",
            self.notifications
                .delete_follow_notification(actor_id, target_user_id)
                .await,
        );

        info!(actor = %actor_id, target = %target_user_id, removed, "unfollowed");
        Ok(self.outcome(actor_id, target_user_id, false, true).await)
    }

    async fn outcome(
        &self,
        actor_id: &str,
        target_user_id: &str,
        following: bool,
        changed: bool,
    ) -> FollowOutcome {
        FollowOutcome {
            following,
            follower_count: fetch_counter(
                &*self.store,
                Collection::Users,
                target_user_id,
                FOLLOWER_COUNT,
            )
            .await,
            following_count: fetch_counter(
                &*self.store,
                Collection::Users,
                actor_id,
                FOLLOWING_COUNT,
            )
            .await,
            changed,
        }
    }
}
