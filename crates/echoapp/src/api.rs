//! # API Facade
//!
//! `EchoApi` is the single entry point for every client (the CLI, tests, any
//! future UI). It wires one store into the coordinators, the notification
//! service and the reconciler, and adds the gesture flow that ties a
//! coordinator call to an [`OptimisticToggle`]:
//!
//! ```text
//! view.begin() ─▶ coordinator.toggle(actor, target, snapshot.active_before)
//!                   ├─ Ok(outcome) ─▶ view.commit(outcome.state, outcome.count)
//!                   └─ Err(e)      ─▶ view.roll_back(), return e
//! ```
//!
//! ## What the API Does NOT Do
//!
//! - **Write sequencing**: that belongs to `coordinator/*`.
//! - **I/O**: no stdout, stderr or formatting. Methods return data, the CLI
//!   renders it.
//!
//! ## Generic Over RemoteStore
//!
//! `EchoApi<S: RemoteStore>` runs on `FsStore` in the CLI and on `MemStore`
//! in tests, where faults can be injected at any step.

use crate::config::EchoConfig;
use crate::coordinator::{
    require_actor, CommentOutcome, CommentService, FollowCoordinator, FollowOutcome, InFlight,
    ToggleCoordinator, ToggleOutcome,
};
use crate::error::{EchoError, Result};
use crate::model::{
    to_fields, Collection, Filter, NotificationFilter, Post, StoredNotification, TargetType,
    UserProfile,
    FOLLOWER_COUNT, LIKE_COUNT,
};
use crate::notifications::NotificationService;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::RemoteStore;
use crate::view::{OptimisticToggle, Transition};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub content: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub timestamp: DateTime<Utc>,
}

/// Everything `echo status` shows for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: String,
    pub profile: UserProfile,
    pub posts: Vec<PostSummary>,
    pub unread_notifications: usize,
}

pub struct EchoApi<S> {
    store: Arc<S>,
    notifications: NotificationService<S>,
    toggles: ToggleCoordinator<S>,
    follows: FollowCoordinator<S>,
    comments: CommentService<S>,
    reconciler: Reconciler<S>,
}

impl<S: RemoteStore> EchoApi<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, &EchoConfig::default())
    }

    pub fn with_config(store: S, config: &EchoConfig) -> Self {
        let store = Arc::new(store);
        let notifications =
            NotificationService::new(Arc::clone(&store)).with_enabled(config.notifications);
        let in_flight = InFlight::new();
        Self {
            toggles: ToggleCoordinator::new(
                Arc::clone(&store),
                notifications.clone(),
                in_flight.clone(),
            ),
            follows: FollowCoordinator::new(Arc::clone(&store), notifications.clone(), in_flight),
            comments: CommentService::new(Arc::clone(&store), notifications.clone()),
            reconciler: Reconciler::new(Arc::clone(&store), notifications.clone()),
            notifications,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Content ---

    /// Register a user document. Ids are chosen by the caller and must be new.
    pub async fn create_user(
        &self,
        user_id: &str,
        full_name: &str,
        usertag: Option<&str>,
    ) -> Result<UserProfile> {
        if user_id.trim().is_empty() {
            return Err(EchoError::InvalidInput("user id is empty".into()));
        }
        let profile = UserProfile {
            full_name: Some(full_name.to_string()),
            usertag: Some(
                usertag
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("@{}", user_id)),
            ),
            follower_count: 0,
            following_count: 0,
        };
        let created = self
            .store
            .insert_if_absent(Collection::Users, user_id, to_fields(&profile)?)
            .await?;
        if !created {
            return Err(EchoError::InvalidInput(format!(
                "user {} already exists",
                user_id
            )));
        }
        info!(user = %user_id, "user created");
        Ok(profile)
    }

    pub async fn create_post(&self, actor_id: &str, content: &str) -> Result<String> {
        require_actor(actor_id)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(EchoError::InvalidInput("post is empty".into()));
        }
        let post = Post {
            user_id: actor_id.to_string(),
            content: content.to_string(),
            like_count: 0,
            comment_count: 0,
            timestamp: Utc::now(),
        };
        let id = self
            .store
            .insert(Collection::Posts, to_fields(&post)?)
            .await?;
        info!(actor = %actor_id, post = %id, "post created");
        Ok(id)
    }

    pub async fn add_comment(
        &self,
        actor_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<CommentOutcome> {
        self.comments.add_comment(actor_id, post_id, content).await
    }

    // --- Likes ---

    pub async fn like(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<ToggleOutcome> {
        self.toggles
            .toggle(actor_id, target_id, target_type, false)
            .await
    }

    pub async fn unlike(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<ToggleOutcome> {
        self.toggles
            .toggle(actor_id, target_id, target_type, true)
            .await
    }

    pub async fn like_status(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<bool> {
        self.toggles
            .like_status(actor_id, target_id, target_type)
            .await
    }

    /// Build the like control for `target_id` as `actor_id` would see it.
    pub async fn like_view(
        &self,
        actor_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<OptimisticToggle> {
        let doc = self
            .store
            .get(target_type.collection(), target_id)
            .await?
            .ok_or_else(|| EchoError::NotFound(format!("{} {}", target_type, target_id)))?;
        let liked = self.like_status(actor_id, target_id, target_type).await?;
        Ok(OptimisticToggle::new(liked, doc.counter(LIKE_COUNT)))
    }

    /// Tap on a like control: optimistic flip, write sequence, then commit or
    /// roll back. On error the view is already restored.
    pub async fn like_gesture(
        &self,
        actor_id: &str,
        view: &mut OptimisticToggle,
        target_id: &str,
        target_type: TargetType,
    ) -> Result<Transition> {
        let snapshot = view.begin()?;
        match self
            .toggles
            .toggle(actor_id, target_id, target_type, snapshot.active_before)
            .await
        {
            Ok(outcome) => Ok(view.commit(outcome.liked, outcome.like_count)),
            Err(e) => {
                view.roll_back();
                Err(e)
            }
        }
    }

    // --- Follows ---

    pub async fn follow(&self, actor_id: &str, target_user_id: &str) -> Result<FollowOutcome> {
        self.follows.toggle(actor_id, target_user_id, false).await
    }

    pub async fn unfollow(&self, actor_id: &str, target_user_id: &str) -> Result<FollowOutcome> {
        self.follows.toggle(actor_id, target_user_id, true).await
    }

    pub async fn follow_status(&self, actor_id: &str, target_user_id: &str) -> Result<bool> {
        self.follows.follow_status(actor_id, target_user_id).await
    }

    /// The follow button on `target_user_id`'s profile; its count is the
    /// target's `followerCount`.
    pub async fn follow_view(
        &self,
        actor_id: &str,
        target_user_id: &str,
    ) -> Result<OptimisticToggle> {
        let doc = self
            .store
            .get(Collection::Users, target_user_id)
            .await?
            .ok_or_else(|| EchoError::NotFound(format!("user {}", target_user_id)))?;
        let following = self.follow_status(actor_id, target_user_id).await?;
        Ok(OptimisticToggle::new(following, doc.counter(FOLLOWER_COUNT)))
    }

    pub async fn follow_gesture(
        &self,
        actor_id: &str,
        view: &mut OptimisticToggle,
        target_user_id: &str,
    ) -> Result<Transition> {
        let snapshot = view.begin()?;
        match self
            .follows
            .toggle(actor_id, target_user_id, snapshot.active_before)
            .await
        {
            Ok(outcome) => Ok(view.commit(outcome.following, outcome.follower_count)),
            Err(e) => {
                view.roll_back();
                Err(e)
            }
        }
    }

    // --- Notifications ---

    pub async fn notifications(&self, recipient_id: &str) -> Result<Vec<StoredNotification>> {
        self.notifications_matching(recipient_id, NotificationFilter::All)
            .await
    }

    /// The inbox narrowed to likes or comments.
    pub async fn notifications_matching(
        &self,
        recipient_id: &str,
        filter: NotificationFilter,
    ) -> Result<Vec<StoredNotification>> {
        require_actor(recipient_id)?;
        Ok(self.notifications.list_for(recipient_id, filter).await?)
    }

    /// Mark a single notification read. Ids addressed to someone else are `NotFound`.
    pub async fn mark_read(&self, recipient_id: &str, notification_id: &str) -> Result<()> {
        require_actor(recipient_id)?;
        if self
            .notifications
            .mark_read(recipient_id, notification_id)
            .await?
        {
            Ok(())
        } else {
            Err(EchoError::NotFound(format!(
                "notification {}",
                notification_id
            )))
        }
    }

    pub async fn unread_count(&self, recipient_id: &str) -> Result<usize> {
        require_actor(recipient_id)?;
        Ok(self.notifications.unread_count(recipient_id).await?)
    }

    pub async fn mark_all_read(&self, recipient_id: &str) -> Result<usize> {
        require_actor(recipient_id)?;
        Ok(self.notifications.mark_all_read(recipient_id).await?)
    }

    // --- Overview ---

    pub async fn status(&self, user_id: &str) -> Result<UserStatus> {
        let doc = self
            .store
            .get(Collection::Users, user_id)
            .await?
            .ok_or_else(|| EchoError::NotFound(format!("user {}", user_id)))?;
        let profile: UserProfile = doc.decode()?;

        let mut posts = Vec::new();
        for doc in self
            .store
            .query(Collection::Posts, &[Filter::eq("userId", user_id)])
            .await?
        {
            let post: Post = doc.decode()?;
            posts.push(PostSummary {
                id: doc.id,
                content: post.content,
                like_count: post.like_count,
                comment_count: post.comment_count,
                timestamp: post.timestamp,
            });
        }
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(UserStatus {
            user_id: user_id.to_string(),
            profile,
            posts,
            unread_notifications: self.notifications.unread_count(user_id).await?,
        })
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.reconciler.run().await
    }
}
