//! # Reconciliation
//!
//! The coordinators never retry and never undo a committed step, so a
//! `PartialInconsistency` leaves drift behind: an edge without its counter
//! increment, or a counter bumped for an edge that was never written. This pass
//! treats the edge records as the source of truth and brings everything else
//! back in line:
//!
//! 1. Edge cleanup: duplicate records for one `(actor, target, kind)` triple are
//!    collapsed to one stored under the deterministic id (a lone record under
//!    an older random id is moved there), and edges pointing at a missing
//!    document are removed.
//! 2. Counters: `likeCount`, `followerCount` and `followingCount` are compared
//!    with the edge tally and corrected by a signed increment of the
//!    difference. Each counter is re-read just before its correction.
//!
//! The pass is not isolated from gestures. One that lands between the edge scan
//! and a counter correction can leave that counter off by one; the next pass
//! run while no gestures are in flight settles it.
//! 3. Notifications: like/follow notifications without a live edge (or
//!    duplicated) are deleted; live non-self edges missing their notification
//!    get one.
//!
//! Running the pass twice in a row reports nothing the second time.

use crate::error::Result;
use crate::model::{
    follow_id, like_id, Collection, Document, NotificationType, TargetType, FOLLOWER_COUNT,
    FOLLOWING_COUNT, LIKE_COUNT,
};
use crate::notifications::{Delivery, NotificationService};
use crate::store::RemoteStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub duplicate_edges_removed: usize,
    pub edges_rekeyed: usize,
    pub dangling_edges_removed: usize,
    pub like_counts_fixed: usize,
    pub follow_counts_fixed: usize,
    pub stale_notifications_removed: usize,
    pub notifications_restored: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// `(recipient, sender, type, target)`
type NotificationKey = (String, String, NotificationType, String);

pub struct Reconciler<S> {
    store: Arc<S>,
    notifications: NotificationService<S>,
}

impl<S: RemoteStore> Reconciler<S> {
    pub fn new(store: Arc<S>, notifications: NotificationService<S>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    pub async fn run(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let posts = self.index(Collection::Posts).await?;
        let comments = self.index(Collection::Comments).await?;
        let users = self.index(Collection::Users).await?;

        let likes = self.live_likes(&posts, &comments, &mut report).await?;
        let follows = self.live_follows(&users, &mut report).await?;

        // Counters
        let mut like_tally: HashMap<(TargetType, &str), i64> = HashMap::new();
        for (_, target, kind) in &likes {
            *like_tally.entry((*kind, target.as_str())).or_default() += 1;
        }
        for (kind, docs) in [(TargetType::Post, &posts), (TargetType::Comment, &comments)] {
            for (id, doc) in docs {
                let expected = like_tally
                    .get(&(kind, id.as_str()))
                    .copied()
                    .unwrap_or(0);
                if self
                    .correct(kind.collection(), doc, LIKE_COUNT, expected)
                    .await?
                {
                    report.like_counts_fixed += 1;
                }
            }
        }

        let mut followers: HashMap<&str, i64> = HashMap::new();
        let mut following: HashMap<&str, i64> = HashMap::new();
        for (follower, followed) in &follows {
            *following.entry(follower.as_str()).or_default() += 1;
            *followers.entry(followed.as_str()).or_default() += 1;
        }
        for (id, doc) in &users {
            for (field, tally) in [(FOLLOWER_COUNT, &followers), (FOLLOWING_COUNT, &following)] {
                let expected = tally.get(id.as_str()).copied().unwrap_or(0);
                if self.correct(Collection::Users, doc, field, expected).await? {
                    report.follow_counts_fixed += 1;
                }
            }
        }

        // Notifications
        let mut expected: HashSet<NotificationKey> = HashSet::new();
        for (actor, target, kind) in &likes {
            let docs = match kind {
                TargetType::Post => &posts,
                TargetType::Comment => &comments,
            };
            let Some(owner) = docs.get(target).and_then(|d| d.str_field("userId")) else {
                continue;
            };
            if owner != actor.as_str() {
                expected.insert((
                    owner.to_string(),
                    actor.clone(),
                    kind.like_notification(),
                    target.clone(),
                ));
            }
        }
        for (follower, followed) in &follows {
            if follower != followed {
                expected.insert((
                    followed.clone(),
                    follower.clone(),
                    NotificationType::Follow,
                    followed.clone(),
                ));
            }
        }

        let mut present: HashSet<NotificationKey> = HashSet::new();
        for doc in self.store.query(Collection::Notifications, &[]).await? {
            let Some(key) = notification_key(&doc) else {
                continue;
            };
            if !expected.contains(&key) || !present.insert(key) {
                if self.store.delete(Collection::Notifications, &doc.id).await? {
                    report.stale_notifications_removed += 1;
                }
            }
        }

        for (_recipient, sender, kind, target) in expected.difference(&present) {
            let delivery = match kind {
                NotificationType::Follow => {
                    self.notifications
                        .create_follow_notification(sender, target)
                        .await?
                }
                NotificationType::LikePost => {
                    self.notifications
                        .create_like_notification(sender, target, TargetType::Post)
                        .await?
                }
                NotificationType::LikeComment => {
                    self.notifications
                        .create_like_notification(sender, target, TargetType::Comment)
                        .await?
                }
                NotificationType::Comment => continue,
            };
            if matches!(delivery, Delivery::Created(_)) {
                report.notifications_restored += 1;
            }
        }

        if report.is_clean() {
            debug!("reconcile: nothing to do");
        } else {
            info!(?report, "reconcile applied fixes");
        }
        Ok(report)
    }

    async fn index(&self, collection: Collection) -> Result<BTreeMap<String, Document>> {
        Ok(self
            .store
            .query(collection, &[])
            .await?
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect())
    }

    /// Like triples that survive cleanup, one per `(actor, target, kind)`.
    async fn live_likes(
        &self,
        posts: &BTreeMap<String, Document>,
        comments: &BTreeMap<String, Document>,
        report: &mut ReconcileReport,
    ) -> Result<Vec<(String, String, TargetType)>> {
        let mut grouped: BTreeMap<(String, String, TargetType), Vec<Document>> = BTreeMap::new();
        for doc in self.store.query(Collection::Likes, &[]).await? {
            let parsed = (
                doc.str_field("userId"),
                doc.str_field("targetId"),
                doc.str_field("targetType").and_then(parse_target_type),
            );
            let (Some(user), Some(target), Some(kind)) = parsed else {
                warn!(id = %doc.id, "skipping malformed like record");
                continue;
            };
            let key = (user.to_string(), target.to_string(), kind);
            grouped.entry(key).or_default().push(doc);
        }

        let mut live = Vec::with_capacity(grouped.len());
        for ((user, target, kind), docs) in grouped {
            let exists = match kind {
                TargetType::Post => posts.contains_key(&target),
                TargetType::Comment => comments.contains_key(&target),
            };
            if !exists {
                for doc in &docs {
                    self.store.delete(Collection::Likes, &doc.id).await?;
                }
                report.dangling_edges_removed += docs.len();
                continue;
            }
            let canonical = like_id(&user, &target, kind);
            self.collapse(Collection::Likes, &docs, &canonical, report)
                .await?;
            live.push((user, target, kind));
        }
        Ok(live)
    }

    async fn live_follows(
        &self,
        users: &BTreeMap<String, Document>,
        report: &mut ReconcileReport,
    ) -> Result<Vec<(String, String)>> {
        let mut grouped: BTreeMap<(String, String), Vec<Document>> = BTreeMap::new();
        for doc in self.store.query(Collection::Follows, &[]).await? {
            let (Some(follower), Some(followed)) =
                (doc.str_field("followerId"), doc.str_field("followingId"))
            else {
                warn!(id = %doc.id, "skipping malformed follow record");
                continue;
            };
            let key = (follower.to_string(), followed.to_string());
            grouped.entry(key).or_default().push(doc);
        }

        let mut live = Vec::with_capacity(grouped.len());
        for ((follower, followed), docs) in grouped {
            if !users.contains_key(&follower) || !users.contains_key(&followed) {
                for doc in &docs {
                    self.store.delete(Collection::Follows, &doc.id).await?;
                }
                report.dangling_edges_removed += docs.len();
                continue;
            }
            let canonical = follow_id(&follower, &followed);
            self.collapse(Collection::Follows, &docs, &canonical, report)
                .await?;
            live.push((follower, followed));
        }
        Ok(live)
    }

    /// Leave exactly one record of a group, stored under `canonical`.
    ///
    /// Without a canonical record the first one is copied there before the
    /// group is deleted, so later `insert_if_absent` calls see the edge.
    async fn collapse(
        &self,
        collection: Collection,
        docs: &[Document],
        canonical: &str,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let mut extra = docs.iter().filter(|doc| doc.id != canonical);
        if !docs.iter().any(|doc| doc.id == canonical) {
            if let Some(first) = extra.next() {
                self.store
                    .insert_if_absent(collection, canonical, first.fields.clone())
                    .await?;
                self.store.delete(collection, &first.id).await?;
                debug!(%collection, from = %first.id, to = %canonical, "edge re-keyed");
                report.edges_rekeyed += 1;
            }
        }
        for doc in extra {
            if self.store.delete(collection, &doc.id).await? {
                report.duplicate_edges_removed += 1;
            }
        }
        Ok(())
    }

    async fn correct(
        &self,
        collection: Collection,
        doc: &Document,
        field: &str,
        expected: i64,
    ) -> Result<bool> {
        let Some(current) = self.store.get(collection, &doc.id).await? else {
            return Ok(false);
        };
        let diff = expected - current.counter(field);
        if diff == 0 {
            return Ok(false);
        }
        debug!(%collection, id = %doc.id, field, diff, "correcting counter");
        self.store
            .increment_field(collection, &doc.id, field, diff)
            .await?;
        Ok(true)
    }
}

fn parse_target_type(raw: &str) -> Option<TargetType> {
    match raw {
        "post" => Some(TargetType::Post),
        "comment" => Some(TargetType::Comment),
        _ => None,
    }
}

fn notification_key(doc: &Document) -> Option<NotificationKey> {
    let kind = match doc.str_field("type")? {
        "LIKE_POST" => NotificationType::LikePost,
        "LIKE_COMMENT" => NotificationType::LikeComment,
        "FOLLOW" => NotificationType::Follow,
        _ => return None,
    };
    Some((
        doc.str_field("recipientId")?.to_string(),
        doc.str_field("senderId")?.to_string(),
        kind,
        doc.str_field("targetId")?.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{FollowCoordinator, InFlight, ToggleCoordinator};
    use crate::model::{FollowRecord, LikeRecord};
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::{Fault, MemStore, Op};
    use serde_json::json;

    async fn setup() -> Arc<MemStore> {
        Arc::new(
            StoreFixture::new()
                .with_user("alice", "Alice")
                .await
                .with_user("bob", "Bob")
                .await
                .with_post("p1", "bob", 0)
                .await
                .store,
        )
    }

    fn reconciler(store: &Arc<MemStore>) -> Reconciler<MemStore> {
        Reconciler::new(Arc::clone(store), NotificationService::new(Arc::clone(store)))
    }

    async fn counter(store: &MemStore, collection: Collection, id: &str, field: &str) -> i64 {
        store
            .get(collection, id)
            .await
            .unwrap()
            .unwrap()
            .counter(field)
    }

    #[tokio::test]
    async fn consistent_store_is_left_alone() {
        let store = setup().await;
        let toggles = ToggleCoordinator::new(
            Arc::clone(&store),
            NotificationService::new(Arc::clone(&store)),
            InFlight::new(),
        );
        toggles
            .toggle("alice", "p1", TargetType::Post, false)
            .await
            .unwrap();
        assert!(reconciler(&store).run().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn heals_like_counter_after_partial_failure() {
        let store = setup().await;
        let toggles = ToggleCoordinator::new(
            Arc::clone(&store),
            NotificationService::new(Arc::clone(&store)),
            InFlight::new(),
        );
        store.fail(Fault::on(Op::Increment, Collection::Posts));
        let err = toggles
            .toggle("alice", "p1", TargetType::Post, false)
            .await
            .unwrap_err();
        assert!(err.left_partial_state());
        store.clear_faults();

        let report = reconciler(&store).run().await.unwrap();
        assert_eq!(report.like_counts_fixed, 1);
        assert_eq!(report.notifications_restored, 1);
        assert_eq!(counter(&store, Collection::Posts, "p1", LIKE_COUNT).await, 1);
        assert!(reconciler(&store).run().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn heals_follower_count_after_partial_failure() {
        let store = setup().await;
        let follows = FollowCoordinator::new(
            Arc::clone(&store),
            NotificationService::new(Arc::clone(&store)),
            InFlight::new(),
        );
        store.fail(Fault::on(Op::Increment, Collection::Users).field(FOLLOWER_COUNT));
        assert!(follows.toggle("alice", "bob", false).await.is_err());
        store.clear_faults();

        let report = reconciler(&store).run().await.unwrap();
        assert_eq!(report.follow_counts_fixed, 1);
        assert_eq!(counter(&store, Collection::Users, "bob", FOLLOWER_COUNT).await, 1);
        assert_eq!(counter(&store, Collection::Users, "alice", FOLLOWING_COUNT).await, 1);
    }

    #[tokio::test]
    async fn collapses_legacy_duplicate_likes() {
        let store = setup().await;
        let record = LikeRecord::new("alice", "p1", TargetType::Post);
        let fields = crate::model::to_fields(&record).unwrap();
        store
            .seed(Collection::Likes, "legacy-1", json!(fields.clone()))
            .await;
        store
            .seed(Collection::Likes, "legacy-2", json!(fields))
            .await;
        store
            .seed(Collection::Posts, "p1", json!({"userId": "bob", "likeCount": 2}))
            .await;

        let report = reconciler(&store).run().await.unwrap();
        assert_eq!(report.edges_rekeyed, 1);
        assert_eq!(report.duplicate_edges_removed, 1);
        assert_eq!(report.like_counts_fixed, 1);
        let likes = store.documents(Collection::Likes).await;
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].id, record.doc_id());
        assert_eq!(counter(&store, Collection::Posts, "p1", LIKE_COUNT).await, 1);
    }

    #[tokio::test]
    async fn lone_legacy_like_is_rekeyed_and_stays_single() {
        let store = setup().await;
        let record = LikeRecord::new("alice", "p1", TargetType::Post);
        store
            .seed(
                Collection::Likes,
                "legacy-random-id",
                json!(crate::model::to_fields(&record).unwrap()),
            )
            .await;
        store
            .seed(Collection::Posts, "p1", json!({"userId": "bob", "likeCount": 1}))
            .await;

        let report = reconciler(&store).run().await.unwrap();
        assert_eq!(report.edges_rekeyed, 1);
        assert_eq!(report.duplicate_edges_removed, 0);
        assert_eq!(report.like_counts_fixed, 0);

        let toggles = ToggleCoordinator::new(
            Arc::clone(&store),
            NotificationService::new(Arc::clone(&store)),
            InFlight::new(),
        );
        let outcome = toggles
            .toggle("alice", "p1", TargetType::Post, false)
            .await
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.like_count, Some(1));
        let likes = store.documents(Collection::Likes).await;
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].id, record.doc_id());
        assert!(reconciler(&store).run().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn lone_legacy_follow_is_rekeyed() {
        let store = setup().await;
        let record = FollowRecord::new("alice", "bob");
        store
            .seed(
                Collection::Follows,
                "legacy-random-id",
                json!(crate::model::to_fields(&record).unwrap()),
            )
            .await;

        let report = reconciler(&store).run().await.unwrap();
        assert_eq!(report.edges_rekeyed, 1);
        let follows = store.documents(Collection::Follows).await;
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].id, record.doc_id());
        assert_eq!(counter(&store, Collection::Users, "bob", FOLLOWER_COUNT).await, 1);
    }

    #[tokio::test]
    async fn counter_correction_reads_the_current_value() {
        let store = setup().await;
        let stale = store.get(Collection::Posts, "p1").await.unwrap().unwrap();
        // A gesture lands after the scan took its snapshot.
        store
            .increment_field(Collection::Posts, "p1", LIKE_COUNT, 1)
            .await
            .unwrap();

        let fixed = reconciler(&store)
            .correct(Collection::Posts, &stale, LIKE_COUNT, 1)
            .await
            .unwrap();
        assert!(!fixed);
        assert_eq!(counter(&store, Collection::Posts, "p1", LIKE_COUNT).await, 1);
    }

    #[tokio::test]
    async fn removes_edges_and_notifications_without_a_target() {
        let store = setup().await;
        let record = LikeRecord::new("alice", "gone", TargetType::Post);
        store
            .seed(
                Collection::Likes,
                &record.doc_id(),
                json!(crate::model::to_fields(&record).unwrap()),
            )
            .await;
        store
            .seed(
                Collection::Notifications,
                "n1",
                json!({
                    "recipientId": "bob",
                    "senderId": "alice",
                    "type": "LIKE_POST",
                    "targetId": "gone",
                    "read": false,
                    "timestamp": "2024-01-01T00:00:00Z",
                }),
            )
            .await;

        let report = reconciler(&store).run().await.unwrap();
        assert_eq!(report.dangling_edges_removed, 1);
        assert_eq!(report.stale_notifications_removed, 1);
        assert!(store.documents(Collection::Likes).await.is_empty());
        assert!(store.documents(Collection::Notifications).await.is_empty());
    }

    #[tokio::test]
    async fn comment_notifications_are_not_touched() {
        let store = setup().await;
        store
            .seed(
                Collection::Notifications,
                "c",
                json!({
                    "recipientId": "bob",
                    "senderId": "alice",
                    "type": "COMMENT",
                    "targetId": "p1",
                    "content": "hi",
                    "read": false,
                    "timestamp": "2024-01-01T00:00:00Z",
                }),
            )
            .await;
        assert!(reconciler(&store).run().await.unwrap().is_clean());
        assert_eq!(store.documents(Collection::Notifications).await.len(), 1);
    }
}
