//! # Coordinator Layer
//!
//! Coordinators own the write sequences that keep an edge, its counter and its
//! notification in agreement. Each gesture becomes an explicit, ordered list of
//! awaited store calls:
//!
//! ```text
//! like     insert edge ─▶ likeCount +1 ─▶ notify owner ─▶ re-fetch likeCount
//! unlike   query edges ─▶ delete edges ─▶ likeCount −1 ─▶ delete notification ─▶ re-fetch
//! follow   insert edge ─▶ followingCount +1 ─▶ followerCount +1 ─▶ notify ─▶ re-fetch
//! unfollow query edges ─▶ delete edges ─▶ followingCount −1 ─▶ followerCount −1 ─▶ delete notification ─▶ re-fetch
//! ```
//!
//! ## Failure Classes
//!
//! Every edge/counter step goes through a shared `WriteSequence`, which turns a
//! store error into either a clean `WriteFailure` (nothing committed) or a
//! `PartialInconsistency` (earlier writes are durable). Committed steps are
//! never undone here and there is no automatic retry; the
//! [`crate::reconcile::Reconciler`] re-derives counters out of band.
//!
//! Notification steps are outside the sequence. Their errors are logged and
//! dropped: the gesture still succeeds.
//!
//! ## Idempotence and Re-entry
//!
//! Edges are inserted under a deterministic id with `insert_if_absent`. Liking
//! something already liked finds the edge in place and skips the counter and
//! notification steps, so the edge count and the counter cannot diverge by
//! repetition. Concurrent calls for the same `(actor, aggregate)` in this
//! process are rejected by the [`InFlight`] registry.
//!
//! ## Explicit Actor
//!
//! There is no ambient "current user": every call takes the acting user id and
//! rejects an empty one with `Unauthenticated` before touching the store.

use crate::error::{EchoError, Result, StoreResult};
use crate::model::Collection;
use crate::store::RemoteStore;
use std::fmt::Display;
use tracing::warn;

pub mod comment;
pub mod follow;
pub mod guard;
pub(crate) mod sequence;
pub mod toggle;

pub use comment::{CommentOutcome, CommentService};
pub use follow::{FollowCoordinator, FollowOutcome};
pub use guard::{InFlight, InFlightGuard};
pub use toggle::{ToggleCoordinator, ToggleOutcome};

pub(crate) fn require_actor(actor_id: &str) -> Result<()> {
    if actor_id.trim().is_empty() {
        return Err(EchoError::Unauthenticated);
    }
    Ok(())
}

pub(crate) fn aggregate_key(kind: impl Display, id: &str) -> String {
    format!("{}:{}", kind, id)
}

/// Swallow a notification error after logging it.
pub(crate) fn best_effort<T>(what: &str, result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "{} failed; edge and counter are kept", what);
            None
        }
    }
}

/// Read the authoritative value of a counter after a sequence finished.
/// `None` means the value is unknown, not zero.
pub(crate) async fn fetch_counter<S: RemoteStore>(
    store: &S,
    collection: Collection,
    id: &str,
    field: &str,
) -> Option<i64> {
    match store.get(collection, id).await {
        Ok(Some(doc)) => Some(doc.counter(field)),
        Ok(None) => {
            warn!(%collection, %id, "document vanished before counter re-fetch");
            None
        }
        Err(e) => {
            warn!(%collection, %id, error = %e, "counter re-fetch failed");
            None
        }
    }
}
