use crate::error::{EchoError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Set of `(actor, aggregate)` pairs with a coordinator call in progress.
///
/// This is the duplicate-submission guard: a second gesture on the same
/// aggregate by the same actor fails fast with [`EchoError::InFlight`] instead
/// of racing the first. It is local to one process and does nothing about
/// other devices toggling the same target.
#[derive(Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<(String, String)>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `(actor, aggregate)`. The claim is released when the guard drops,
    /// including when the owning future is cancelled.
    pub fn try_acquire(&self, actor_id: &str, aggregate: String) -> Result<InFlightGuard> {
        let key = (actor_id.to_string(), aggregate);
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.clone()) {
            return Err(EchoError::InFlight(key.1));
        }
        Ok(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn is_pending(&self, actor_id: &str, aggregate: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(actor_id.to_string(), aggregate.to_string()))
    }
}

#[must_use = "the in-flight claim is released as soon as the guard is dropped"]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<(String, String)>>>,
    key: (String, String),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected_until_release() {
        let in_flight = InFlight::new();
        let guard = in_flight.try_acquire("alice", "post:p1".into()).unwrap();
        assert!(in_flight.is_pending("alice", "post:p1"));
        assert!(matches!(
            in_flight.try_acquire("alice", "post:p1".into()),
            Err(EchoError::InFlight(_))
        ));

        // Other actors and other aggregates are independent.
        assert!(in_flight.try_acquire("bob", "post:p1".into()).is_ok());
        assert!(in_flight.try_acquire("alice", "post:p2".into()).is_ok());

        drop(guard);
        assert!(!in_flight.is_pending("alice", "post:p1"));
        assert!(in_flight.try_acquire("alice", "post:p1".into()).is_ok());
    }
}
