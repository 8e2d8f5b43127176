use crate::error::{EchoError, StoreResult, Step};
use std::future::Future;
use tracing::{debug, error};

/// Runs the steps of one like/follow/comment cycle in order and classifies a
/// failure by what had already committed.
///
/// - Nothing written yet: [`EchoError::WriteFailure`]. The store is exactly as
///   it was before the gesture.
/// - Some write landed: [`EchoError::PartialInconsistency`]. Earlier writes are
///   left in place; the reconciliation pass heals the resulting drift.
pub(crate) struct WriteSequence {
    action: &'static str,
    committed: Vec<Step>,
}

impl WriteSequence {
    pub(crate) fn new(action: &'static str) -> Self {
        Self {
            action,
            committed: Vec::new(),
        }
    }

    pub(crate) async fn step<T, F>(&mut self, step: Step, op: F) -> Result<T, EchoError>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match op.await {
            Ok(value) => {
                debug!(action = self.action, %step, "step done");
                if step.is_write() {
                    self.committed.push(step);
                }
                Ok(value)
            }
            Err(source) if self.committed.is_empty() => {
                debug!(action = self.action, %step, error = %source, "step failed, nothing committed");
                Err(EchoError::WriteFailure { step, source })
            }
            Err(source) => {
                error!(
                    action = self.action,
                    failed = %step,
                    committed = ?self.committed,
                    error = %source,
                    "partial write; counters may drift until reconciled"
                );
                Err(EchoError::PartialInconsistency {
                    committed: self.committed.clone(),
                    failed: step,
                    source,
                })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn committed(&self) -> &[Step] {
        &self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn offline<T>() -> StoreResult<T> {
        Err(StoreError::Unavailable("offline".into()))
    }

    #[tokio::test]
    async fn first_write_failure_is_clean() {
        let mut seq = WriteSequence::new("like");
        let err = seq
            .step(Step::InsertEdge, async { offline::<()>() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EchoError::WriteFailure {
                step: Step::InsertEdge,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn reads_do_not_count_as_committed() {
        let mut seq = WriteSequence::new("unlike");
        seq.step(Step::QueryEdges, async { Ok(()) }).await.unwrap();
        assert!(seq.committed().is_empty());
        let err = seq
            .step(Step::DeleteEdge, async { offline::<usize>() })
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::WriteFailure { .. }));
    }

    #[tokio::test]
    async fn later_failure_reports_committed_steps() {
        let mut seq = WriteSequence::new("follow");
        seq.step(Step::InsertEdge, async { Ok(true) }).await.unwrap();
        seq.step(Step::IncrementFollowing, async { Ok(()) })
            .await
            .unwrap();
        let err = seq
            .step(Step::IncrementFollower, async { offline::<()>() })
            .await
            .unwrap_err();
        match err {
            EchoError::PartialInconsistency {
                committed, failed, ..
            } => {
                assert_eq!(committed, vec![Step::InsertEdge, Step::IncrementFollowing]);
                assert_eq!(failed, Step::IncrementFollower);
            }
            other => panic!("expected PartialInconsistency, got {:?}", other),
        }
    }
}
