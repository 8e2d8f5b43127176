use std::fmt;
use thiserror::Error;

/// A single remote operation inside a like/follow/comment write sequence.
///
/// Steps are reported in errors so callers can tell exactly where a sequence
/// stopped and which earlier writes are already durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    QueryEdges,
    InsertEdge,
    DeleteEdge,
    IncrementCounter,
    DecrementCounter,
    IncrementFollowing,
    DecrementFollowing,
    IncrementFollower,
    DecrementFollower,
    InsertComment,
    IncrementCommentCount,
}

impl Step {
    /// Reads do not commit anything, so a failed sequence that only ran reads
    /// is still a clean `WriteFailure`.
    pub fn is_write(self) -> bool {
        !matches!(self, Step::QueryEdges)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::QueryEdges => "query edge records",
            Step::InsertEdge => "insert edge record",
            Step::DeleteEdge => "delete edge records",
            Step::IncrementCounter => "increment counter",
            Step::DecrementCounter => "decrement counter",
            Step::IncrementFollowing => "increment followingCount",
            Step::DecrementFollowing => "decrement followingCount",
            Step::IncrementFollower => "increment followerCount",
            Step::DecrementFollower => "decrement followerCount",
            Step::InsertComment => "insert comment",
            Step::IncrementCommentCount => "increment commentCount",
        };
        f.write_str(name)
    }
}

/// Failures of a single store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Document {collection}/{id} does not exist")]
    DocumentMissing { collection: String, id: String },

    #[error("Field {field} of {collection}/{id} is not an integer")]
    NotAnInteger {
        collection: String,
        id: String,
        field: String,
    },

    #[error("Adding to {field} of {collection}/{id} would overflow")]
    CounterOverflow {
        collection: String,
        id: String,
        field: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum EchoError {
    #[error("No signed-in user; action rejected")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Another {0} is already in flight")]
    InFlight(String),

    #[error("{step} failed: {source}")]
    WriteFailure {
        step: Step,
        #[source]
        source: StoreError,
    },

    #[error("{failed} failed after {} committed step(s): {source}", committed.len())]
    PartialInconsistency {
        committed: Vec<Step>,
        failed: Step,
        #[source]
        source: StoreError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),
}

impl EchoError {
    /// Whether some write already reached the store before the error.
    pub fn left_partial_state(&self) -> bool {
        matches!(self, EchoError::PartialInconsistency { .. })
    }
}

pub type Result<T> = std::result::Result<T, EchoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_not_writes() {
        assert!(!Step::QueryEdges.is_write());
        assert!(Step::InsertEdge.is_write());
        assert!(Step::DecrementFollower.is_write());
    }

    #[test]
    fn partial_inconsistency_message_names_failed_step() {
        let err = EchoError::PartialInconsistency {
            committed: vec![Step::InsertEdge],
            failed: Step::IncrementCounter,
            source: StoreError::Unavailable("offline".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("increment counter"));
        assert!(msg.contains("1 committed"));
        assert!(err.left_partial_state());
    }
}
