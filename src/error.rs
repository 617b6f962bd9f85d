//! Error taxonomy of the feed engine.
//!
//! | Type              | Raised by                 | Fatal to the call?           |
//! |-------------------|---------------------------|------------------------------|
//! | `ValidationError` | ingest (`record*`)        | only for the offending event |
//! | `BatchError`      | fail-fast `record_batch`  | whole batch, nothing written |
//! | `GapError`        | `query`, `view`, `render` | yes, caller must resync      |
//! | `ReadError`       | changeset rendering       | yes                          |
//! | `BuildWarning`    | inventory folding         | never, event is skipped      |
//!
//! None of these leave the change memory unusable.

use std::fmt;

use thiserror::Error;

use crate::event::Seq;

/// Malformed resource event rejected at ingest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("resource id is empty")]
    EmptyResourceId,

    #[error("unknown event type `{0}` (expected create, update or delete)")]
    UnknownEventType(String),
}

/// A fail-fast batch was rejected before anything was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("batch rejected: event #{index} is invalid")]
pub struct BatchError {
    pub index: usize,
    #[source]
    pub source: ValidationError,
}

/// A read referenced history that has already been evicted.
///
/// The consumer must fall back to a full inventory resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "changes after sequence {requested} are no longer retained \
     (history evicted up to {horizon}); a full resync is required"
)]
pub struct GapError {
    /// Cursor the caller asked to continue from.
    pub requested: Seq,
    /// Highest evicted sequence number.
    pub horizon: Seq,
}

/// Changeset read failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error(transparent)]
    Gap(#[from] GapError),

    #[error("invalid changeset range: from {from} is after to {to}")]
    InvalidRange { from: Seq, to: Seq },
}

/// Non-fatal problem met while folding events into a resource set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    /// Sequence number of the skipped record (`None` for seeds and restores).
    pub seq: Option<Seq>,
    pub resource_id: String,
    pub error: ValidationError,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seq {
            Some(seq) => write!(f, "skipped #{seq} `{}`: {}", self.resource_id, self.error),
            None => write!(f, "skipped `{}`: {}", self.resource_id, self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_error_display() {
        let err = GapError {
            requested: 0,
            horizon: 2,
        };
        let display = err.to_string();
        assert!(display.contains("after sequence 0"));
        assert!(display.contains("evicted up to 2"));
        assert!(display.contains("resync"));
    }

    #[test]
    fn test_read_error_wraps_gap() {
        let gap = GapError {
            requested: 1,
            horizon: 5,
        };
        let err: ReadError = gap.into();
        assert_eq!(err, ReadError::Gap(gap));
        assert_eq!(err.to_string(), gap.to_string());
    }

    #[test]
    fn test_build_warning_display() {
        let warning = BuildWarning {
            seq: Some(7),
            resource_id: "a".to_string(),
            error: ValidationError::UnknownEventType("touch".to_string()),
        };
        assert_eq!(
            warning.to_string(),
            "skipped #7 `a`: unknown event type `touch` (expected create, update or delete)"
        );
    }
}
