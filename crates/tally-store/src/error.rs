use std::fmt;

/// Failure of a store operation.
///
/// Both variants are transient from the reconcile engine's point of view:
/// the attempt is abandoned and the next tick starts from fresh state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The record changed between the attempt's read and its publish.
    /// The record was left untouched.
    Conflict {
        key: String,
        /// Value the publisher expected to find.
        expected: u64,
    },

    /// The store could not be reached, or the stored value is not a valid
    /// non-negative integer.
    Unavailable { key: String, reason: String },
}

impl StoreError {
    pub fn conflict(key: &str, expected: u64) -> Self {
        StoreError::Conflict {
            key: key.to_string(),
            expected,
        }
    }

    pub fn unavailable(key: &str, reason: impl fmt::Display) -> Self {
        StoreError::Unavailable {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict { key, expected } => write!(
                f,
                "conflict on {key}: record no longer holds expected value {expected}"
            ),
            StoreError::Unavailable { key, reason } => {
                write!(f, "store unavailable for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
