//! Data-integrity errors raised while building a [`Case`](crate::Case) or
//! validating the optional resources attached to it.
//!
//! These are fail-fast errors: they surface before any linear program is
//! constructed and are never retried.

use thiserror::Error;

/// Errors from case construction and resource validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseError {
    /// A generator, branch, storage unit, or flexibility entry references a
    /// bus that is not in the bus table.
    #[error("{element} references unknown bus {bus}")]
    DanglingBus { element: String, bus: u64 },

    /// Ids must be unique within each collection.
    #[error("duplicate {collection} id {id}")]
    DuplicateId { collection: &'static str, id: u64 },

    /// A numeric field holds a value the model cannot represent.
    #[error("invalid {field} for {element}: {reason}")]
    InvalidValue {
        element: String,
        field: &'static str,
        reason: String,
    },

    /// A required collection is empty.
    #[error("case has no {0}")]
    Empty(&'static str),
}

impl CaseError {
    pub(crate) fn invalid(
        element: impl std::fmt::Display,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        CaseError::InvalidValue {
            element: element.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for results carrying a [`CaseError`].
pub type CaseResult<T> = Result<T, CaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaseError::DanglingBus {
            element: "gen 4".into(),
            bus: 99,
        };
        assert_eq!(err.to_string(), "gen 4 references unknown bus 99");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = CaseError::invalid("branch 2", "reactance", "must be non-zero");
        assert!(err.to_string().contains("reactance"));
        assert!(err.to_string().contains("branch 2"));
    }
}
