use thiserror::Error;

use crate::domain::document::DocumentStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid document status transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: DocumentStatus, to: DocumentStatus },
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("unknown block type: {0}")]
    UnknownBlockType(String),
    #[error("content shape does not match block type {block_type}")]
    ContentShapeMismatch { block_type: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::DomainError;
    use crate::domain::document::DocumentStatus;

    #[test]
    fn transition_error_names_both_states() {
        let error = DomainError::InvalidStatusTransition {
            from: DocumentStatus::Published,
            to: DocumentStatus::Draft,
        };
        let rendered = error.to_string();
        assert!(rendered.contains("Published"));
        assert!(rendered.contains("Draft"));
    }
}
