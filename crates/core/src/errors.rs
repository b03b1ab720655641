use thiserror::Error;

/// Violations of invariants the domain itself guarantees, as opposed to bad
/// external input. Reaching one of these means a caller routed wrong; jobs
/// that hit them are failed, never silently patched up.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
