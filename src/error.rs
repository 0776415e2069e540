//! Error types for the runtime's public API boundary.
//!
//! Internal helpers return [`anyhow::Result`] and attach context with
//! `.with_context(|| ...)`, the same idiom the rest of this crate's
//! correlated-randomness and VOLE layers already use. [`MpcError`] is the
//! typed error surfaced at [crate::runtime::Runtime] method boundaries so an
//! embedding application can match on failure kind instead of parsing a
//! string.

use thiserror::Error;

/// Errors surfaced by the runtime's public API.
#[derive(Debug, Error)]
pub enum MpcError {
    /// Two vectors involved in an operation have different sizes.
    #[error("size mismatch: expected {expected}, got {got}")]
    SizeMismatch {
        /// Size the operation required.
        expected: usize,
        /// Size actually observed.
        got: usize,
    },

    /// Two vectors involved in an operation carry different fixed-point
    /// precisions.
    #[error("precision mismatch: expected {expected}, got {got}")]
    PrecisionMismatch {
        /// Precision the operation required.
        expected: u32,
        /// Precision actually observed.
        got: u32,
    },

    /// A communicator operation was asked to send or receive a non-plain
    /// (strided/cyclic/repeated/...) view; only plain views may cross the
    /// wire.
    #[error("view must be materialized (plain) before it can be communicated")]
    ViewNotPlain,

    /// A malicious-security check failed; the protocol run must be aborted.
    #[error("malicious behavior detected, suspected parties: {suspects:?}")]
    MaliciousAbort {
        /// Party ranks whose shares were inconsistent with the check.
        suspects: Vec<usize>,
    },

    /// A transport-level I/O error (socket disconnect, bind failure, ...).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Invalid runtime configuration (bad party count, missing environment
    /// variable, malformed group, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The permutation manager's queue was empty when a permutation was
    /// requested; the caller already got a synchronously-generated
    /// replacement, but reserve sizes should be revisited.
    #[error("permutation queue underflow for size {0}")]
    PermutationUnderflow(usize),
}

/// Convenience alias for runtime public API results.
pub type Result<T> = std::result::Result<T, MpcError>;
