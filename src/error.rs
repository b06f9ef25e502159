//! Error types shared by host adapters and the reconciler.

use thiserror::Error;

use crate::types::RootId;

/// Errors raised by a host adapter operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The engine invoked an operation the backend forbids in this state.
    ///
    /// Always fatal: it means the engine and the adapter disagree about the
    /// contract, so it is propagated instead of being swallowed.
    #[error("host contract violation in `{operation}`: {reason}")]
    ContractViolation {
        /// Name of the adapter operation that was called.
        operation: &'static str,
        /// What the backend expected instead.
        reason: String,
    },

    /// The backend failed to carry out an otherwise valid operation.
    #[error("host backend failure: {0}")]
    Backend(String),
}

impl HostError {
    /// Build a contract violation for `operation`.
    pub fn contract(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            operation,
            reason: reason.into(),
        }
    }

    /// Build a backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Whether this error signals an engine/adapter mismatch.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }
}

/// Errors surfaced to callers of the reconciler and the container registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcilerError {
    /// A host adapter operation failed while rendering or committing.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The root handle does not belong to this reconciler.
    #[error("unknown root {0}")]
    UnknownRoot(RootId),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReconcilerError>;
