//! Error types for the regir pipeline

use thiserror::Error;

/// Pipeline errors.
///
/// Every error is fatal for the operation that raised it; nothing in the
/// crate retries or recovers locally. Hosts decide how to surface them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Structural errors
    /// A jump target is in the wrong resolution state, or names no label
    ///
    /// **Triggered by:** Building a CFG over already-resolved code, resolving
    /// labels twice, jumping to a label that is not defined in the same
    /// instruction array, or declaring the same function name twice
    /// **Example:** `goto .L7` in a body that has no `label .L7`
    #[error("Structural error at instruction {index}: {message}")]
    Structural {
        /// Instruction index where the problem was found
        index: usize,
        /// Error description
        message: String,
    },

    // Analysis errors
    /// Dataflow join over states with different register universes
    ///
    /// **Triggered by:** An internal invariant violation in an analysis,
    /// never by user input
    #[error("Lattice error: {message}")]
    Lattice {
        /// Error description
        message: String,
    },

    // Runtime errors
    /// Execution fault
    ///
    /// **Triggered by:** Reading an undefined register, jumping through an
    /// unresolved label, calling an unknown function, returning with an
    /// empty call stack, dividing by zero, or touching memory that was never
    /// allocated
    /// **Example:** `ret 0` at top level (call/return stack underflow)
    #[error("Runtime fault at instruction {index}: {message}")]
    Runtime {
        /// Instruction index that was executing
        index: usize,
        /// Error description
        message: String,
    },

    /// Optional executor step budget exhausted
    #[error("Execution limit exceeded (max: {limit} steps)")]
    StepLimitExceeded {
        /// Maximum allowed steps
        limit: u64,
    },
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error caused by the input program or its execution
    Fatal,
    /// Internal invariant violation inside the crate
    Internal,
}

impl Error {
    /// Create a structural error at an instruction index
    pub fn structural(index: usize, msg: impl Into<String>) -> Self {
        Error::Structural {
            index,
            message: msg.into(),
        }
    }

    /// Create a runtime fault at an instruction index
    pub fn runtime(index: usize, msg: impl Into<String>) -> Self {
        Error::Runtime {
            index,
            message: msg.into(),
        }
    }

    /// Create a lattice error
    pub fn lattice(msg: impl Into<String>) -> Self {
        Error::Lattice {
            message: msg.into(),
        }
    }

    /// Instruction index carried by the error, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            Error::Structural { index, .. } | Error::Runtime { index, .. } => Some(*index),
            Error::Lattice { .. } | Error::StepLimitExceeded { .. } => None,
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::Lattice { .. } => ErrorSeverity::Internal,
            Error::Structural { .. } | Error::Runtime { .. } | Error::StepLimitExceeded { .. } => {
                ErrorSeverity::Fatal
            }
        }
    }
}

/// Result type for regir operations
pub type Result<T> = std::result::Result<T, Error>;
