//! Error types for mixkit.
//!
//! Collaborator boundaries (device transports, module loaders) report
//! [`anyhow::Error`]; the core wraps those into [`Error`] without losing the
//! source so callers can still inspect the underlying failure.

use std::collections::TryReserveError;

/// Errors returned by control sessions, mixers and the provider registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Growing an element index failed.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// An element that had to be present is missing.
    #[error("element not found: {0}")]
    NotFound(String),

    /// The active comparator reports equality against an existing element.
    #[error("element compares equal to an existing element: {0}")]
    DuplicateOrder(String),

    /// No built-in, registered or loadable provider exists for a type.
    #[error("mixer provider not found: {name}")]
    ProviderNotFound {
        /// Provider type name.
        name: String,
        /// Loader failure, when a module load was attempted.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A provider module loaded but lacks the versioned entry point.
    #[error("symbol `{symbol}` is not defined inside {module}")]
    SymbolMissing {
        /// The versioned symbol that was looked up.
        symbol: String,
        /// Module path or `[builtin]`.
        module: String,
    },

    /// Opaque failure surfaced unchanged from the device transport.
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// The operation is not valid for this element or argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A mixer definition is malformed or cannot be resolved.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A mixer already owns the maximum number of control sessions.
    #[error("no free control slot (maximum is {0})")]
    ControlSlotsExhausted(usize),

    /// Waiting on poll descriptors failed.
    #[error("poll failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a not-found error for the given element description.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates an invalid-argument error with the given reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("numid=20");
        assert_eq!(err.to_string(), "element not found: numid=20");
    }

    #[test]
    fn test_symbol_missing_display() {
        let err = Error::SymbolMissing {
            symbol: "_mixkit_mixer_foo_open__dlsym_mixer_001".to_string(),
            module: "/tmp/libmixkit_mixer_foo.so".to_string(),
        };
        assert!(err.to_string().contains("/tmp/libmixkit_mixer_foo.so"));
    }

    #[test]
    fn test_transport_keeps_source() {
        let err = Error::Transport(anyhow::anyhow!("device gone"));
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "device gone");
    }
}
