//! Error types for autoballoon.

use crate::state::LifecycleState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using autoballoon's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while controlling a domain's balloon.
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    /// Could not connect to the hypervisor.
    #[error("connection to {uri} failed: {message}")]
    Connection {
        /// Connection URI.
        uri: String,
        /// Error message.
        message: String,
    },

    /// Domain lookup failed.
    #[error("domain not found: {0}")]
    DomainNotFound(String),

    /// Enabling periodic memory statistics failed.
    #[error("failed to set statistics period on {domain}: {message}")]
    StatisticsPeriod {
        /// Domain name.
        domain: String,
        /// Error message.
        message: String,
    },

    /// The domain state could not be queried.
    #[error("failed to query state of {domain}: {message}")]
    StateQuery {
        /// Domain name.
        domain: String,
        /// Error message.
        message: String,
    },

    /// The hypervisor reported a state nothing handles.
    #[error("no handler registered for domain state {0}")]
    UnmappedState(LifecycleState),

    // Per-tick errors
    /// Memory statistics could not be retrieved.
    #[error("failed to read memory statistics of {domain}: {message}")]
    Stats {
        /// Domain name.
        domain: String,
        /// Error message.
        message: String,
    },

    /// The balloon resize request was rejected.
    #[error("failed to resize {domain} to {target_kib} KiB: {message}")]
    Resize {
        /// Domain name.
        domain: String,
        /// Requested allocation.
        target_kib: u64,
        /// Error message.
        message: String,
    },

    // Configuration errors
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to load a configuration file.
    #[error("failed to load config {}: {message}", path.display())]
    ConfigLoad {
        /// Path of the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    // Command execution errors
    /// External command failed.
    #[error("command failed: {command}: {message}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Error message.
        message: String,
    },

    // IO errors
    /// IO error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a connection error.
    pub fn connection(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a stats error.
    pub fn stats(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stats {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a resize error.
    pub fn resize(domain: impl Into<String>, target_kib: u64, message: impl Into<String>) -> Self {
        Self::Resize {
            domain: domain.into(),
            target_kib,
            message: message.into(),
        }
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether this error must stop the controller.
    ///
    /// Stats and resize failures are absorbed by the tick that produced them;
    /// everything else aborts the loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Stats { .. } | Error::Resize { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_includes_uri() {
        let err = Error::connection("qemu:///system", "permission denied");
        let msg = err.to_string();
        assert!(msg.contains("qemu:///system"), "Error should include URI");
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_domain_not_found_includes_name() {
        let err = Error::DomainNotFound("win11".to_string());
        assert!(err.to_string().contains("win11"), "Error should include domain");
    }

    #[test]
    fn test_resize_includes_target() {
        let err = Error::resize("win11", 2_170_880, "balloon driver missing");
        let msg = err.to_string();
        assert!(msg.contains("2170880"), "Error should include the target");
        assert!(msg.contains("balloon driver missing"));
    }

    #[test]
    fn test_unmapped_state_names_state() {
        let err = Error::UnmappedState(LifecycleState::Crashed);
        assert!(err.to_string().contains("crashed"));
    }

    #[test]
    fn test_config_load_includes_path() {
        let err = Error::ConfigLoad {
            path: PathBuf::from("/etc/autoballoon.toml"),
            message: "expected `=`".to_string(),
        };
        assert!(err.to_string().contains("/etc/autoballoon.toml"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!Error::stats("vm", "timeout").is_fatal());
        assert!(!Error::resize("vm", 1024, "denied").is_fatal());
        assert!(Error::DomainNotFound("vm".into()).is_fatal());
        assert!(Error::UnmappedState(LifecycleState::Blocked).is_fatal());
        assert!(Error::config("bad").is_fatal());
    }
}
