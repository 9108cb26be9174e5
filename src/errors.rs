use std::path::{Path, PathBuf};

/// All error types that can occur while driving the lights or serving clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The Bluetooth stack or adapter is unavailable.
    #[error("bluetooth error: {0}")]
    Bluetooth(String),

    /// A configuration file could not be read.
    #[error("cannot read {path:?}: {err:?}")]
    Io { path: PathBuf, err: std::io::Error },

    /// The hardware behind a device could not be reached or refused a write.
    #[error("device {address} unreachable: {reason}")]
    Connection { address: String, reason: String },

    /// A control-plane message could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A batch request combines fields in an unsupported way.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The configuration names a device kind this crate cannot drive.
    #[error("unsupported device kind {0:?}")]
    UnsupportedDeviceKind(String),

    /// The configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A device index outside of the configured range.
    #[error("device {0} not found")]
    DeviceNotFound(usize),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new io error for the given path
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            err,
        }
    }

    /// Create a new connection error
    pub fn connection(address: &str, reason: impl ToString) -> Self {
        Error::Connection {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn bluetooth(reason: impl ToString) -> Self {
        Error::Bluetooth(reason.to_string())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedPayload(reason.into())
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Error::InvalidRequest(reason.into())
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig(reason.into())
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
