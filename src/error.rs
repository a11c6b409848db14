//! Error types for the SFTP client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("SSH protocol error: {0}")]
    Protocol(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Reconnect failed after {attempts} attempts: {source}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("{op} failed for local file '{path}': {source}")]
    Local {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed for remote path '{path}': {source}")]
    Remote {
        op: &'static str,
        path: String,
        #[source]
        source: russh_sftp::client::error::Error,
    },

    // Remote file handles speak tokio's I/O traits, so reads/writes/seeks on
    // them surface io::Error rather than a protocol error.
    #[error("{op} failed for remote path '{path}': {source}")]
    RemoteIo {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer of '{path}' failed after {attempts} attempts: {source}")]
    TransferExhausted {
        path: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn local(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Local {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn remote(
        op: &'static str,
        path: impl Into<String>,
        source: russh_sftp::client::error::Error,
    ) -> Self {
        Error::Remote {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn remote_io(
        op: &'static str,
        path: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::RemoteIo {
            op,
            path: path.into(),
            source,
        }
    }

    /// True if the underlying cause is a missing file or directory.
    ///
    /// Used wherever absence is treated as zero-value state (remote size 0 on
    /// upload, skip-and-continue in the walker) rather than propagated.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Local { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Error::Remote { source, .. } => message_indicates_not_found(&source.to_string()),
            Error::RemoteIo { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
                    || message_indicates_not_found(&source.to_string())
            }
            _ => false,
        }
    }

    /// True if the underlying cause is a permission failure.
    ///
    /// Download and the walker turn these into informational skips so a batch
    /// job can continue past unreadable entries.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Local { source, .. } => source.kind() == std::io::ErrorKind::PermissionDenied,
            Error::Remote { source, .. } => message_indicates_permission_denied(&source.to_string()),
            Error::RemoteIo { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
                    || message_indicates_permission_denied(&source.to_string())
            }
            _ => false,
        }
    }
}

impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<russh::keys::Error> for Error {
    fn from(err: russh::keys::Error) -> Self {
        Error::KeyError(err.to_string())
    }
}

/// Servers differ in how they phrase SSH_FX_NO_SUCH_FILE; match the common
/// renderings the same way the status message reaches us.
pub(crate) fn message_indicates_not_found(msg: &str) -> bool {
    msg.contains("No such file") || msg.contains("no such file") || msg.contains("not found")
}

pub(crate) fn message_indicates_permission_denied(msg: &str) -> bool {
    msg.contains("Permission denied") || msg.contains("permission denied")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_not_found() {
        let err = Error::local(
            "stat",
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.is_not_found());
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_local_permission_denied() {
        let err = Error::local(
            "open",
            "/root/secret",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_permission_denied());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_message_classifiers() {
        assert!(message_indicates_not_found("sftp: No such file or directory"));
        assert!(message_indicates_not_found("path not found"));
        assert!(!message_indicates_not_found("failure"));

        assert!(message_indicates_permission_denied("sftp: Permission denied"));
        assert!(!message_indicates_permission_denied("failure"));
    }

    #[test]
    fn test_other_errors_are_neither() {
        let err = Error::NotConnected;
        assert!(!err.is_not_found());
        assert!(!err.is_permission_denied());

        let err = Error::Timeout("dial".into());
        assert!(!err.is_not_found());
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_error_display_names_op_and_path() {
        let err = Error::local(
            "seek",
            "/data/file.bin",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        let msg = err.to_string();
        assert!(msg.contains("seek"));
        assert!(msg.contains("/data/file.bin"));
    }
}
