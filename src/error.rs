//! Error types shared across the session engine.

use std::io;

/// Failure of one of the credential flows.
///
/// Cloneable because a resolved login result may be observed by a
/// reconnecting client as well as the one that started the flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("login was not completed in time")]
    TimedOut,
    #[error("stored refresh token was rejected: {0}")]
    TokenRejected(String),
    #[error("account does not own a Java Edition profile")]
    NoProfile,
    #[error("authentication service error: {0}")]
    Service(String),
    #[error("authentication abandoned")]
    Abandoned,
}

/// Failure on a peer link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link is closed")]
    Closed,
    #[error("no in-process backend is registered")]
    NoRelay,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Why the backend connection ended, classified so the user can be
/// shown a useful reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendFailure {
    /// The server started encryption, which means it expects a
    /// different authentication mode than the one configured.
    #[error("server requested encryption unexpectedly")]
    UnexpectedEncryption,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("disconnected by server: {0}")]
    Kicked(String),
    /// Closed without a cause, for example by our own teardown.
    #[error("connection closed")]
    Closed,
}

impl BackendFailure {
    /// Whether the failure should be reported to the player at all.
    pub fn has_cause(&self) -> bool {
        !matches!(self, BackendFailure::Closed)
    }
}

impl From<LinkError> for BackendFailure {
    fn from(error: LinkError) -> Self {
        match error {
            LinkError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                BackendFailure::ConnectionRefused
            }
            LinkError::NoRelay => BackendFailure::ConnectionRefused,
            LinkError::Closed => BackendFailure::Closed,
            LinkError::Io(e) => BackendFailure::Protocol(e.to_string()),
        }
    }
}

/// Failure sealing or opening a passthrough identity payload.
#[derive(Debug, thiserror::Error)]
pub enum PassthroughError {
    #[error("no passthrough key is loaded")]
    MissingKey,
    #[error("passthrough key must be 32 bytes, got {0}")]
    InvalidKeySize(usize),
    #[error("failed to seal identity payload")]
    Seal,
    #[error("identity payload failed authentication")]
    Open,
    #[error("malformed identity payload")]
    Malformed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_socket_is_classified() {
        let error = LinkError::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(BackendFailure::from(error), BackendFailure::ConnectionRefused);

        let error = LinkError::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(BackendFailure::from(error), BackendFailure::Protocol(_)));
    }
}
