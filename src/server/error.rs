use std::io;

use crate::error::SessionError;

/// Errors which can occur while serving a connection
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Http/2 session error
    #[error("Http/2 session error: {0}")]
    Session(#[from] SessionError),
    /// Peer disconnect
    #[error("Peer is disconnected, error: {0:?}")]
    Disconnected(Option<io::Error>),
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        ServerError::Disconnected(Some(err))
    }
}

impl ServerError {
    /// Check if transport error means the peer is gone
    pub(super) fn is_disconnect(err: &io::Error) -> bool {
        matches!(
            err.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::NotConnected
        )
    }
}
