use ntex_http::StatusCode;

use crate::frame::StreamId;
use crate::timer::TimerId;

/// Timer registry errors.
///
/// Either one means the stream bookkeeping is broken.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer {0:?} is already registered")]
    Duplicate(TimerId),
    #[error("Timer {0:?} is not registered")]
    NotFound(TimerId),
}

/// Stream tracker errors
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream {0} is already tracked")]
    Duplicate(StreamId),
    #[error("Stream {0} is unknown")]
    Unknown(StreamId),
    #[error("Status {0} is not informational")]
    InvalidInterimStatus(StatusCode),
}

/// Message builder errors
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Header array is full, caller should allocate a larger builder
    #[error("Header capacity {0} exceeded")]
    HeaderCapacityExceeded(usize),
}

/// Error reported by the frame engine.
///
/// The code belongs to the engine's own numbering and is passed through
/// untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Frame engine error {code}: {message}")]
pub struct EngineError {
    code: i32,
    message: String,
    fatal: bool,
}

impl EngineError {
    pub fn new<T: Into<String>>(code: i32, message: T) -> Self {
        EngineError {
            code,
            message: message.into(),
            fatal: false,
        }
    }

    /// Error after which the engine can not continue
    pub fn fatal<T: Into<String>>(code: i32, message: T) -> Self {
        EngineError {
            code,
            message: message.into(),
            fatal: true,
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// Returned from a callback to make the engine fail the connection
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("Session callback failed")]
pub struct CallbackFailure;

/// Session level errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0}")]
    Timer(#[from] TimerError),
    #[error("{0}")]
    Stream(#[from] StreamError),
    #[error("{0}")]
    Message(#[from] MessageError),
    #[error("{0}")]
    Engine(#[from] EngineError),
    /// Callback failed without a recorded cause
    #[error("{0}")]
    Callback(#[from] CallbackFailure),
    /// Engine did not consume the whole input
    #[error("Frame engine consumed {consumed} of {len} bytes")]
    PartialRecv { consumed: usize, len: usize },
    #[error("Session is closed")]
    Closed,
}

impl SessionError {
    /// Check if the session can not continue after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Engine(err) => err.is_fatal(),
            SessionError::Closed | SessionError::PartialRecv { .. } => true,
            _ => self.is_invariant_violation(),
        }
    }

    /// Check if error is caused by broken stream or timer bookkeeping
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SessionError::Timer(_)
                | SessionError::Stream(StreamError::Duplicate(_))
                | SessionError::Callback(_)
        )
    }
}
