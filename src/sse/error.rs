use http::StatusCode;
use std::fmt;

use super::session::SessionState;

/// An operation was called in a state that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStateError {
    pub operation: &'static str,
    pub state: SessionState,
}

impl fmt::Display for SessionStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.operation, self.state) {
            ("start", SessionState::Started) => write!(
                f,
                "SSE session already started; a connected server starts it automatically"
            ),
            ("send", SessionState::Pending) => write!(f, "SSE session not started"),
            (operation, SessionState::Closed) => {
                write!(f, "cannot {operation}: SSE session is closed")
            }
            (operation, state) => write!(f, "cannot {operation} while SSE session is {state}"),
        }
    }
}

impl std::error::Error for SessionStateError {}

/// Failure reported by the underlying response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer went away; the stream accepts no more data
    Closed,
    /// A write failed
    Write { message: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "event stream closed by peer"),
            TransportError::Write { message } => write!(f, "event stream write failed: {message}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => TransportError::Closed,
            _ => TransportError::Write {
                message: err.to_string(),
            },
        }
    }
}

/// Rejection of an inbound POSTed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundError {
    NotConnected,
    UnsupportedContentType { content_type: String },
    PayloadTooLarge { limit: usize, actual: usize },
    InvalidJson { message: String },
}

impl InboundError {
    /// HTTP status to answer the POST with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            InboundError::NotConnected => StatusCode::INTERNAL_SERVER_ERROR,
            InboundError::UnsupportedContentType { .. } | InboundError::InvalidJson { .. } => {
                StatusCode::BAD_REQUEST
            }
            InboundError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl fmt::Display for InboundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundError::NotConnected => write!(f, "SSE connection not established"),
            InboundError::UnsupportedContentType { content_type } => {
                write!(f, "Unsupported content-type: {content_type}")
            }
            InboundError::PayloadTooLarge { limit, actual } => write!(
                f,
                "message body of {actual} bytes exceeds the {limit} byte limit"
            ),
            InboundError::InvalidJson { message } => write!(f, "invalid JSON message: {message}"),
        }
    }
}

impl std::error::Error for InboundError {}

/// Any error surfaced by [`super::SseSession`].
#[derive(Debug)]
pub enum SessionError {
    State(SessionStateError),
    Transport(TransportError),
    Inbound(InboundError),
    Serialize(serde_json::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::State(err) => err.fmt(f),
            SessionError::Transport(err) => err.fmt(f),
            SessionError::Inbound(err) => err.fmt(f),
            SessionError::Serialize(err) => write!(f, "failed to serialize message: {err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::State(err) => Some(err),
            SessionError::Transport(err) => Some(err),
            SessionError::Inbound(err) => Some(err),
            SessionError::Serialize(err) => Some(err),
        }
    }
}

impl From<SessionStateError> for SessionError {
    fn from(err: SessionStateError) -> Self {
        SessionError::State(err)
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err)
    }
}

impl From<InboundError> for SessionError {
    fn from(err: InboundError) -> Self {
        SessionError::Inbound(err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialize(err)
    }
}
