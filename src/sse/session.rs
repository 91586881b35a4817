use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

use super::endpoint::augment_endpoint;
use super::error::{InboundError, SessionError, SessionStateError, TransportError};
use super::frame::{endpoint_frame, message_frame};
use super::stream::{EventStream, StreamEvent, StreamListener, WriteOutcome};
use crate::ids::SessionId;
use crate::runtime_config::RuntimeConfig;

/// Response headers sent with the handshake.
pub const SSE_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache, no-transform"),
    ("Connection", "keep-alive"),
];

/// Lifecycle of a session. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Pending,
    Started,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Pending => "pending",
            SessionState::Started => "started",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What happened to a frame passed to [`SseSession::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Flushed,
    /// Queued behind a full stream; the caller should hold further sends
    /// until [`SseSession::is_backpressured`] clears
    Backpressured,
}

type CloseCallback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Arc<dyn Fn(&SessionError) + Send + Sync>;
type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_close: Option<CloseCallback>,
    on_error: Option<ErrorCallback>,
    on_message: Option<MessageCallback>,
}

struct Inner<S> {
    state: SessionState,
    stream: S,
    backpressured: bool,
}

struct Shared<S> {
    id: SessionId,
    inner: Mutex<Inner<S>>,
    callbacks: Mutex<Callbacks>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: EventStream> Shared<S> {
    fn on_stream_event(&self, event: StreamEvent) {
        match event {
            StreamEvent::Drain => {
                lock(&self.inner).backpressured = false;
                debug!(session_id = %self.id, "SSE stream drained");
            }
            StreamEvent::Closed => self.shut_down(false, None),
            StreamEvent::Error(err) => self.shut_down(false, Some(err)),
        }
    }

    /// Move to `Closed` once. Callbacks run after the state lock is released.
    fn shut_down(&self, end_stream: bool, error: Option<TransportError>) {
        {
            let mut inner = lock(&self.inner);
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
            inner.backpressured = false;
            inner.stream.unsubscribe();
            if end_stream {
                inner.stream.end();
            }
        }

        match &error {
            Some(err) => warn!(session_id = %self.id, error = %err, "SSE session closed on transport error"),
            None => info!(session_id = %self.id, "SSE session closed"),
        }

        if let Some(err) = error {
            self.report(&SessionError::Transport(err));
        }
        let on_close = lock(&self.callbacks).on_close.take();
        if let Some(callback) = on_close {
            callback();
        }
    }

    fn report(&self, error: &SessionError) {
        let on_error = lock(&self.callbacks).on_error.clone();
        if let Some(callback) = on_error {
            callback(error);
        }
    }
}

/// One client connection speaking JSON-RPC over Server-Sent Events.
///
/// Outbound messages go out as `message` events on the owned
/// [`EventStream`]; inbound messages arrive through
/// [`handle_post_message`](Self::handle_post_message), called by whatever
/// routes POSTs to sessions by [`session_id`](Self::session_id).
pub struct SseSession<S: EventStream + 'static> {
    endpoint: String,
    max_message_size: usize,
    shared: Arc<Shared<S>>,
}

impl<S: EventStream + 'static> SseSession<S> {
    pub fn new(endpoint: impl Into<String>, stream: S) -> Self {
        Self::with_config(endpoint, stream, &RuntimeConfig::default())
    }

    pub fn with_config(endpoint: impl Into<String>, stream: S, config: &RuntimeConfig) -> Self {
        let id = SessionId::new();
        let endpoint = endpoint.into();
        debug!(session_id = %id, endpoint = %endpoint, "SSE session created");
        Self {
            endpoint,
            max_message_size: config.max_message_size,
            shared: Arc::new(Shared {
                id,
                inner: Mutex::new(Inner {
                    state: SessionState::Pending,
                    stream,
                    backpressured: false,
                }),
                callbacks: Mutex::new(Callbacks::default()),
            }),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.shared.id
    }

    /// The endpoint as supplied, before the session id is appended.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.inner).state
    }

    pub fn is_backpressured(&self) -> bool {
        lock(&self.shared.inner).backpressured
    }

    /// Run the handshake: status and headers, close listener, then a single
    /// `endpoint` event telling the client where to POST.
    ///
    /// Only valid while `Pending`. A transport failure closes the session.
    pub fn start(&self) -> Result<(), SessionError> {
        let endpoint = augment_endpoint(&self.endpoint, &self.shared.id.to_string());
        let frame = endpoint_frame(&endpoint);

        let weak: Weak<Shared<S>> = Arc::downgrade(&self.shared);
        let listener: StreamListener = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_stream_event(event);
            }
        });

        let written = {
            let mut inner = lock(&self.shared.inner);
            if inner.state != SessionState::Pending {
                return Err(SessionStateError {
                    operation: "start",
                    state: inner.state,
                }
                .into());
            }
            let result = match inner.stream.write_head(StatusCode::OK, &SSE_HEADERS) {
                Ok(()) => {
                    inner.stream.subscribe(listener);
                    inner.stream.write(frame.as_bytes())
                }
                Err(err) => Err(err),
            };
            if let Ok(outcome) = result {
                inner.state = SessionState::Started;
                inner.backpressured = outcome == WriteOutcome::Buffered;
            }
            result
        };

        match written {
            Ok(_) => {
                info!(session_id = %self.shared.id, endpoint = %endpoint, "SSE session started");
                Ok(())
            }
            Err(err) => {
                self.shared.shut_down(true, Some(err.clone()));
                Err(err.into())
            }
        }
    }

    /// Serialize `message` to JSON and write it as a `message` event.
    ///
    /// Frames are written in call order. A [`Delivery::Backpressured`] frame
    /// is still queued on the stream, never dropped.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<Delivery, SessionError> {
        let written = {
            let mut inner = lock(&self.shared.inner);
            if inner.state != SessionState::Started {
                return Err(SessionStateError {
                    operation: "send",
                    state: inner.state,
                }
                .into());
            }
            let payload = serde_json::to_string(message)?;
            let result = inner.stream.write(message_frame(&payload).as_bytes());
            if result == Ok(WriteOutcome::Buffered) {
                inner.backpressured = true;
            }
            result.map(|outcome| (outcome, payload.len()))
        };

        match written {
            Ok((WriteOutcome::Accepted, bytes)) => {
                debug!(session_id = %self.shared.id, bytes, "SSE message sent");
                Ok(Delivery::Flushed)
            }
            Ok((WriteOutcome::Buffered, bytes)) => {
                debug!(session_id = %self.shared.id, bytes, "SSE stream above high-water mark");
                Ok(Delivery::Backpressured)
            }
            Err(err) => {
                self.shared.shut_down(true, Some(err.clone()));
                Err(err.into())
            }
        }
    }

    /// End the stream and fire the close callback. Later calls do nothing.
    pub fn close(&self) {
        self.shared.shut_down(true, None);
    }

    /// Called once when the session reaches `Closed`, whatever the cause.
    pub fn on_close<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.shared.callbacks).on_close = Some(Box::new(callback));
    }

    /// Transport failures and rejected inbound messages.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        lock(&self.shared.callbacks).on_error = Some(Arc::new(callback));
    }

    /// Parsed inbound JSON-RPC payloads.
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        lock(&self.shared.callbacks).on_message = Some(Arc::new(callback));
    }

    /// Accept one POSTed message for this session.
    ///
    /// Returns the status to answer the POST with: `202 Accepted` on success,
    /// otherwise [`InboundError::status`].
    pub fn handle_post_message(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<StatusCode, InboundError> {
        if self.state() != SessionState::Started {
            return Err(InboundError::NotConnected);
        }

        let content_type = content_type.unwrap_or_default();
        let Some(charset) = json_body_charset(content_type) else {
            return Err(self.reject(InboundError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }));
        };

        if body.len() > self.max_message_size {
            return Err(self.reject(InboundError::PayloadTooLarge {
                limit: self.max_message_size,
                actual: body.len(),
            }));
        }

        let parsed: Result<Value, serde_json::Error> = match charset {
            BodyCharset::Utf8 => serde_json::from_slice(body),
            BodyCharset::Latin1 => serde_json::from_str(&decode_latin1(body)),
        };
        let message: Value = parsed.map_err(|err| {
            self.reject(InboundError::InvalidJson {
                message: err.to_string(),
            })
        })?;

        debug!(session_id = %self.shared.id, bytes = body.len(), "SSE inbound message accepted");
        let on_message = lock(&self.shared.callbacks).on_message.clone();
        if let Some(callback) = on_message {
            callback(message);
        }
        Ok(StatusCode::ACCEPTED)
    }

    fn reject(&self, error: InboundError) -> InboundError {
        warn!(session_id = %self.shared.id, error = %error, "SSE inbound message rejected");
        self.shared.report(&SessionError::Inbound(error.clone()));
        error
    }
}

impl<S: EventStream + 'static> fmt::Debug for SseSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseSession")
            .field("session_id", &self.shared.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Text encodings accepted for inbound JSON bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyCharset {
    /// UTF-8, also the default and the decoding for US-ASCII
    Utf8,
    /// ISO-8859-1
    Latin1,
}

/// The body charset of an `application/json` content type, `None` for any
/// other media type or an encoding that cannot be decoded.
fn json_body_charset(value: &str) -> Option<BodyCharset> {
    let mut parts = value.split(';');
    let essence = parts.next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case("application/json") {
        return None;
    }

    let mut charset = BodyCharset::Utf8;
    for param in parts {
        let Some((name, label)) = param.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        charset = match label.as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => BodyCharset::Utf8,
            "iso-8859-1" | "iso8859-1" | "latin1" | "l1" => BodyCharset::Latin1,
            _ => return None,
        };
    }
    Some(charset)
}

/// Every ISO-8859-1 byte is the Unicode code point of the same value.
fn decode_latin1(body: &[u8]) -> String {
    body.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::stream::channel;

    #[test]
    fn test_json_content_types() {
        assert_eq!(json_body_charset("application/json"), Some(BodyCharset::Utf8));
        assert_eq!(
            json_body_charset("Application/JSON; charset=utf-8"),
            Some(BodyCharset::Utf8)
        );
        assert_eq!(
            json_body_charset("application/json;charset=\"UTF-8\""),
            Some(BodyCharset::Utf8)
        );
        assert_eq!(
            json_body_charset("application/json; charset=latin1"),
            Some(BodyCharset::Latin1)
        );
        assert_eq!(
            json_body_charset("application/json; charset=ISO-8859-1"),
            Some(BodyCharset::Latin1)
        );
        assert_eq!(json_body_charset("application/json; charset=utf-16"), None);
        assert_eq!(json_body_charset("text/plain"), None);
        assert_eq!(json_body_charset(""), None);
    }

    #[test]
    fn test_latin1_decoding() {
        assert_eq!(decode_latin1(b"caf\xe9"), "caf\u{e9}");
    }

    #[test]
    fn test_state_moves_forward_only() {
        let (stream, _rx) = channel();
        let session = SseSession::new("/messages", stream);
        assert_eq!(session.state(), SessionState::Pending);
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.start(),
            Err(SessionError::State(SessionStateError {
                state: SessionState::Closed,
                ..
            }))
        ));
    }

    #[test]
    fn test_listener_does_not_keep_session_alive() {
        let (stream, rx) = channel();
        let session = SseSession::new("/messages", stream);
        session.start().unwrap();
        let weak = Arc::downgrade(&session.shared);
        drop(session);
        assert!(weak.upgrade().is_none());
        drop(rx);
    }
}
