//! # Server-Sent Events (SSE) Session Module
//!
//! Server side of a JSON-RPC transport over Server-Sent Events. The server
//! pushes messages to the client over one long-lived `text/event-stream`
//! response, and the client POSTs its messages to a separate endpoint that
//! carries the session id in its query string.
//!
//! ## Architecture
//!
//! - **[`SseSession`]** - lifecycle (`Pending → Started → Closed`), handshake,
//!   outbound `message` events and the inbound POST contract
//! - **[`EventStream`]** - the writable response the session owns; implement
//!   it for your HTTP server's response body
//! - **[`ChannelStream`]** / **[`FrameReceiver`]** - an in-memory stream over
//!   a `may` coroutine channel, for tests or for forwarding frames to a socket
//!   from another coroutine
//! - **[`augment_endpoint()`]** - appends `SessionID=<id>` to the endpoint
//!
//! ## Usage
//!
//! ```rust
//! use mcpwire::sse::{self, SseSession};
//!
//! let (stream, receiver) = sse::channel();
//! let session = SseSession::new("/messages", stream);
//! session.start().unwrap();
//! session
//!     .send(&serde_json::json!({"jsonrpc": "2.0", "method": "ping"}))
//!     .unwrap();
//! session.close();
//!
//! let body = receiver.collect();
//! assert!(body.starts_with("event: endpoint\ndata: /messages?SessionID="));
//! assert!(body.ends_with("event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n\n"));
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! event: endpoint
//! data: /messages?SessionID=01J9Z3Q4V8KX2M5N7P0R6S1T3W
//!
//! event: message
//! data: {"jsonrpc":"2.0","method":"ping"}
//!
//! ```
//!
//! ## Concurrency
//!
//! A session may be shared between coroutines. Writes and state changes are
//! serialized by one lock, so frames reach the stream in call order and no
//! frame is written after the session closes. Callbacks run outside that lock.

mod endpoint;
mod error;
mod frame;
mod session;
mod stream;

pub use endpoint::{augment_endpoint, session_id_from_query, SESSION_ID_PARAM};
pub use error::{InboundError, SessionError, SessionStateError, TransportError};
pub use frame::{endpoint_frame, event_frame, message_frame, ENDPOINT_EVENT, MESSAGE_EVENT};
pub use session::{Delivery, SessionState, SseSession, SSE_HEADERS};
pub use stream::{
    channel, channel_with_high_water_mark, ChannelStream, EventStream, FrameReceiver, StreamChunk,
    StreamEvent, StreamListener, WriteOutcome,
};

pub use crate::ids::SessionId;
