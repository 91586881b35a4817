//! # mcpwire
//!
//! **mcpwire** provides two building blocks of a JSON-RPC (Model Context
//! Protocol style) server: RFC 6570-style URI templates for addressing
//! parameterized resources, and a Server-Sent Events session that carries
//! server-to-client messages over one long-lived HTTP response.
//!
//! ## Architecture
//!
//! - **[`uri_template`]** - compile a template once, then expand variables into
//!   URIs and match URIs back into variables
//! - **[`sse`]** - SSE session lifecycle, handshake, outbound `message` events,
//!   inbound POST handling, and the [`sse::EventStream`] seam to your HTTP server
//! - **[`runtime_config`]** - environment-driven limits
//! - **[`logging`]** - `tracing` subscriber setup for binaries
//! - **[`cli`]** - the `mcpwire` command-line tool
//!
//! ### Session Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HTTP server
//!     participant Session as SseSession
//!     participant Stream as EventStream
//!
//!     Client->>Server: GET /sse
//!     Server->>Session: SseSession::new("/messages", stream)
//!     Server->>Session: start()
//!     Session->>Stream: write_head(200, text/event-stream)
//!     Session->>Stream: subscribe(listener)
//!     Session->>Stream: write("event: endpoint ...")
//!     Stream-->>Client: /messages?SessionID=<id>
//!
//!     Client->>Server: POST /messages?SessionID=<id>
//!     Server->>Session: handle_post_message(content_type, body)
//!     Session->>Session: on_message(json)
//!     Server-->>Client: 202 Accepted
//!
//!     Session->>Stream: write("event: message ...")
//!     Stream-->>Client: JSON-RPC response
//!
//!     Client--xStream: disconnect
//!     Stream->>Session: StreamEvent::Closed
//!     Session->>Session: Closed, on_close()
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mcpwire::uri_template::{TemplateVariables, UriTemplate};
//!
//! let template = UriTemplate::new("file:///{+path}").unwrap();
//! let bound = template.match_uri("file:///docs/readme.md").unwrap();
//! assert_eq!(bound["path"].as_str(), Some("docs/readme.md"));
//!
//! let mut vars = TemplateVariables::new();
//! vars.insert("path".into(), "src/lib.rs".into());
//! assert_eq!(template.expand(&vars), "file:///src/lib.rs");
//! ```
//!
//! ## Runtime Considerations
//!
//! Sessions are `Send + Sync` and can be shared between `may` coroutines or
//! OS threads. The in-memory [`sse::ChannelStream`] uses `may` channels, so a
//! coroutine can forward frames to a socket while handlers keep sending.

pub mod cli;
pub mod ids;
pub mod logging;
pub mod runtime_config;
pub mod sse;
pub mod uri_template;

pub use ids::SessionId;
pub use runtime_config::RuntimeConfig;
pub use sse::{SessionError, SessionState, SseSession};
pub use uri_template::{is_template, TemplateError, TemplateValue, TemplateVariables, UriTemplate};
