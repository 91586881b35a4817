//! # CLI Module
//!
//! Command-line access to the template engine and the endpoint augmentation
//! used by SSE sessions. Handy for checking how a template expands or whether
//! a URI matches it without writing code.
//!
//! ## Commands
//!
//! ### `expand`
//!
//! ```bash
//! mcpwire expand --template '/users/{id}{?tags*}' --var id=42 --list tags=a,b
//! # /users/42?tags=a,b
//! ```
//!
//! ### `match`
//!
//! Prints the bound variables as JSON, or `null` with a non-zero exit status
//! when the URI does not match:
//!
//! ```bash
//! mcpwire match --template '/users/{id}' --uri /users/42
//! # {"id":"42"}
//! ```
//!
//! ### `endpoint`
//!
//! ```bash
//! mcpwire endpoint --endpoint '/messages?x=1#top'
//! # /messages?x=1&SessionID=01J9Z3Q4V8KX2M5N7P0R6S1T3W#top
//! ```
//!
//! ### `is-template`
//!
//! ```bash
//! mcpwire is-template '/static/logo.png'
//! # false
//! ```
//!
//! Limits come from the `MCPWIRE_*` environment variables, see
//! [`crate::runtime_config`].

mod commands;


pub use commands::{execute, run_cli, Cli, CommandOutput, Commands};
