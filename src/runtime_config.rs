//! # Runtime Configuration Module
//!
//! The runtime configuration module provides environment variable-based configuration
//! for the limits mcpwire enforces on templates, URIs and inbound messages.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `MCPWIRE_MAX_TEMPLATE_LENGTH` | `1000000` | Longest template string accepted by the compiler |
//! | `MCPWIRE_MAX_VARIABLE_LENGTH` | `1000000` | Longest variable name accepted by the compiler |
//! | `MCPWIRE_MAX_EXPRESSIONS` | `100000` | Most `{...}` expressions in one template |
//! | `MCPWIRE_MAX_URI_LENGTH` | `1000000` | URIs longer than this never match |
//! | `MCPWIRE_MAX_REGEX_SIZE` | `0x10000000` | Compiled matcher size limit in bytes |
//! | `MCPWIRE_MAX_MESSAGE_SIZE` | `0x400000` | Largest inbound POST body in bytes (4 MiB) |
//!
//! Every variable accepts either decimal (`16384`) or hexadecimal (`0x4000`).
//! Unparseable values fall back to the default.
//!
//! ## Usage
//!
//! ```rust
//! use mcpwire::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Max template length: {} bytes", config.max_template_length);
//! ```
//!
//! ```bash
//! # Allow inbound messages up to 8 MiB
//! export MCPWIRE_MAX_MESSAGE_SIZE=0x800000
//! ```

use std::env;

use crate::uri_template::TemplateLimits;

pub const DEFAULT_MAX_TEMPLATE_LENGTH: usize = 1_000_000;
pub const DEFAULT_MAX_VARIABLE_LENGTH: usize = 1_000_000;
pub const DEFAULT_MAX_EXPRESSIONS: usize = 100_000;
pub const DEFAULT_MAX_URI_LENGTH: usize = 1_000_000;
pub const DEFAULT_MAX_REGEX_SIZE: usize = 0x1000_0000;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 0x40_0000;

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`] and hand
/// [`RuntimeConfig::template_limits()`] to [`crate::uri_template::UriTemplate::with_limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_template_length: usize,
    pub max_variable_length: usize,
    pub max_expressions: usize,
    pub max_uri_length: usize,
    pub max_regex_size: usize,
    /// Inbound message body limit for [`crate::sse::SseSession::handle_post_message`]
    pub max_message_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        RuntimeConfig {
            max_template_length: size_var(
                "MCPWIRE_MAX_TEMPLATE_LENGTH",
                DEFAULT_MAX_TEMPLATE_LENGTH,
            ),
            max_variable_length: size_var(
                "MCPWIRE_MAX_VARIABLE_LENGTH",
                DEFAULT_MAX_VARIABLE_LENGTH,
            ),
            max_expressions: size_var("MCPWIRE_MAX_EXPRESSIONS", DEFAULT_MAX_EXPRESSIONS),
            max_uri_length: size_var("MCPWIRE_MAX_URI_LENGTH", DEFAULT_MAX_URI_LENGTH),
            max_regex_size: size_var("MCPWIRE_MAX_REGEX_SIZE", DEFAULT_MAX_REGEX_SIZE),
            max_message_size: size_var("MCPWIRE_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
        }
    }

    /// Template compiler and matcher limits derived from this configuration.
    #[must_use]
    pub fn template_limits(&self) -> TemplateLimits {
        TemplateLimits {
            max_template_length: self.max_template_length,
            max_variable_length: self.max_variable_length,
            max_expressions: self.max_expressions,
            max_uri_length: self.max_uri_length,
            max_regex_size: self.max_regex_size,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_template_length: DEFAULT_MAX_TEMPLATE_LENGTH,
            max_variable_length: DEFAULT_MAX_VARIABLE_LENGTH,
            max_expressions: DEFAULT_MAX_EXPRESSIONS,
            max_uri_length: DEFAULT_MAX_URI_LENGTH,
            max_regex_size: DEFAULT_MAX_REGEX_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

fn size_var(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(val) => parse_size(&val).unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal size.
pub(crate) fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
