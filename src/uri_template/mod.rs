//! # URI Template Module
//!
//! RFC 6570-style URI Templates used to describe parameterized resource
//! addresses. A template is compiled once into a [`UriTemplate`] and then
//! reused for forward expansion (variables → URI) and reverse matching
//! (URI → variables).
//!
//! ## Syntax
//!
//! Literal text is interleaved with `{...}` expressions. An expression holds an
//! optional operator followed by comma-separated variables:
//!
//! | Operator | Example | Expands to (`x = "a b"`, `y = "c"`) |
//! |---|---|---|
//! | simple | `{x,y}` | `a%20b,c` |
//! | `+` reserved | `{+x}` | `a%20b` (reserved chars such as `/` kept) |
//! | `#` fragment | `{#x}` | `#a%20b` |
//! | `.` label | `{.y}` | `.c` |
//! | `/` path | `{/y}` | `/c` |
//! | `?` query | `{?x,y}` | `?x=a%20b&y=c` |
//! | `&` continuation | `{&y}` | `&y=c` |
//!
//! Variables may carry `*` (explode: list values) or `:N` (keep the first N
//! characters). List values are always joined with `,`, for every operator, so
//! expansion and matching stay inverses of each other.
//!
//! A second `?` expression in the same template continues the query string
//! with `&`: `{?a}{?b}` expands to `?a=1&b=2`.
//!
//! ## Example
//!
//! ```rust
//! use mcpwire::uri_template::{is_template, TemplateVariables, UriTemplate};
//!
//! assert!(is_template("/api/{version}/{resource}"));
//!
//! let template = UriTemplate::new("/api/{version}/{resource}{?tags*}").unwrap();
//! let mut vars = TemplateVariables::new();
//! vars.insert("version".into(), "v1".into());
//! vars.insert("resource".into(), "users".into());
//! vars.insert("tags".into(), vec!["a", "b"].into());
//! assert_eq!(template.expand(&vars), "/api/v1/users?tags=a,b");
//!
//! let bound = template.match_uri("/api/v2/posts?tags=x,y").unwrap();
//! assert_eq!(bound["resource"].as_str(), Some("posts"));
//! assert_eq!(bound["tags"].as_list().unwrap(), ["x", "y"]);
//! ```
//!
//! ## Robustness
//!
//! Compilation is a single forward scan. Matching uses the linear-time
//! `regex` engine, or a budgeted scanner for templates with too many
//! captures for one regex. Templates with tens of thousands of expressions, variable
//! names tens of thousands of characters long and URIs of hundreds of
//! thousands of characters are handled without errors or superlinear blowup.

mod core;
mod encode;
mod expand;
mod matcher;
mod parse;

pub use self::core::{
    Expression, Operator, Segment, TemplateError, TemplateLimits, TemplateValue,
    TemplateVariables, UriTemplate, VarSpec,
};
pub use parse::is_template;
