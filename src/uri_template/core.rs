use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::expand::expand_segments;
use super::matcher::Matcher;
use super::parse::parse_template;
use crate::runtime_config::{
    DEFAULT_MAX_EXPRESSIONS, DEFAULT_MAX_REGEX_SIZE, DEFAULT_MAX_TEMPLATE_LENGTH,
    DEFAULT_MAX_URI_LENGTH, DEFAULT_MAX_VARIABLE_LENGTH,
};

/// Variable bindings used for expansion and returned by matching.
pub type TemplateVariables = HashMap<String, TemplateValue>;

/// Expression operator, the optional leading symbol inside `{...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `{var}`
    Simple,
    /// `{+var}` - reserved characters are left unescaped
    Reserved,
    /// `{#var}`
    Fragment,
    /// `{.var}`
    Label,
    /// `{/var}`
    Path,
    /// `{?var}` - opens (or continues) the query string
    Query,
    /// `{&var}`
    QueryContinuation,
}

impl Operator {
    pub(crate) fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Reserved),
            '#' => Some(Operator::Fragment),
            '.' => Some(Operator::Label),
            '/' => Some(Operator::Path),
            '?' => Some(Operator::Query),
            '&' => Some(Operator::QueryContinuation),
            _ => None,
        }
    }

    /// The character written in the template, `None` for simple expansion.
    #[must_use]
    pub fn symbol(self) -> Option<char> {
        match self {
            Operator::Simple => None,
            Operator::Reserved => Some('+'),
            Operator::Fragment => Some('#'),
            Operator::Label => Some('.'),
            Operator::Path => Some('/'),
            Operator::Query => Some('?'),
            Operator::QueryContinuation => Some('&'),
        }
    }

    /// Text emitted once in front of an expression that renders output.
    ///
    /// The query family is resolved through [`QueryState`] instead.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved => "",
            Operator::Fragment => "#",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::Query => "?",
            Operator::QueryContinuation => "&",
        }
    }

    /// `?` and `&` render `name=value` pairs joined with `&`.
    #[must_use]
    pub fn is_query(self) -> bool {
        matches!(self, Operator::Query | Operator::QueryContinuation)
    }

    /// `+` and `#` leave reserved characters unescaped.
    #[must_use]
    pub fn allows_reserved(self) -> bool {
        matches!(self, Operator::Reserved | Operator::Fragment)
    }
}

/// One variable inside an expression: `name`, `name*` or `name:N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSpec {
    pub name: String,
    pub explode: bool,
    /// `:N` prefix modifier, the number of leading characters to keep
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub operator: Operator,
    pub vars: Vec<VarSpec>,
}

/// A compiled template is an ordered list of literal text and expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Expression(Expression),
}

/// Whether a query component has been opened earlier in the same
/// expand/match pass. A second `{?...}` expression continues with `&`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct QueryState {
    opened: bool,
}

impl QueryState {
    /// Prefix for an expression that is about to render output.
    pub(crate) fn open(&mut self, operator: Operator) -> &'static str {
        match operator {
            Operator::Query => {
                let prefix = if self.opened { "&" } else { "?" };
                self.opened = true;
                prefix
            }
            Operator::QueryContinuation => {
                self.opened = true;
                "&"
            }
            other => other.prefix(),
        }
    }
}

/// A bound value: a single string or an ordered list (for exploded variables).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Single(String),
    List(Vec<String>),
}

impl TemplateValue {
    /// Empty strings and empty lists render nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            TemplateValue::Single(s) => s.is_empty(),
            TemplateValue::List(items) => items.is_empty(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TemplateValue::Single(s) => Some(s),
            TemplateValue::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            TemplateValue::Single(_) => None,
            TemplateValue::List(items) => Some(items),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::Single(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::Single(value)
    }
}

impl From<Vec<String>> for TemplateValue {
    fn from(values: Vec<String>) -> Self {
        TemplateValue::List(values)
    }
}

impl From<Vec<&str>> for TemplateValue {
    fn from(values: Vec<&str>) -> Self {
        TemplateValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Size limits applied while compiling and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateLimits {
    pub max_template_length: usize,
    pub max_variable_length: usize,
    pub max_expressions: usize,
    pub max_uri_length: usize,
    pub max_regex_size: usize,
}

impl Default for TemplateLimits {
    fn default() -> Self {
        TemplateLimits {
            max_template_length: DEFAULT_MAX_TEMPLATE_LENGTH,
            max_variable_length: DEFAULT_MAX_VARIABLE_LENGTH,
            max_expressions: DEFAULT_MAX_EXPRESSIONS,
            max_uri_length: DEFAULT_MAX_URI_LENGTH,
            max_regex_size: DEFAULT_MAX_REGEX_SIZE,
        }
    }
}

/// Template compilation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` with no `}` anywhere after it
    Unclosed { position: usize },
    TooLong {
        what: &'static str,
        max: usize,
        actual: usize,
    },
    TooManyExpressions { max: usize },
}

impl TemplateError {
    /// Malformed template text, as opposed to a configured limit being hit.
    #[must_use]
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, TemplateError::Unclosed { .. })
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Unclosed { position } => {
                write!(f, "unclosed template expression starting at byte {position}")
            }
            TemplateError::TooLong { what, max, actual } => write!(
                f,
                "{what} exceeds maximum length of {max} characters (got {actual})"
            ),
            TemplateError::TooManyExpressions { max } => {
                write!(f, "template contains too many expressions (max {max})")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// A compiled URI Template.
///
/// Compile once, then call [`UriTemplate::expand`] and [`UriTemplate::match_uri`]
/// any number of times. Neither call mutates the template; the match pattern is
/// built on first use and cached, so a `UriTemplate` can be shared across threads.
///
/// ```
/// use mcpwire::uri_template::{TemplateVariables, UriTemplate};
///
/// let template = UriTemplate::new("/users/{id}{?fields}").unwrap();
/// let mut vars = TemplateVariables::new();
/// vars.insert("id".into(), "42".into());
/// assert_eq!(template.expand(&vars), "/users/42");
///
/// let bound = template.match_uri("/users/7?fields=name").unwrap();
/// assert_eq!(bound["id"].as_str(), Some("7"));
/// ```
#[derive(Debug, Clone)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
    variable_names: Vec<String>,
    limits: TemplateLimits,
    matcher: OnceCell<Option<Matcher>>,
}

impl UriTemplate {
    /// Compile `source` with the default [`TemplateLimits`].
    pub fn new(source: &str) -> Result<Self, TemplateError> {
        Self::with_limits(source, TemplateLimits::default())
    }

    pub fn with_limits(source: &str, limits: TemplateLimits) -> Result<Self, TemplateError> {
        let segments = match parse_template(source, &limits) {
            Ok(segments) => segments,
            Err(err) => {
                warn!(error = %err, template_len = source.len(), "Template compile failed");
                return Err(err);
            }
        };

        let variable_names: Vec<String> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Expression(expr) => Some(expr.vars.iter().map(|v| v.name.clone())),
                Segment::Literal(_) => None,
            })
            .flatten()
            .collect();

        debug!(
            template_len = source.len(),
            segments = segments.len(),
            variables = variable_names.len(),
            "Template compiled"
        );

        Ok(Self {
            source: source.to_string(),
            segments,
            variable_names,
            limits,
            matcher: OnceCell::new(),
        })
    }

    /// Every variable name in template order, duplicates included.
    #[must_use]
    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the template with `vars`. Unbound and empty variables render nothing.
    #[must_use]
    pub fn expand(&self, vars: &TemplateVariables) -> String {
        expand_segments(&self.segments, vars)
    }

    /// Match `uri` against the whole template and extract the bound variables.
    ///
    /// Returns `None` when the URI does not match from start to end.
    #[must_use]
    pub fn match_uri(&self, uri: &str) -> Option<TemplateVariables> {
        if uri.len() > self.limits.max_uri_length {
            debug!(
                uri_len = uri.len(),
                max = self.limits.max_uri_length,
                "URI longer than the match limit"
            );
            return None;
        }

        let matcher = self
            .matcher
            .get_or_init(|| Matcher::build(&self.segments, &self.limits))
            .as_ref()?;
        let result = matcher.captures(uri);
        debug!(
            template = %truncate_for_log(&self.source),
            matched = result.is_some(),
            "Template match attempt"
        );
        result
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for UriTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn truncate_for_log(s: &str) -> &str {
    match s.char_indices().nth(128) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
