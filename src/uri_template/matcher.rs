//! Reverse matching: URI to variable bindings.
//!
//! A compiled template is lowered into a sequence of [`Piece`]s: literal text
//! and captures whose character class stops at the delimiter that begins the
//! next segment. Two engines run that sequence:
//!
//! - **Regex**: one anchored pattern with a capture group per capture piece.
//!   The `regex` crate runs in time linear in the input, so adversarial URIs
//!   cannot trigger catastrophic backtracking.
//! - **Scan**: a greedy left-to-right walk with memoized backtracking. Used
//!   when the capture count would make the regex engine's per-search capture
//!   table too large (its size is NFA states times capture slots, and neither
//!   `size_limit` nor `dfa_size_limit` bounds it).
//!
//! Both engines resolve ambiguity the same way: earlier captures take the
//! longest span that still lets the rest of the template match.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use super::core::{
    Expression, Operator, QueryState, Segment, TemplateLimits, TemplateValue, TemplateVariables,
    VarSpec,
};
use super::encode::is_unreserved;

/// Largest estimated regex capture table, in bytes, before the scanner takes over.
const MAX_CAPTURE_TABLE_BYTES: usize = 8 * 1024 * 1024;

/// Work units (characters examined plus backtracking steps) one scan may spend.
const SCAN_STEP_BUDGET: usize = 4 * 1024 * 1024;

/// How one capture maps back onto variables.
#[derive(Debug, Clone)]
enum Slot {
    /// `name=value` pair of a query expression
    Named(VarSpec),
    /// Whole expression text, split on `,` in declaration order
    Positional(Vec<VarSpec>),
}

/// Characters a capture may span.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CharClass {
    /// Anything but `\n`, same as the regex `.`
    Any,
    Excluding(Vec<char>),
}

impl CharClass {
    fn allows(&self, c: char) -> bool {
        match self {
            CharClass::Any => c != '\n',
            CharClass::Excluding(chars) => !chars.contains(&c),
        }
    }

    fn to_regex(&self) -> String {
        match self {
            CharClass::Any => ".".to_string(),
            CharClass::Excluding(chars) => {
                let mut class = String::from("[^");
                for c in chars {
                    class.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                }
                class.push(']');
                class
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    /// One or more characters of the class, bound to slot `.1`
    Capture(CharClass, usize),
}

#[derive(Debug, Clone)]
enum Engine {
    Regex(Regex),
    Scan(Scanner),
}

#[derive(Debug, Clone)]
pub(crate) struct Matcher {
    engine: Engine,
    slots: Vec<Slot>,
}

impl Matcher {
    /// Build the matcher, or `None` if the regex pattern exceeds the size limit.
    pub(crate) fn build(segments: &[Segment], limits: &TemplateLimits) -> Option<Self> {
        let (pieces, slots) = lower(segments);
        let pattern = render_pattern(&pieces);

        let table = capture_table_estimate(pattern.len(), slots.len());
        if table > MAX_CAPTURE_TABLE_BYTES {
            debug!(
                captures = slots.len(),
                estimated_bytes = table,
                "Template matched by scanning"
            );
            return Some(Self {
                engine: Engine::Scan(Scanner::new(pieces, slots.len())),
                slots,
            });
        }

        match RegexBuilder::new(&pattern)
            .size_limit(limits.max_regex_size)
            .dfa_size_limit(limits.max_regex_size)
            .build()
        {
            Ok(regex) => Some(Self {
                engine: Engine::Regex(regex),
                slots,
            }),
            Err(err) => {
                warn!(
                    error = %err,
                    pattern_len = pattern.len(),
                    "Template match pattern could not be built"
                );
                None
            }
        }
    }

    pub(crate) fn captures(&self, uri: &str) -> Option<TemplateVariables> {
        let spans = match &self.engine {
            Engine::Regex(regex) => {
                let caps = regex.captures(uri)?;
                (1..=self.slots.len())
                    .map(|idx| caps.get(idx).map(|m| (m.start(), m.end())))
                    .collect::<Option<Vec<_>>>()?
            }
            Engine::Scan(scanner) => scanner.scan(uri)?,
        };

        let mut vars = TemplateVariables::with_capacity(self.slots.len());
        for (slot, (start, end)) in self.slots.iter().zip(spans) {
            let text = &uri[start..end];
            match slot {
                Slot::Named(spec) => bind(&mut vars, spec, text),
                Slot::Positional(specs) if specs.len() == 1 => bind(&mut vars, &specs[0], text),
                Slot::Positional(specs) => {
                    for (spec, part) in specs.iter().zip(text.splitn(specs.len(), ',')) {
                        bind(&mut vars, spec, part);
                    }
                }
            }
        }

        Some(vars)
    }
}

/// Bytes the regex engine would hold per search: two slots per group
/// (plus the implicit whole-match group) for every NFA state. Pattern length
/// stands in for the state count.
fn capture_table_estimate(pattern_len: usize, captures: usize) -> usize {
    pattern_len
        .saturating_mul(captures.saturating_add(1))
        .saturating_mul(2 * std::mem::size_of::<usize>())
}

/// Later occurrences of a duplicated name overwrite earlier ones.
fn bind(vars: &mut TemplateVariables, spec: &VarSpec, text: &str) {
    let value = if spec.explode {
        TemplateValue::List(text.split(',').map(str::to_string).collect())
    } else {
        TemplateValue::Single(text.to_string())
    };
    vars.insert(spec.name.clone(), value);
}

fn lower(segments: &[Segment]) -> (Vec<Piece>, Vec<Slot>) {
    let mut pieces = Vec::with_capacity(segments.len() * 2);
    let mut slots = Vec::new();
    let mut query = QueryState::default();

    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(text) => pieces.push(Piece::Literal(text.clone())),
            // never renders anything
            Segment::Expression(expr) if expr.vars.is_empty() => {}
            Segment::Expression(expr) if expr.operator.is_query() => {
                let lead = query.open(expr.operator);
                for (n, spec) in expr.vars.iter().enumerate() {
                    let sep = if n == 0 { lead } else { "&" };
                    pieces.push(Piece::Literal(format!("{sep}{}=", spec.name)));
                    pieces.push(Piece::Capture(
                        CharClass::Excluding(vec!['&', '#']),
                        slots.len(),
                    ));
                    slots.push(Slot::Named(spec.clone()));
                }
            }
            Segment::Expression(expr) => {
                let prefix = expr.operator.prefix();
                if !prefix.is_empty() {
                    pieces.push(Piece::Literal(prefix.to_string()));
                }
                let class = value_class(expr, next_delimiter(&segments[idx + 1..]));
                pieces.push(Piece::Capture(class, slots.len()));
                slots.push(Slot::Positional(expr.vars.clone()));
            }
        }
    }

    (pieces, slots)
}

fn render_pattern(pieces: &[Piece]) -> String {
    let mut pattern = String::with_capacity(pieces.len() * 12 + 2);
    pattern.push('^');
    for piece in pieces {
        match piece {
            Piece::Literal(text) => pattern.push_str(&regex::escape(text)),
            Piece::Capture(class, _) => {
                pattern.push('(');
                pattern.push_str(&class.to_regex());
                pattern.push_str("+)");
            }
        }
    }
    pattern.push('$');
    pattern
}

/// Character class for one non-query expression's captured text.
fn value_class(expr: &Expression, next: Option<char>) -> CharClass {
    if expr.operator.allows_reserved() {
        // reserved characters pass through unescaped, so no delimiter is safe to exclude
        return CharClass::Any;
    }

    let mut excluded = vec!['/'];
    let single_plain = expr.vars.len() == 1 && !expr.vars[0].explode;
    if single_plain {
        excluded.push(',');
    }
    // Encoded values only ever contain unreserved characters and `%`, so any
    // other delimiter that starts the next segment can never be part of this one.
    if let Some(c) = next.filter(|c| !is_unreserved(*c) && *c != '%') {
        if !excluded.contains(&c) {
            excluded.push(c);
        }
    }
    CharClass::Excluding(excluded)
}

/// First character the next rendered segment would start with.
fn next_delimiter(rest: &[Segment]) -> Option<char> {
    rest.iter().find_map(|segment| match segment {
        Segment::Literal(text) => Some(text.chars().next()),
        Segment::Expression(expr) if expr.vars.is_empty() => None,
        Segment::Expression(expr) => Some(next_expression_char(expr)),
    })?
}

fn next_expression_char(expr: &Expression) -> Option<char> {
    match expr.operator {
        Operator::Simple | Operator::Reserved => None,
        // `{?x}` may render as `&x=` after an earlier query expression
        Operator::Query => None,
        other => other.prefix().chars().next(),
    }
}

/// A capture whose span can still be shortened.
#[derive(Debug, Clone, Copy)]
struct Choice {
    piece: usize,
    slot: usize,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
struct Scanner {
    pieces: Vec<Piece>,
    /// Fewest bytes pieces `i..` can consume; one extra trailing zero
    min_len: Vec<usize>,
    captures: usize,
}

impl Scanner {
    fn new(pieces: Vec<Piece>, captures: usize) -> Self {
        let mut min_len = vec![0usize; pieces.len() + 1];
        for (idx, piece) in pieces.iter().enumerate().rev() {
            let own = match piece {
                Piece::Literal(text) => text.len(),
                Piece::Capture(..) => 1,
            };
            min_len[idx] = min_len[idx + 1].saturating_add(own);
        }
        Self {
            pieces,
            min_len,
            captures,
        }
    }

    /// Byte spans of every capture, or `None` on no match.
    ///
    /// Each capture first takes the longest run its class allows (leaving room
    /// for the rest of the template) and is shortened one character at a time
    /// on failure. A `(piece, position)` pair that failed once is never
    /// explored again, and the whole walk stops after [`SCAN_STEP_BUDGET`].
    fn scan(&self, uri: &str) -> Option<Vec<(usize, usize)>> {
        let mut spans = vec![(0, 0); self.captures];
        let mut choices: Vec<Choice> = Vec::new();
        let mut failed: HashSet<(usize, usize)> = HashSet::new();
        let mut steps = 0usize;
        let (mut piece, mut pos) = (0usize, 0usize);

        loop {
            steps += 1;
            if steps > SCAN_STEP_BUDGET {
                warn!(
                    uri_len = uri.len(),
                    pieces = self.pieces.len(),
                    "Template match gave up after step budget"
                );
                return None;
            }

            let advanced = if piece == self.pieces.len() {
                if pos == uri.len() {
                    return Some(spans);
                }
                false
            } else if uri.len() - pos < self.min_len[piece] || failed.contains(&(piece, pos)) {
                false
            } else {
                match &self.pieces[piece] {
                    Piece::Literal(text) => {
                        let hit = uri[pos..].starts_with(text.as_str());
                        if hit {
                            pos += text.len();
                            piece += 1;
                        }
                        hit
                    }
                    Piece::Capture(class, slot) => {
                        let limit = uri.len() - self.min_len[piece + 1];
                        let mut end = pos;
                        for c in uri[pos..].chars() {
                            if end + c.len_utf8() > limit || !class.allows(c) {
                                break;
                            }
                            end += c.len_utf8();
                            steps += 1;
                        }
                        if end > pos {
                            spans[*slot] = (pos, end);
                            choices.push(Choice {
                                piece,
                                slot: *slot,
                                start: pos,
                                end,
                            });
                            piece += 1;
                            pos = end;
                            true
                        } else {
                            failed.insert((piece, pos));
                            false
                        }
                    }
                }
            };
            if advanced {
                continue;
            }

            // Shorten the most recent capture that still can be.
            loop {
                steps += 1;
                let choice = *choices.last()?;
                let last = uri[choice.start..choice.end]
                    .chars()
                    .next_back()
                    .map_or(0, char::len_utf8);
                let shorter = choice.end - last;
                if shorter > choice.start {
                    if let Some(top) = choices.last_mut() {
                        top.end = shorter;
                    }
                    spans[choice.slot] = (choice.start, shorter);
                    piece = choice.piece + 1;
                    pos = shorter;
                    break;
                }
                failed.insert((choice.piece, choice.start));
                choices.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri_template::parse::parse_template;

    fn pieces_for(template: &str) -> (Vec<Piece>, Vec<Slot>) {
        let segments = parse_template(template, &TemplateLimits::default()).unwrap();
        lower(&segments)
    }

    fn pattern_for(template: &str) -> String {
        render_pattern(&pieces_for(template).0)
    }

    fn scan(template: &str, uri: &str) -> Option<Vec<String>> {
        let (pieces, slots) = pieces_for(template);
        let spans = Scanner::new(pieces, slots.len()).scan(uri)?;
        Some(spans.iter().map(|&(s, e)| uri[s..e].to_string()).collect())
    }

    fn regex_captures(template: &str, uri: &str) -> Option<Vec<String>> {
        let re = Regex::new(&pattern_for(template)).unwrap();
        let caps = re.captures(uri)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.unwrap().as_str().to_string())
                .collect(),
        )
    }

    #[test]
    fn test_simple_pattern_is_anchored() {
        assert_eq!(pattern_for("/users/{id}"), "^/users/([^/,]+)$");
    }

    #[test]
    fn test_next_literal_delimiter_is_excluded() {
        assert_eq!(pattern_for("/a/{id};v=1"), "^/a/([^/,;]+);v=1$");
        // `.` is unreserved and may appear inside a value
        assert_eq!(pattern_for("/{name}.json"), r"^/([^/,]+)\.json$");
    }

    #[test]
    fn test_query_patterns_follow_query_state() {
        assert_eq!(
            pattern_for("/s{?q,page}{?limit}"),
            r"^/s\?q=([^&#]+)\&page=([^&#]+)\&limit=([^&#]+)$"
        );
    }

    #[test]
    fn test_reserved_spans_slashes() {
        assert_eq!(pattern_for("{+path}/here"), "^(.+)/here$");
    }

    #[test]
    fn test_exploded_path_allows_commas() {
        assert_eq!(pattern_for("{/list*}"), "^/([^/]+)$");
    }

    #[test]
    fn test_scanner_agrees_with_regex() {
        let cases = [
            ("/users/{id}", "/users/42"),
            ("/users/{id}", "/users/42/extra"),
            ("{a}{b}{c}", "abcdef"),
            ("{a}{b}{c}/end", "xyz/end"),
            ("{+path}/here", "a/b/here/here"),
            ("/{name}.json", "/report.v2.json"),
            ("/s{?q,page}", "/s?q=rust&page=2"),
            ("/s{?q,page}", "/s?page=2&q=rust"),
            ("/size/{x,y}", "/size/1,2,3"),
            ("{/list*}{#frag}", "/a,b#top"),
            ("/caf{x}", "/caf\u{e9}\u{e9}"),
            ("{+x}", "line\nbreak"),
            ("{+head}-{tail}", "a-b-c.d"),
        ];
        for (template, uri) in cases {
            assert_eq!(
                scan(template, uri),
                regex_captures(template, uri),
                "{template} against {uri:?}"
            );
        }
    }

    #[test]
    fn test_scanner_backtracks_greedy_capture() {
        // `{+head}` first takes `a-b-c`, then gives characters back until `-` fits
        assert_eq!(scan("{+head}-{tail}", "a-b-c.d").unwrap(), ["a-b", "c.d"]);
    }

    #[test]
    fn test_scanner_reserves_room_for_later_captures() {
        let spans = scan(&"{v}".repeat(4), "wxyz").unwrap();
        assert_eq!(spans, ["w", "x", "y", "z"]);
        assert!(scan(&"{v}".repeat(5), "wxyz").is_none());
    }

    #[test]
    fn test_large_templates_use_scanner() {
        let segments =
            parse_template(&"{p}".repeat(2_000), &TemplateLimits::default()).unwrap();
        let matcher = Matcher::build(&segments, &TemplateLimits::default()).unwrap();
        assert!(matches!(matcher.engine, Engine::Scan(_)));

        let segments = parse_template("/users/{id}", &TemplateLimits::default()).unwrap();
        let matcher = Matcher::build(&segments, &TemplateLimits::default()).unwrap();
        assert!(matches!(matcher.engine, Engine::Regex(_)));
    }
}
