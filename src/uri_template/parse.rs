// Template compiler: splits a template string into literal and expression segments.

use once_cell::sync::Lazy;
use regex::Regex;

use super::core::{Expression, Operator, Segment, TemplateError, TemplateLimits, VarSpec};

/// Braces around at least one non-space, non-brace character.
static TEMPLATE_EXPRESSION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\{[^{}\s]+\}").ok());

/// Returns true if `s` contains at least one non-empty `{...}` expression.
///
/// `{}` and whitespace-only braces do not count. Malformed input such as an
/// unclosed `{` simply returns false for that part; this never fails.
#[must_use]
pub fn is_template(s: &str) -> bool {
    TEMPLATE_EXPRESSION
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Compile `source` into segments.
///
/// Every `{` is paired with the first `}` after it, so each byte of the
/// template is scanned a bounded number of times.
pub(crate) fn parse_template(
    source: &str,
    limits: &TemplateLimits,
) -> Result<Vec<Segment>, TemplateError> {
    if source.len() > limits.max_template_length {
        return Err(TemplateError::TooLong {
            what: "Template",
            max: limits.max_template_length,
            actual: source.len(),
        });
    }

    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;
    let mut expressions = 0usize;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }

        let after_open = &rest[open + 1..];
        let close = after_open
            .find('}')
            .ok_or(TemplateError::Unclosed {
                position: offset + open,
            })?;
        // a `{` inside the body is just part of a name
        let body = &after_open[..close];

        expressions += 1;
        if expressions > limits.max_expressions {
            return Err(TemplateError::TooManyExpressions {
                max: limits.max_expressions,
            });
        }

        segments.push(Segment::Expression(parse_expression(body, limits)?));

        let consumed = open + 1 + close + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(segments)
}

fn parse_expression(body: &str, limits: &TemplateLimits) -> Result<Expression, TemplateError> {
    let (operator, names) = match body.chars().next().and_then(Operator::from_symbol) {
        // operator symbols are all single-byte
        Some(op) => (op, &body[1..]),
        None => (Operator::Simple, body),
    };

    let mut vars = Vec::new();
    for token in names.split(',') {
        let Some(spec) = parse_varspec(token.trim_matches([' ', '\t'])) else {
            continue;
        };
        if spec.name.len() > limits.max_variable_length {
            return Err(TemplateError::TooLong {
                what: "Variable name",
                max: limits.max_variable_length,
                actual: spec.name.len(),
            });
        }
        vars.push(spec);
    }

    Ok(Expression { operator, vars })
}

/// `name`, `name*` or `name:N`. Empty tokens yield no variable.
fn parse_varspec(token: &str) -> Option<VarSpec> {
    if let Some(name) = token.strip_suffix('*') {
        return (!name.is_empty()).then(|| VarSpec {
            name: name.to_string(),
            explode: true,
            max_length: None,
        });
    }

    if let Some((name, digits)) = token.rsplit_once(':') {
        if !name.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(max_length) = digits.parse() {
                return Some(VarSpec {
                    name: name.to_string(),
                    explode: false,
                    max_length: Some(max_length),
                });
            }
        }
    }

    (!token.is_empty()).then(|| VarSpec {
        name: token.to_string(),
        explode: false,
        max_length: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Vec<Segment>, TemplateError> {
        parse_template(s, &TemplateLimits::default())
    }

    #[test]
    fn test_varspec_modifiers() {
        let spec = parse_varspec("list*").unwrap();
        assert!(spec.explode);
        assert_eq!(spec.name, "list");

        let spec = parse_varspec("var:3").unwrap();
        assert_eq!(spec.max_length, Some(3));
        assert_eq!(spec.name, "var");

        // not a prefix modifier, kept as part of the name
        let spec = parse_varspec("a:b").unwrap();
        assert_eq!(spec.name, "a:b");
        assert_eq!(spec.max_length, None);

        assert!(parse_varspec("").is_none());
        assert!(parse_varspec("*").is_none());
    }

    #[test]
    fn test_literal_only() {
        let segments = parse("http://example.com/foo/bar").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Literal("http://example.com/foo/bar".to_string())]
        );
    }

    #[test]
    fn test_operator_and_names() {
        let segments = parse("/search{?q, page ,limit}").unwrap();
        assert_eq!(segments.len(), 2);
        let Segment::Expression(expr) = &segments[1] else {
            panic!("expected expression");
        };
        assert_eq!(expr.operator, Operator::Query);
        let names: Vec<_> = expr.vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["q", "page", "limit"]);
    }

    #[test]
    fn test_unknown_leading_char_is_part_of_name() {
        let segments = parse("{$var_name}").unwrap();
        let Segment::Expression(expr) = &segments[0] else {
            panic!("expected expression");
        };
        assert_eq!(expr.operator, Operator::Simple);
        assert_eq!(expr.vars[0].name, "$var_name");
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(
            parse("abc{unclosed"),
            Err(TemplateError::Unclosed { position: 3 })
        );
        assert_eq!(parse("{a}{"), Err(TemplateError::Unclosed { position: 3 }));
    }

    #[test]
    fn test_inner_open_brace_belongs_to_name() {
        let segments = parse("{a{b}").unwrap();
        let Segment::Expression(expr) = &segments[0] else {
            panic!("expected expression");
        };
        assert_eq!(expr.vars[0].name, "a{b");
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_expression_limit() {
        let limits = TemplateLimits {
            max_expressions: 2,
            ..TemplateLimits::default()
        };
        assert!(parse_template("{a}{b}", &limits).is_ok());
        assert_eq!(
            parse_template("{a}{b}{c}", &limits),
            Err(TemplateError::TooManyExpressions { max: 2 })
        );
    }

    #[test]
    fn test_is_template() {
        assert!(is_template("{foo}"));
        assert!(is_template("/search{?q,limit}"));
        assert!(is_template("{a}{"));
        assert!(!is_template(""));
        assert!(!is_template("{}"));
        assert!(!is_template("{ }"));
        assert!(!is_template("{unclosed"));
    }
}
