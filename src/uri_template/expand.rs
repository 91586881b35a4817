// Template expansion.

use std::borrow::Cow;

use super::core::{Expression, Operator, QueryState, Segment, TemplateValue, TemplateVariables, VarSpec};
use super::encode::{encode_component, encode_reserved};

pub(crate) fn expand_segments(segments: &[Segment], vars: &TemplateVariables) -> String {
    let mut out = String::new();
    let mut query = QueryState::default();

    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Expression(expr) => expand_expression(expr, vars, &mut query, &mut out),
        }
    }

    out
}

/// Render one expression. Nothing at all is written, prefix included, when
/// every variable is unbound or empty.
fn expand_expression(
    expr: &Expression,
    vars: &TemplateVariables,
    query: &mut QueryState,
    out: &mut String,
) {
    let operator = expr.operator;
    let mut rendered: Vec<String> = Vec::with_capacity(expr.vars.len());

    for spec in &expr.vars {
        let Some(value) = vars.get(&spec.name).filter(|v| !v.is_empty()) else {
            continue;
        };
        let encoded = render_value(spec, value, operator);
        if operator.is_query() {
            let mut pair = String::with_capacity(spec.name.len() + 1 + encoded.len());
            pair.push_str(&spec.name);
            pair.push('=');
            pair.push_str(&encoded);
            rendered.push(pair);
        } else {
            rendered.push(encoded);
        }
    }

    if rendered.is_empty() {
        return;
    }

    out.push_str(query.open(operator));
    let separator = if operator.is_query() { "&" } else { "," };
    out.push_str(&rendered.join(separator));
}

/// Encode a value; list items are joined with `,` for every operator.
fn render_value(spec: &VarSpec, value: &TemplateValue, operator: Operator) -> String {
    match value {
        TemplateValue::Single(s) => encode_value(truncate(s, spec.max_length), operator).into_owned(),
        TemplateValue::List(items) => items
            .iter()
            .map(|item| encode_value(truncate(item, spec.max_length), operator))
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn encode_value(value: &str, operator: Operator) -> Cow<'_, str> {
    if operator.allows_reserved() {
        encode_reserved(value)
    } else {
        encode_component(value)
    }
}

fn truncate(value: &str, max_length: Option<usize>) -> &str {
    match max_length.and_then(|max| value.char_indices().nth(max)) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
