use std::borrow::Cow;

/// RFC 3986 reserved characters (gen-delims and sub-delims).
pub(crate) fn is_reserved(c: char) -> bool {
    matches!(
        c,
        ':' | '/' | '?' | '#' | '[' | ']' | '@' | '!' | '$' | '&' | '\'' | '(' | ')' | '*'
            | '+' | ',' | ';' | '='
    )
}

/// RFC 3986 unreserved characters.
pub(crate) fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Encode everything except unreserved characters.
pub(crate) fn encode_component(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Encode everything except unreserved and reserved characters.
pub(crate) fn encode_reserved(value: &str) -> Cow<'_, str> {
    if value.chars().all(|c| is_unreserved(c) || is_reserved(c)) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + value.len() / 2);
    let mut run_start = None;
    for (idx, c) in value.char_indices() {
        if is_reserved(c) {
            if let Some(start) = run_start.take() {
                out.push_str(&urlencoding::encode(&value[start..idx]));
            }
            out.push(c);
        } else if run_start.is_none() {
            run_start = Some(idx);
        }
    }
    if let Some(start) = run_start {
        out.push_str(&urlencoding::encode(&value[start..]));
    }
    Cow::Owned(out)
}
