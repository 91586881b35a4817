use crate::ids::SessionId;

/// Query parameter carrying the session id on the message endpoint.
pub const SESSION_ID_PARAM: &str = "SessionID";

/// Append the session id to a client-supplied endpoint.
///
/// The endpoint is kept byte-for-byte: existing query parameters stay in
/// place and a `#fragment` is re-attached after the new parameter. An empty
/// endpoint is treated as `/`.
///
/// ```
/// use mcpwire::sse::augment_endpoint;
///
/// assert_eq!(augment_endpoint("/messages", "abc"), "/messages?SessionID=abc");
/// assert_eq!(augment_endpoint("/m?x=1#top", "abc"), "/m?x=1&SessionID=abc#top");
/// ```
pub fn augment_endpoint(endpoint: &str, session_id: &str) -> String {
    let (base, fragment) = match endpoint.find('#') {
        Some(idx) => endpoint.split_at(idx),
        None => (endpoint, ""),
    };
    let base = if base.is_empty() { "/" } else { base };

    let separator = if base.contains('?') { '&' } else { '?' };

    let id = urlencoding::encode(session_id);
    let mut out =
        String::with_capacity(base.len() + SESSION_ID_PARAM.len() + id.len() + fragment.len() + 2);
    out.push_str(base);
    out.push(separator);
    out.push_str(SESSION_ID_PARAM);
    out.push('=');
    out.push_str(&id);
    out.push_str(fragment);
    out
}

/// Read the session id back out of a follow-up request target.
///
/// Accepts a full target (`/messages?SessionID=...`) or a bare query string.
/// The first `SessionID` parameter is percent-decoded and parsed; a missing or
/// malformed value gives `None`.
pub fn session_id_from_query(target: &str) -> Option<SessionId> {
    let query = target.split_once('?').map_or(target, |(_, query)| query);
    let query = query.split_once('#').map_or(query, |(query, _)| query);
    let raw = query.split('&').find_map(|pair| {
        pair.strip_prefix(SESSION_ID_PARAM)?.strip_prefix('=')
    });
    let decoded = raw.and_then(|value| urlencoding::decode(value).ok());
    SessionId::from_query_value(decoded.as_deref())
}

#[cfg(test)]
mod tests {
    use super::{augment_endpoint, session_id_from_query};
    use crate::ids::SessionId;

    #[test]
    fn test_plain_path() {
        assert_eq!(augment_endpoint("/messages", "s1"), "/messages?SessionID=s1");
    }

    #[test]
    fn test_existing_query_is_preserved() {
        assert_eq!(
            augment_endpoint("/messages?foo=bar&baz=qux", "s1"),
            "/messages?foo=bar&baz=qux&SessionID=s1"
        );
    }

    #[test]
    fn test_fragment_stays_last() {
        assert_eq!(
            augment_endpoint("/messages#section1", "s1"),
            "/messages?SessionID=s1#section1"
        );
        assert_eq!(
            augment_endpoint("/messages?key=value#section2", "s1"),
            "/messages?key=value&SessionID=s1#section2"
        );
    }

    #[test]
    fn test_empty_and_root_endpoints() {
        assert_eq!(augment_endpoint("", "s1"), "/?SessionID=s1");
        assert_eq!(augment_endpoint("/", "s1"), "/?SessionID=s1");
        assert_eq!(augment_endpoint("#top", "s1"), "/?SessionID=s1#top");
    }

    #[test]
    fn test_bare_question_mark_gets_continuation() {
        assert_eq!(augment_endpoint("/m?", "s1"), "/m?&SessionID=s1");
    }

    #[test]
    fn test_special_characters_are_kept_verbatim() {
        assert_eq!(
            augment_endpoint("/messages?q=hello%20world&x=a+b", "s1"),
            "/messages?q=hello%20world&x=a+b&SessionID=s1"
        );
        assert_eq!(
            augment_endpoint("/v1/ünïcode/path", "s1"),
            "/v1/ünïcode/path?SessionID=s1"
        );
    }

    #[test]
    fn test_session_id_is_encoded() {
        assert_eq!(augment_endpoint("/m", "a b&c"), "/m?SessionID=a%20b%26c");
    }

    #[test]
    fn test_session_id_read_back_from_augmented_endpoint() {
        let id = SessionId::new();
        let target = augment_endpoint("/messages?key=value#section2", &id.to_string());
        assert_eq!(session_id_from_query(&target), Some(id));
        assert_eq!(
            session_id_from_query(&format!("SessionID={id}&x=1")),
            Some(id)
        );
    }

    #[test]
    fn test_missing_or_malformed_session_id() {
        assert_eq!(session_id_from_query("/messages"), None);
        assert_eq!(session_id_from_query("/messages?SessionIDX=1"), None);
        assert_eq!(session_id_from_query("/messages?SessionID=not-a-ulid"), None);
        assert_eq!(session_id_from_query("/messages?SessionID="), None);
    }
}
