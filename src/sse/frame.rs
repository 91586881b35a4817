//! `text/event-stream` frame formatting.

/// Event name announcing where clients POST their messages.
pub const ENDPOINT_EVENT: &str = "endpoint";
/// Event name carrying one JSON-RPC message.
pub const MESSAGE_EVENT: &str = "message";

/// Format one named event.
///
/// Every line of `data` gets its own `data: ` field so the frame survives
/// payloads containing newlines; single-line data yields
/// `event: <name>\ndata: <data>\n\n`.
pub fn event_frame(event: &str, data: &str) -> String {
    let mut out = String::with_capacity(event.len() + data.len() + 16);
    out.push_str("event: ");
    out.push_str(event);
    out.push('\n');
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    out
}

pub fn endpoint_frame(endpoint: &str) -> String {
    event_frame(ENDPOINT_EVENT, endpoint)
}

pub fn message_frame(payload: &str) -> String {
    event_frame(MESSAGE_EVENT, payload)
}
