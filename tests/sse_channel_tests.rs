use http::StatusCode;
use mcpwire::sse::{self, SessionState, SseSession, StreamChunk, TransportError};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn test_channel_session_body() {
    let (stream, rx) = sse::channel();
    let session = SseSession::new("/messages", stream);
    session.start().unwrap();
    session.send(&json!({"jsonrpc": "2.0", "id": 1})).unwrap();
    session.close();

    let id = session.session_id();
    assert_eq!(
        rx.collect(),
        format!(
            "event: endpoint\ndata: /messages?SessionID={id}\n\n\
             event: message\ndata: {{\"id\":1,\"jsonrpc\":\"2.0\"}}\n\n"
        )
    );
}

#[test]
fn test_channel_head_carries_sse_headers() {
    let (stream, rx) = sse::channel();
    let session = SseSession::new("/messages", stream);
    session.start().unwrap();

    match rx.recv().unwrap() {
        StreamChunk::Head { status, headers } => {
            assert_eq!(status, StatusCode::OK);
            assert!(headers.contains(&("Content-Type".to_string(), "text/event-stream".to_string())));
        }
        other => panic!("expected head, got {other:?}"),
    }
    assert!(matches!(rx.recv(), Some(StreamChunk::Data(_))));
}

#[test]
fn test_dropping_receiver_closes_session() {
    let (stream, rx) = sse::channel();
    let session = SseSession::new("/messages", stream);
    let closed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&closed);
    session.on_close(move || flag.store(true, Ordering::SeqCst));
    session.start().unwrap();

    drop(rx);

    assert_eq!(session.state(), SessionState::Closed);
    assert!(closed.load(Ordering::SeqCst));
    assert!(session.send(&json!({})).is_err());
}

#[test]
fn test_receiver_failure_closes_session() {
    let (stream, rx) = sse::channel();
    let session = SseSession::new("/messages", stream);
    session.start().unwrap();

    rx.fail(TransportError::Write {
        message: "socket reset".into(),
    });
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn test_high_water_mark_backpressure_and_drain() {
    let (stream, rx) = sse::channel_with_high_water_mark(2);
    let session = SseSession::new("/messages", stream);
    session.start().unwrap();
    assert!(!session.is_backpressured());

    let delivery = session.send(&json!({"id": 1})).unwrap();
    assert_eq!(delivery, sse::Delivery::Backpressured);
    assert!(session.is_backpressured());

    // head, endpoint frame, then the message that crossed the mark
    assert!(matches!(rx.try_recv(), Some(StreamChunk::Head { .. })));
    assert!(session.is_backpressured());
    assert!(matches!(rx.try_recv(), Some(StreamChunk::Data(_))));
    assert!(!session.is_backpressured());
    assert!(matches!(rx.try_recv(), Some(StreamChunk::Data(_))));
}

#[test]
fn test_frames_forwarded_from_a_coroutine() {
    let (stream, rx) = sse::channel();
    let session = Arc::new(SseSession::new("/messages", stream));
    session.start().unwrap();

    let producer = Arc::clone(&session);
    let handle = may::go!(move || {
        for id in 0..10 {
            producer.send(&json!({"id": id})).unwrap();
        }
        producer.close();
    });

    let body = rx.collect();
    handle.join().unwrap();

    let messages: Vec<_> = body
        .split("\n\n")
        .filter(|frame| frame.starts_with("event: message"))
        .collect();
    assert_eq!(messages.len(), 10);
    assert_eq!(messages[9], "event: message\ndata: {\"id\":9}");
}
