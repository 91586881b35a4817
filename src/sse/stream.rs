use http::StatusCode;
use may::sync::mpsc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::TransportError;

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Taken and below the stream's high-water mark
    Accepted,
    /// Taken, but the stream is above its high-water mark; wait for
    /// [`StreamEvent::Drain`] before writing more
    Buffered,
}

/// Asynchronous notification from a stream to its listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Drain,
    Closed,
    Error(TransportError),
}

pub type StreamListener = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// A writable, long-lived response body for `text/event-stream`.
///
/// Write failures are reported through return values. The listener is only
/// invoked for events that happen outside a call into the stream: an
/// implementation must never call it synchronously from `write_head`,
/// `write`, `subscribe`, `unsubscribe` or `end`.
pub trait EventStream: Send {
    /// Set the status line and response headers. Called once, before any write.
    fn write_head(
        &mut self,
        status: StatusCode,
        headers: &[(&'static str, &'static str)],
    ) -> Result<(), TransportError>;

    /// Write one complete frame.
    fn write(&mut self, frame: &[u8]) -> Result<WriteOutcome, TransportError>;

    /// Register the listener for drain, close and error events, replacing
    /// any previous one.
    fn subscribe(&mut self, listener: StreamListener);

    fn unsubscribe(&mut self);

    /// Finish the response. Later writes fail with [`TransportError::Closed`].
    fn end(&mut self);
}

/// Chunk delivered to the reading side of a [`ChannelStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Head {
        status: StatusCode,
        headers: Vec<(String, String)>,
    },
    Data(Vec<u8>),
}

type SharedListener = Arc<Mutex<Option<StreamListener>>>;

fn current_listener(slot: &SharedListener) -> Option<StreamListener> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// In-memory [`EventStream`] backed by a `may` coroutine channel.
///
/// Writes never block. With a high-water mark set, a write that leaves that
/// many or more data frames unread reports [`WriteOutcome::Buffered`]; the reader
/// emits [`StreamEvent::Drain`] once the backlog falls below the mark again.
pub struct ChannelStream {
    tx: Option<mpsc::Sender<StreamChunk>>,
    pending: Arc<AtomicUsize>,
    high_water_mark: Option<usize>,
    listener: SharedListener,
}

/// Reading half of a [`ChannelStream`]. Dropping it simulates the peer
/// disconnecting: the listener receives [`StreamEvent::Closed`].
pub struct FrameReceiver {
    rx: mpsc::Receiver<StreamChunk>,
    pending: Arc<AtomicUsize>,
    high_water_mark: Option<usize>,
    listener: SharedListener,
}

/// Create an unbounded channel stream.
pub fn channel() -> (ChannelStream, FrameReceiver) {
    build(None)
}

/// Create a channel stream that signals backpressure at `high_water_mark`
/// unread frames.
pub fn channel_with_high_water_mark(high_water_mark: usize) -> (ChannelStream, FrameReceiver) {
    build(Some(high_water_mark.max(1)))
}

fn build(high_water_mark: Option<usize>) -> (ChannelStream, FrameReceiver) {
    let (tx, rx) = mpsc::channel();
    let pending = Arc::new(AtomicUsize::new(0));
    let listener: SharedListener = Arc::new(Mutex::new(None));
    (
        ChannelStream {
            tx: Some(tx),
            pending: Arc::clone(&pending),
            high_water_mark,
            listener: Arc::clone(&listener),
        },
        FrameReceiver {
            rx,
            pending,
            high_water_mark,
            listener,
        },
    )
}

impl ChannelStream {
    fn sender(&self) -> Result<&mpsc::Sender<StreamChunk>, TransportError> {
        self.tx.as_ref().ok_or(TransportError::Closed)
    }
}

impl EventStream for ChannelStream {
    fn write_head(
        &mut self,
        status: StatusCode,
        headers: &[(&'static str, &'static str)],
    ) -> Result<(), TransportError> {
        let headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.sender()?
            .send(StreamChunk::Head { status, headers })
            .map_err(|_| TransportError::Closed)
    }

    fn write(&mut self, frame: &[u8]) -> Result<WriteOutcome, TransportError> {
        let tx = self.sender()?;
        let queued = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        if tx.send(StreamChunk::Data(frame.to_vec())).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(TransportError::Closed);
        }
        match self.high_water_mark {
            Some(mark) if queued >= mark => Ok(WriteOutcome::Buffered),
            _ => Ok(WriteOutcome::Accepted),
        }
    }

    fn subscribe(&mut self, listener: StreamListener) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn unsubscribe(&mut self) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn end(&mut self) {
        self.tx = None;
    }
}

impl FrameReceiver {
    /// Block until the next chunk arrives. `None` once the stream has ended.
    pub fn recv(&self) -> Option<StreamChunk> {
        let chunk = self.rx.recv().ok()?;
        self.consumed(&chunk);
        Some(chunk)
    }

    pub fn try_recv(&self) -> Option<StreamChunk> {
        let chunk = self.rx.try_recv().ok()?;
        self.consumed(&chunk);
        Some(chunk)
    }

    /// Drain every chunk until the stream ends and concatenate the data
    /// frames into one `text/event-stream` body.
    pub fn collect(self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.recv() {
            if let StreamChunk::Data(bytes) = chunk {
                out.push_str(&String::from_utf8_lossy(&bytes));
            }
        }
        out
    }

    /// Report an error on the stream as a socket would.
    pub fn fail(&self, error: TransportError) {
        if let Some(listener) = current_listener(&self.listener) {
            listener(StreamEvent::Error(error));
        }
    }

    fn consumed(&self, chunk: &StreamChunk) {
        if !matches!(chunk, StreamChunk::Data(_)) {
            return;
        }
        let before = self.pending.fetch_sub(1, Ordering::AcqRel);
        if let Some(mark) = self.high_water_mark {
            if before == mark {
                if let Some(listener) = current_listener(&self.listener) {
                    listener(StreamEvent::Drain);
                }
            }
        }
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        if let Some(listener) = current_listener(&self.listener) {
            listener(StreamEvent::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_frames_arrive_in_order() {
        let (mut stream, rx) = channel();
        stream
            .write_head(StatusCode::OK, &[("Content-Type", "text/event-stream")])
            .unwrap();
        stream.write(b"data: 1\n\n").unwrap();
        stream.write(b"data: 2\n\n").unwrap();
        match rx.recv().unwrap() {
            StreamChunk::Head { status, headers } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(headers[0].1, "text/event-stream");
            }
            other => panic!("expected head, got {other:?}"),
        }
        stream.end();
        assert_eq!(rx.collect(), "data: 1\n\ndata: 2\n\n");
    }

    #[test]
    fn test_write_after_end_fails() {
        let (mut stream, _rx) = channel();
        stream.end();
        assert_eq!(stream.write(b"x"), Err(TransportError::Closed));
    }

    #[test]
    fn test_write_after_receiver_dropped_fails() {
        let (mut stream, rx) = channel();
        drop(rx);
        assert_eq!(stream.write(b"x"), Err(TransportError::Closed));
    }

    #[test]
    fn test_high_water_mark_and_drain() {
        let (mut stream, rx) = channel_with_high_water_mark(2);
        let drained = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&drained);
        stream.subscribe(Arc::new(move |event| {
            if event == StreamEvent::Drain {
                flag.store(true, Ordering::SeqCst);
            }
        }));

        assert_eq!(stream.write(b"a").unwrap(), WriteOutcome::Accepted);
        assert_eq!(stream.write(b"b").unwrap(), WriteOutcome::Buffered);
        assert!(!drained.load(Ordering::SeqCst));

        rx.try_recv().unwrap();
        assert!(drained.load(Ordering::SeqCst));
        assert_eq!(stream.write(b"c").unwrap(), WriteOutcome::Buffered);
    }

    #[test]
    fn test_dropping_receiver_notifies_listener() {
        let (mut stream, rx) = channel();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        stream.subscribe(Arc::new(move |event| {
            if event == StreamEvent::Closed {
                flag.store(true, Ordering::SeqCst);
            }
        }));
        drop(rx);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unsubscribed_listener_is_silent() {
        let (mut stream, rx) = channel();
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        stream.subscribe(Arc::new(move |_| flag.store(true, Ordering::SeqCst)));
        stream.unsubscribe();
        drop(rx);
        assert!(!called.load(Ordering::SeqCst));
    }
}
