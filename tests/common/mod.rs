#![allow(dead_code)]

pub mod recording_stream {
    use http::StatusCode;
    use mcpwire::sse::{EventStream, StreamEvent, StreamListener, TransportError, WriteOutcome};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct Recorded {
        pub calls: Vec<&'static str>,
        pub status: Option<StatusCode>,
        pub headers: Vec<(String, String)>,
        pub writes: Vec<Vec<u8>>,
        pub ended: bool,
        listener: Option<StreamListener>,
        buffered: bool,
        fail_head: Option<TransportError>,
        fail_writes: Option<TransportError>,
    }

    /// [`EventStream`] that records every call. Clones share one log, so the
    /// test keeps a clone after handing the stream to a session.
    #[derive(Clone, Default)]
    pub struct RecordingStream {
        log: Arc<Mutex<Recorded>>,
    }

    impl RecordingStream {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
            f(&mut self.log.lock().unwrap())
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.with(|r| r.calls.clone())
        }

        pub fn writes(&self) -> Vec<String> {
            self.with(|r| {
                r.writes
                    .iter()
                    .map(|w| String::from_utf8(w.clone()).unwrap())
                    .collect()
            })
        }

        pub fn has_listener(&self) -> bool {
            self.with(|r| r.listener.is_some())
        }

        /// Report every later write as above the high-water mark.
        pub fn set_buffered(&self, buffered: bool) {
            self.with(|r| r.buffered = buffered);
        }

        pub fn fail_head_with(&self, err: TransportError) {
            self.with(|r| r.fail_head = Some(err));
        }

        pub fn fail_writes_with(&self, err: TransportError) {
            self.with(|r| r.fail_writes = Some(err));
        }

        /// Deliver an event the way a socket would, outside any stream call.
        pub fn emit(&self, event: StreamEvent) {
            let listener = self.with(|r| r.listener.clone());
            if let Some(listener) = listener {
                listener(event);
            }
        }
    }

    impl EventStream for RecordingStream {
        fn write_head(
            &mut self,
            status: StatusCode,
            headers: &[(&'static str, &'static str)],
        ) -> Result<(), TransportError> {
            self.with(|r| {
                r.calls.push("write_head");
                if let Some(err) = r.fail_head.clone() {
                    return Err(err);
                }
                r.status = Some(status);
                r.headers = headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                Ok(())
            })
        }

        fn write(&mut self, frame: &[u8]) -> Result<WriteOutcome, TransportError> {
            self.with(|r| {
                r.calls.push("write");
                if let Some(err) = r.fail_writes.clone() {
                    return Err(err);
                }
                r.writes.push(frame.to_vec());
                Ok(if r.buffered {
                    WriteOutcome::Buffered
                } else {
                    WriteOutcome::Accepted
                })
            })
        }

        fn subscribe(&mut self, listener: StreamListener) {
            self.with(|r| {
                r.calls.push("subscribe");
                r.listener = Some(listener);
            });
        }

        fn unsubscribe(&mut self) {
            self.with(|r| {
                r.calls.push("unsubscribe");
                r.listener = None;
            });
        }

        fn end(&mut self) {
            self.with(|r| {
                r.calls.push("end");
                r.ended = true;
            });
        }
    }
}

pub mod test_tracing {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Layer;

    /// Route `tracing` output of the current test through the test writer.
    pub fn init() -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_filter(tracing_subscriber::EnvFilter::new("mcpwire=debug")),
        );
        tracing::subscriber::set_default(subscriber)
    }
}
