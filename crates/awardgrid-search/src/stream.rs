//! Push-side of the event stream.
//!
//! `EventSink` is the orchestrator's only view of the consumer: publish is
//! fire-and-forget, and a dead consumer degrades observability without ever
//! aborting in-flight search work.

use crate::events::SearchEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Sending half of a run's event channel. Cheap to clone.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SearchEvent>>,
    closed: Arc<AtomicBool>,
}

impl EventSink {
    /// A connected sink plus the receiver the transport drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// A sink with no consumer; every publish is a no-op. Used by the
    /// blocking entry point, which only wants the final outcome.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            tx: None,
            closed: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Append one event to the stream, best-effort.
    ///
    /// Once the consumer is gone the sink latches closed and later calls
    /// return immediately.
    pub fn publish(&self, event: SearchEvent) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).is_err() {
            self.closed.store(true, Ordering::Relaxed);
            debug!("event consumer disconnected; suppressing further events");
        }
    }

    /// Whether the consumer has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl SearchEvent {
    /// Encode this event as one server-sent-events frame:
    /// a `data: ` line holding the JSON object, terminated by a blank line.
    #[must_use]
    pub fn to_sse_frame(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("data: {json}\n\n"),
            Err(e) => {
                error!("failed to serialize event: {e}");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awardgrid_browser::PoolStats;

    #[test]
    fn test_sse_frame_format() {
        let frame = SearchEvent::status("Starting search...").to_sse_frame();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert!(frame.contains("\"type\":\"status\""));
    }

    #[tokio::test]
    async fn test_publish_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.publish(SearchEvent::status("one"));
        sink.publish(SearchEvent::status("two"));

        for expected in ["one", "two"] {
            match rx.recv().await.expect("event delivered") {
                SearchEvent::Status { message, .. } => assert_eq!(message, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_after_consumer_drop_is_noop() {
        let (sink, rx) = EventSink::channel();
        drop(rx);

        assert!(!sink.is_closed());
        sink.publish(SearchEvent::status("lost"));
        assert!(sink.is_closed());

        // Still a no-op, still no panic.
        sink.publish(SearchEvent::complete(
            0,
            PoolStats {
                browsers: 0,
                available_pages: 0,
                busy_pages: 0,
                queued_requests: 0,
            },
        ));
    }

    #[test]
    fn test_disconnected_sink() {
        let sink = EventSink::disconnected();
        assert!(sink.is_closed());
        sink.publish(SearchEvent::status("nobody listening"));
    }
}
