//! C8 — Progress Stream: one bounded FIFO per active session, drained by a
//! long-lived `text/event-stream` HTTP response. The queue itself is a
//! plain `VecDeque` behind a mutex plus a `Notify` (rather than a
//! `tokio::mpsc` channel) because `mpsc` has no drop-oldest overflow
//! policy — §4.6 requires evicting the oldest buffered message instead of
//! blocking the optimizer's publisher, which a bounded channel can't do.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Bytes;
use futures::Stream;
use tokio::sync::{Mutex, Notify};

/// Queue capacity (§4.6). Overflow drops the oldest message in favor of
/// the newest — progress is more valuable than history once a session is
/// mid-run.
const QUEUE_CAPACITY: usize = 100;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Progress { payload: serde_json::Value },
    Complete { payload: serde_json::Value },
    Error { payload: serde_json::Value },
}

impl ProgressEvent {
    fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    fn payload(&self) -> &serde_json::Value {
        match self {
            ProgressEvent::Progress { payload } | ProgressEvent::Complete { payload } | ProgressEvent::Error { payload } => payload,
        }
    }

    /// Encodes as the two-line SSE frame (§4.6): `event: <name>\n` then
    /// `data: <json>\n\n`.
    fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.payload())
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

struct Inner {
    events: Mutex<VecDeque<ProgressEvent>>,
    notify: Notify,
}

/// Publishing half, held by the background optimization worker.
#[derive(Clone)]
pub struct ProgressPublisher {
    inner: Arc<Inner>,
}

/// Receiving half, held by the session registry and handed to the HTTP
/// stream handler when a client connects.
pub struct ProgressQueue {
    inner: Arc<Inner>,
}

/// Creates a paired publisher/queue with drop-oldest overflow semantics.
pub fn channel() -> (ProgressPublisher, ProgressQueue) {
    let inner = Arc::new(Inner {
        events: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
        notify: Notify::new(),
    });
    (ProgressPublisher { inner: inner.clone() }, ProgressQueue { inner })
}

impl ProgressPublisher {
    pub async fn publish(&self, event: ProgressEvent) {
        let mut events = self.inner.events.lock().await;
        if events.len() >= QUEUE_CAPACITY {
            events.pop_front();
        }
        events.push_back(event);
        drop(events);
        self.inner.notify.notify_waiters();
    }
}

impl ProgressQueue {
    /// Drains one event, blocking up to [`KEEPALIVE_INTERVAL`]; returns
    /// `None` on timeout so the caller can emit a keepalive comment.
    async fn next_or_keepalive(&mut self) -> Option<ProgressEvent> {
        loop {
            if let Some(event) = self.inner.events.lock().await.pop_front() {
                return Some(event);
            }
            let notified = self.inner.notify.notified();
            match tokio::time::timeout(KEEPALIVE_INTERVAL, notified).await {
                Ok(()) => continue, // something was published; loop to pop it
                Err(_) => return None,
            }
        }
    }
}

enum StreamState {
    Active(ProgressQueue),
    Done,
}

/// Adapts a [`ProgressQueue`] into an `actix_web`-compatible byte stream:
/// SSE frames for real events, `: keepalive\n\n` comment lines on
/// timeout, and stream termination right after a `complete`/`error` frame.
pub fn into_sse_stream(queue: ProgressQueue) -> impl Stream<Item = Result<Bytes, io::Error>> {
    futures::stream::unfold(StreamState::Active(queue), |state| async move {
        let StreamState::Active(mut queue) = state else {
            return None;
        };
        match queue.next_or_keepalive().await {
            Some(event) => {
                let frame = Bytes::from(event.to_sse_frame());
                let next = if event.is_terminal() { StreamState::Done } else { StreamState::Active(queue) };
                Some((Ok(frame), next))
            }
            None => Some((Ok(Bytes::from_static(b": keepalive\n\n")), StreamState::Active(queue))),
        }
    })
}
