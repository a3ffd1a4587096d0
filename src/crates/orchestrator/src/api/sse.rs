//! Per-task SSE event bus.
//!
//! Every task gets a channel with a bounded ring buffer of recent events.
//! Each published event is stamped with a per-task, strictly increasing
//! sequence number; slow consumers lose the oldest events, never the
//! newest. Reconnecting clients send their last seen sequence and get any
//! still-buffered events above it replayed before the live stream.

use axum::response::sse::Event;
use dashmap::DashMap;
use review_core::{EventSink, ReviewEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Ring buffer capacity per task.
const RING_CAPACITY: usize = 256;

/// Broadcast channel capacity; laggy subscribers fall back to re-fetching
/// state, which is exactly the documented reconnect contract.
const BROADCAST_CAPACITY: usize = 64;

/// One framed event ready for the wire.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub seq: u64,
    pub event: String,
    pub data: Value,
}

impl SseFrame {
    /// Convert to an axum SSE event: `event: <name>` + `data: <json>`,
    /// with the sequence number doubling as the SSE id.
    pub fn to_event(&self) -> Event {
        let event = Event::default()
            .event(self.event.clone())
            .id(self.seq.to_string());
        match event.json_data(&self.data) {
            Ok(event) => event,
            Err(_) => Event::default().event("error").data("serialization failure"),
        }
    }
}

struct TaskChannel {
    seq: AtomicU64,
    buffer: parking_lot::Mutex<VecDeque<SseFrame>>,
    tx: broadcast::Sender<SseFrame>,
}

impl TaskChannel {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            seq: AtomicU64::new(0),
            buffer: parking_lot::Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
            tx,
        }
    }

    fn publish(&self, event: &ReviewEvent) -> SseFrame {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut data = event.payload();
        if let Value::Object(map) = &mut data {
            map.insert("seq".to_string(), seq.into());
        }
        let frame = SseFrame {
            seq,
            event: event.event_type().to_string(),
            data,
        };

        let mut buffer = self.buffer.lock();
        if buffer.len() == RING_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(frame.clone());
        drop(buffer);

        // No subscribers is fine; the buffer holds the replayable tail.
        let _ = self.tx.send(frame.clone());
        frame
    }

    fn replay_after(&self, last_seq: u64) -> Vec<SseFrame> {
        self.buffer
            .lock()
            .iter()
            .filter(|f| f.seq > last_seq)
            .cloned()
            .collect()
    }
}

/// Process-wide bus: one channel per task.
#[derive(Default)]
pub struct EventBus {
    channels: DashMap<String, Arc<TaskChannel>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, task_id: &str) -> Arc<TaskChannel> {
        self.channels
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(TaskChannel::new()))
            .clone()
    }

    /// Publish an event, returning its stamped frame.
    pub fn publish(&self, event: &ReviewEvent) -> SseFrame {
        let frame = self.channel(event.task_id()).publish(event);
        trace!(task_id = event.task_id(), seq = frame.seq, event = %frame.event, "event published");
        frame
    }

    /// Subscribe to a task: buffered frames above `last_seq` plus a live
    /// receiver for everything after.
    pub fn subscribe(
        &self,
        task_id: &str,
        last_seq: Option<u64>,
    ) -> (Vec<SseFrame>, broadcast::Receiver<SseFrame>) {
        let channel = self.channel(task_id);
        let rx = channel.tx.subscribe();
        let replay = channel.replay_after(last_seq.unwrap_or(0));
        (replay, rx)
    }

    /// Drop a task's channel; subscribers see the stream end.
    pub fn remove(&self, task_id: &str) {
        self.channels.remove(task_id);
    }

    /// Highest sequence published for a task so far.
    pub fn last_seq(&self, task_id: &str) -> u64 {
        self.channels
            .get(task_id)
            .map(|c| c.seq.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: ReviewEvent) {
        self.publish(&event);
    }
}
