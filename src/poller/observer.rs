//! Observable poll loop events
//!
//! Every decision the poll loop takes, including swallowed fetch failures,
//! is reported to a [`PollObserver`]. The gateway wires a tracing logger and
//! atomic counters; tests plug in recorders.

use super::SubscriptionState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Something that happened to one subscription
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The subscription moved between lifecycle states
    Transition {
        from: SubscriptionState,
        to: SubscriptionState,
    },
    /// Subscribe-time validation failed
    Rejected { reason: String },
    /// A fetch returned rows
    Fetched { rows: usize },
    /// A fetch returned a batch without rows; nothing is forwarded
    EmptyBatch,
    /// A fetch failed or came back degenerate; the handle was invalidated
    FetchFailed { reason: String, retry_in: Duration },
    /// A frame reached the consumer sink
    Forwarded { rows: usize },
    /// The consumer sink refused a frame
    ForwardFailed { reason: String },
}

/// Receives poll loop events
pub trait PollObserver: Send + Sync {
    fn on_event(&self, stream: &str, event: &PollEvent);
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PollObserver for TracingObserver {
    fn on_event(&self, stream: &str, event: &PollEvent) {
        match event {
            PollEvent::Transition { from, to } => {
                info!(stream = %stream, from = ?from, to = ?to, "Subscription state changed")
            }
            PollEvent::Rejected { reason } => {
                info!(stream = %stream, reason = %reason, "Subscription rejected")
            }
            PollEvent::Fetched { rows } => debug!(stream = %stream, rows, "Fetched rows"),
            PollEvent::EmptyBatch => debug!(stream = %stream, "Fetched empty batch"),
            PollEvent::FetchFailed { reason, retry_in } => warn!(
                stream = %stream,
                reason = %reason,
                retry_in = ?retry_in,
                "Fetch failed, invalidated access handle"
            ),
            PollEvent::Forwarded { rows } => debug!(stream = %stream, rows, "Forwarded frame"),
            PollEvent::ForwardFailed { reason } => {
                error!(stream = %stream, reason = %reason, "Forwarding frame failed")
            }
        }
    }
}

/// Poll loop counters shared by all subscriptions of a gateway
#[derive(Debug, Default)]
pub struct PollMetrics {
    active_subscriptions: AtomicU64,
    rejected_subscriptions: AtomicU64,
    fetches: AtomicU64,
    empty_batches: AtomicU64,
    fetch_failures: AtomicU64,
    forwarded_frames: AtomicU64,
    forwarded_rows: AtomicU64,
    forward_failures: AtomicU64,
}

/// Point-in-time copy of [`PollMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollMetricsSnapshot {
    pub active_subscriptions: u64,
    pub rejected_subscriptions: u64,
    pub fetches: u64,
    pub empty_batches: u64,
    pub fetch_failures: u64,
    pub forwarded_frames: u64,
    pub forwarded_rows: u64,
    pub forward_failures: u64,
}

impl PollMetrics {
    pub fn snapshot(&self) -> PollMetricsSnapshot {
        PollMetricsSnapshot {
            active_subscriptions: self.active_subscriptions.load(Ordering::Relaxed),
            rejected_subscriptions: self.rejected_subscriptions.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            empty_batches: self.empty_batches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            forwarded_frames: self.forwarded_frames.load(Ordering::Relaxed),
            forwarded_rows: self.forwarded_rows.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
        }
    }
}

impl PollObserver for PollMetrics {
    fn on_event(&self, _stream: &str, event: &PollEvent) {
        match event {
            PollEvent::Transition { to: SubscriptionState::Running, .. } => {
                self.active_subscriptions.fetch_add(1, Ordering::Relaxed);
            }
            PollEvent::Transition {
                from: SubscriptionState::Running,
                to: SubscriptionState::Terminated,
            } => {
                self.active_subscriptions.fetch_sub(1, Ordering::Relaxed);
            }
            PollEvent::Transition { .. } => {}
            PollEvent::Rejected { .. } => {
                self.rejected_subscriptions.fetch_add(1, Ordering::Relaxed);
            }
            PollEvent::Fetched { .. } => {
                self.fetches.fetch_add(1, Ordering::Relaxed);
            }
            PollEvent::EmptyBatch => {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                self.empty_batches.fetch_add(1, Ordering::Relaxed);
            }
            PollEvent::FetchFailed { .. } => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
            }
            PollEvent::Forwarded { rows } => {
                self.forwarded_frames.fetch_add(1, Ordering::Relaxed);
                self.forwarded_rows.fetch_add(*rows as u64, Ordering::Relaxed);
            }
            PollEvent::ForwardFailed { .. } => {
                self.forward_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Fans every event out to several observers, in order
#[derive(Default, Clone)]
pub struct Observers(Vec<Arc<dyn PollObserver>>);

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.0.push(observer);
        self
    }
}

impl PollObserver for Observers {
    fn on_event(&self, stream: &str, event: &PollEvent) {
        for observer in &self.0 {
            observer.on_event(stream, event);
        }
    }
}
