//! Per-subscription poll loop
//!
//! The upstream service has no push primitive, so a live subscription is a
//! loop: resolve the handle through the cache, fetch, forward non-empty
//! frames, wait, repeat. Fetch failures never end a subscription; they
//! invalidate the cached handle and back off for a fixed interval. Only
//! cancellation or a sink that refuses a frame stop the loop.
//!
//! Every wait and every upstream call races the cancellation token, so a
//! cancelled subscription stops within one scheduler tick rather than after
//! the current interval.

pub mod observer;

use crate::cache::HandleCache;
use crate::client::{RowBatch, StreamingClient};
use crate::config::PollSettings;
use crate::error::{Error, Result};
use crate::frame::Frame;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use observer::{Observers, PollEvent, PollMetrics, PollMetricsSnapshot, PollObserver, TracingObserver};

/// Lifecycle of one subscription. There is no paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Validating,
    Running,
    Terminated,
}

/// Why a poll loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The subscription's own token fired
    Cancelled,
    /// The owning gateway was disposed
    Shutdown,
}

/// Poll loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Wait after a successful fetch
    pub poll_interval: Duration,
    /// Wait after a failed or degenerate fetch
    pub retry_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(1),
        }
    }
}

impl From<&PollSettings> for PollerConfig {
    fn from(settings: &PollSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            retry_interval: settings.retry_interval(),
        }
    }
}

/// Destination of forwarded frames
#[async_trait]
pub trait FrameSink: Send {
    /// Deliver one frame. An error ends the subscription.
    async fn send_frame(&mut self, frame: Frame) -> Result<()>;
}

/// Sink backed by a bounded channel; fails once the receiver is dropped
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }

    /// A sink and the receiving end, with room for `capacity` frames
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| Error::Forward("consumer disconnected".into()))
    }
}

/// Drives subscriptions against a shared handle cache
pub struct Poller<C> {
    cache: Arc<HandleCache<C>>,
    config: PollerConfig,
    observer: Arc<dyn PollObserver>,
}

impl<C: StreamingClient> Poller<C> {
    pub fn new(cache: Arc<HandleCache<C>>, config: PollerConfig, observer: Arc<dyn PollObserver>) -> Self {
        Self {
            cache,
            config,
            observer,
        }
    }

    /// Validate that `stream` resolves. On failure the subscription is
    /// terminated before any loop starts.
    pub async fn subscribe(&self, stream: &str) -> Result<()> {
        match self.cache.resolve(stream).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.emit(stream, PollEvent::Rejected { reason: e.to_string() });
                self.transition(stream, SubscriptionState::Validating, SubscriptionState::Terminated);
                Err(match e {
                    Error::NotFound(_) => e,
                    other => Error::NotFound(format!("{}: {}", stream, other)),
                })
            }
        }
    }

    /// Run the poll loop for `stream` until `cancel` fires or the sink fails.
    ///
    /// Returns [`Termination::Cancelled`] on cancellation and
    /// [`Error::Forward`] when the sink refuses a frame. Fetch failures are
    /// retried indefinitely.
    pub async fn run<S>(&self, stream: &str, cancel: &CancellationToken, sink: &mut S) -> Result<Termination>
    where
        S: FrameSink + ?Sized,
    {
        self.transition(stream, SubscriptionState::Validating, SubscriptionState::Running);

        let result = self.poll_loop(stream, cancel, sink).await;

        self.transition(stream, SubscriptionState::Running, SubscriptionState::Terminated);
        result
    }

    async fn poll_loop<S>(&self, stream: &str, cancel: &CancellationToken, sink: &mut S) -> Result<Termination>
    where
        S: FrameSink + ?Sized,
    {
        loop {
            if cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Termination::Cancelled),
                fetched = self.fetch(stream) => fetched,
            };

            let delay = match fetched {
                Ok(Some(rows)) if !rows.is_empty() => {
                    self.emit(stream, PollEvent::Fetched { rows: rows.num_rows() });
                    match Frame::from_row_batch(stream, &rows) {
                        Ok(frame) => {
                            let forwarded = frame.rows();
                            let sent = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return Ok(Termination::Cancelled),
                                sent = sink.send_frame(frame) => sent,
                            };
                            if let Err(e) = sent {
                                self.emit(stream, PollEvent::ForwardFailed { reason: e.to_string() });
                                return Err(match e {
                                    Error::Forward(_) => e,
                                    other => Error::Forward(other.to_string()),
                                });
                            }
                            self.emit(stream, PollEvent::Forwarded { rows: forwarded });
                            self.config.poll_interval
                        }
                        Err(e) => self.recover(stream, e.to_string()),
                    }
                }
                Ok(Some(_)) => {
                    self.emit(stream, PollEvent::EmptyBatch);
                    self.config.poll_interval
                }
                Ok(None) => self.recover(stream, "no data returned".to_string()),
                Err(e) => self.recover(stream, e.to_string()),
            };

            if !sleep_or_cancel(cancel, delay).await {
                return Ok(Termination::Cancelled);
            }
        }
    }

    // The handle is looked up on every cycle so an invalidation takes
    // effect on the next attempt.
    async fn fetch(&self, stream: &str) -> Result<Option<RowBatch>> {
        let handle = self.cache.resolve(stream).await?;
        self.cache.client()?.fetch(&handle).await
    }

    fn recover(&self, stream: &str, reason: String) -> Duration {
        self.cache.invalidate(stream);
        self.emit(
            stream,
            PollEvent::FetchFailed {
                reason,
                retry_in: self.config.retry_interval,
            },
        );
        self.config.retry_interval
    }

    fn transition(&self, stream: &str, from: SubscriptionState, to: SubscriptionState) {
        self.emit(stream, PollEvent::Transition { from, to });
    }

    fn emit(&self, stream: &str, event: PollEvent) {
        self.observer.on_event(stream, &event);
    }
}

/// Wait `delay` unless `cancel` fires first. Returns false when cancelled.
pub async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
