//! Gateway facade
//!
//! One [`Gateway`] per configured upstream. It owns the client, the handle
//! cache and the poller, and exposes the operations a host calls: list
//! streams, subscribe, run, reject publishes, health check and query.
//!
//! The gateway also owns a shutdown token. Every running subscription
//! observes it, so [`Gateway::dispose`] stops all loops before the cache is
//! dropped.

pub mod health;
pub mod query;

use crate::cache::HandleCache;
use crate::client::{FlightStreamClient, StreamingClient};
use crate::config::{GatewaySettings, InstanceSettings};
use crate::error::Result;
use crate::poller::{
    FrameSink, Observers, PollMetrics, PollMetricsSnapshot, PollObserver, Poller, PollerConfig,
    Termination, TracingObserver,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use health::{HealthCheckResult, HealthStatus};
pub use query::{DataQuery, DataResponse, QueryDataRequest, QueryDataResponse, TimeRange};

/// Outcome of a subscribe request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeStatus {
    Ok,
    NotFound,
}

/// Outcome of a publish request. Streams are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    PermissionDenied,
}

/// Streaming gateway for one upstream service
pub struct Gateway<C = FlightStreamClient> {
    settings: GatewaySettings,
    cache: Arc<HandleCache<C>>,
    poller: Poller<C>,
    metrics: Arc<PollMetrics>,
    shutdown: CancellationToken,
}

impl Gateway<FlightStreamClient> {
    /// Connect to the configured Flight server.
    ///
    /// Fails when the server cannot be reached; no half-built gateway is
    /// returned.
    pub async fn connect(settings: GatewaySettings) -> Result<Self> {
        info!(server_url = %settings.server_url, "Trying to connect to Flight server");
        let client = FlightStreamClient::connect_with_tls(&settings.server_url, &settings.tls).await?;
        Ok(Self::with_client(Arc::new(client), settings))
    }

    /// Build from host instance settings (JSON blob plus secrets)
    pub async fn from_instance(instance: &InstanceSettings) -> Result<Self> {
        let settings = GatewaySettings::from_instance(instance)?;
        Self::connect(settings).await
    }
}

impl<C: StreamingClient> Gateway<C> {
    pub fn with_client(client: Arc<C>, settings: GatewaySettings) -> Self {
        Self::with_observer(client, settings, Arc::new(TracingObserver))
    }

    /// Like [`Gateway::with_client`], reporting poll events to `observer`
    /// in addition to the built-in counters
    pub fn with_observer(client: Arc<C>, settings: GatewaySettings, observer: Arc<dyn PollObserver>) -> Self {
        let metrics = Arc::new(PollMetrics::default());
        let observers = Observers::new().with(metrics.clone()).with(observer);

        let cache = Arc::new(HandleCache::new(client));
        let poller = Poller::new(cache.clone(), PollerConfig::from(&settings.poll), Arc::new(observers));

        Self {
            settings,
            cache,
            poller,
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<HandleCache<C>> {
        &self.cache
    }

    pub fn metrics(&self) -> PollMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Names of the streams available upstream
    pub async fn list_streams(&self) -> Result<Vec<String>> {
        self.cache.client()?.list_streams().await
    }

    /// Check that `stream` resolves to an access handle
    pub async fn subscribe(&self, stream: &str) -> SubscribeStatus {
        info!(stream = %stream, "Subscribe stream");
        match self.poller.subscribe(stream).await {
            Ok(()) => SubscribeStatus::Ok,
            Err(_) => SubscribeStatus::NotFound,
        }
    }

    /// Publishing into a stream is never allowed
    pub fn publish(&self, stream: &str, _payload: &[u8]) -> PublishStatus {
        info!(stream = %stream, "Publish stream rejected");
        PublishStatus::PermissionDenied
    }

    /// Poll `stream` into `sink` until `cancel` fires, the gateway is
    /// disposed, or the sink refuses a frame.
    pub async fn run<S>(&self, stream: &str, cancel: &CancellationToken, sink: &mut S) -> Result<Termination>
    where
        S: FrameSink + ?Sized,
    {
        info!(stream = %stream, "Run stream");

        let linked = self.shutdown.child_token();
        let relay = async {
            cancel.cancelled().await;
            linked.cancel();
            std::future::pending::<Result<Termination>>().await
        };

        let result = tokio::select! {
            result = self.poller.run(stream, &linked, sink) => result,
            result = relay => result,
        };

        match result {
            Ok(Termination::Cancelled) if !cancel.is_cancelled() => Ok(Termination::Shutdown),
            Err(e) => {
                warn!(stream = %stream, error = %e, "Stream terminated");
                Err(e)
            }
            other => other,
        }
    }

    /// Run a subscription as its own task
    pub fn spawn<S>(self: &Arc<Self>, stream: impl Into<String>, mut sink: S) -> SubscriptionHandle
    where
        S: FrameSink + 'static,
    {
        let stream = stream.into();
        let token = CancellationToken::new();

        let gateway = Arc::clone(self);
        let task_stream = stream.clone();
        let task_token = token.clone();
        let join = tokio::spawn(async move { gateway.run(&task_stream, &task_token, &mut sink).await });

        SubscriptionHandle { stream, token, join }
    }

    /// Health of this instance's configuration
    pub fn check_health(&self) -> HealthCheckResult {
        health::check_settings_health(&self.settings)
    }

    /// Answer a batch of independent queries, one response per ref id
    pub fn query_data(&self, request: &QueryDataRequest) -> QueryDataResponse {
        query::query_data(request)
    }

    /// Stop every running subscription, forget all cached handles and drop
    /// the upstream client.
    ///
    /// Afterwards every subscribe is rejected and listing fails, without
    /// reaching the upstream service.
    pub fn dispose(&self) {
        info!(server_url = %self.settings.server_url, "Disposing gateway");
        self.shutdown.cancel();
        if self.cache.release().is_some() {
            debug!(server_url = %self.settings.server_url, "Released upstream client");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// A subscription running on its own task
pub struct SubscriptionHandle {
    stream: String,
    token: CancellationToken,
    join: JoinHandle<Result<Termination>>,
}

impl SubscriptionHandle {
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Token that stops this subscription when cancelled
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the loop to end
    pub async fn join(self) -> std::result::Result<Result<Termination>, JoinError> {
        self.join.await
    }
}
