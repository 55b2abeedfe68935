//! HTTP surface of the gateway
//!
//! - `GET /streams` lists upstream streams as `{"streams": [...]}`
//! - `GET /live/*stream` subscribes and streams frames as server-sent events
//! - `POST /live/*stream` is a publish attempt and always answers 403
//! - `GET /health`, `GET /metrics` and `POST /query` expose the remaining
//!   instance operations

use crate::client::StreamingClient;
use crate::error::Result;
use crate::gateway::{Gateway, QueryDataRequest, SubscribeStatus};
use crate::poller::ChannelSink;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

/// Frames buffered per live subscriber before the poll loop waits
pub const LIVE_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamsResponse {
    pub streams: Vec<String>,
}

/// Build the router for `gateway`
pub fn router<C: StreamingClient>(gateway: Arc<Gateway<C>>) -> Router {
    Router::new()
        .route("/streams", get(list_streams::<C>))
        .route("/live/*stream", get(live::<C>).post(publish::<C>))
        .route("/health", get(health::<C>))
        .route("/metrics", get(metrics::<C>))
        .route("/query", post(query::<C>))
        .with_state(gateway)
}

/// Serve `gateway` on `addr` until `shutdown` resolves.
///
/// On shutdown the gateway is disposed first so open live streams end and
/// the server can drain.
pub async fn serve<C, F>(gateway: Arc<Gateway<C>>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    C: StreamingClient,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Starting HTTP gateway");

    let disposer = gateway.clone();
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(async move {
            shutdown.await;
            disposer.dispose();
        })
        .await?;

    info!("HTTP gateway stopped");
    Ok(())
}

async fn list_streams<C: StreamingClient>(State(gateway): State<Arc<Gateway<C>>>) -> Response {
    match gateway.list_streams().await {
        Ok(streams) => Json(StreamsResponse { streams }).into_response(),
        Err(e) => {
            error!(error = %e, "Listing streams failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn live<C: StreamingClient>(
    State(gateway): State<Arc<Gateway<C>>>,
    Path(stream): Path<String>,
) -> Response {
    if gateway.subscribe(&stream).await == SubscribeStatus::NotFound {
        return (StatusCode::NOT_FOUND, format!("stream not found: {}", stream)).into_response();
    }

    let (sink, rx) = ChannelSink::channel(LIVE_BUFFER);
    let subscription = gateway.spawn(stream.clone(), sink);

    // Dropping the response body (client went away) cancels the loop.
    let guard = subscription.token().clone().drop_guard();
    debug!(stream = %stream, "Live subscription started");

    let events = ReceiverStream::new(rx).map(move |frame| {
        let _subscription = &guard;
        Event::default().event("frame").json_data(&frame)
    });

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

async fn publish<C: StreamingClient>(
    State(gateway): State<Arc<Gateway<C>>>,
    Path(stream): Path<String>,
    body: axum::body::Bytes,
) -> Response {
    let status = gateway.publish(&stream, &body);
    (StatusCode::FORBIDDEN, Json(serde_json::json!({ "status": status }))).into_response()
}

async fn health<C: StreamingClient>(State(gateway): State<Arc<Gateway<C>>>) -> Response {
    let result = gateway.check_health();
    let code = if result.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(result)).into_response()
}

async fn metrics<C: StreamingClient>(State(gateway): State<Arc<Gateway<C>>>) -> Response {
    Json(gateway.metrics()).into_response()
}

async fn query<C: StreamingClient>(
    State(gateway): State<Arc<Gateway<C>>>,
    Json(request): Json<QueryDataRequest>,
) -> Response {
    Json(gateway.query_data(&request)).into_response()
}
