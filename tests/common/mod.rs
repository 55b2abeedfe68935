//! Shared fixtures: a scripted in-process client, recording observers and
//! sinks, and a fake Arrow Flight server for the network tests.

#![allow(dead_code)]

use arrow_array::{Int64Array, RecordBatch};
use arrow_flight::{
    encode::FlightDataEncoderBuilder,
    error::FlightError,
    flight_service_server::{FlightService, FlightServiceServer},
    Action, ActionType, Criteria, Empty, FlightData, FlightDescriptor, FlightEndpoint, FlightInfo,
    HandshakeRequest, HandshakeResponse, PollInfo, PutResult, SchemaResult, Ticket,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use orcastream_core::{
    client::{AccessHandle, RowBatch, StreamEndpoint, StreamingClient},
    error::{Error, Result},
    frame::Frame,
    poller::{FrameSink, PollEvent, PollObserver},
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};

pub fn value_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("value", DataType::Int64, false)]))
}

pub fn int_batch(values: Vec<i64>) -> RecordBatch {
    RecordBatch::try_new(value_schema(), vec![Arc::new(Int64Array::from(values))]).unwrap()
}

/// Column `value` of a forwarded frame
pub fn frame_values(frame: &Frame) -> Vec<i64> {
    frame
        .batch()
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap()
        .values()
        .to_vec()
}

/// What the next fetch returns
#[derive(Debug, Clone)]
pub enum FetchStep {
    Rows(Vec<i64>),
    Empty,
    Nothing,
    Fail(String),
}

/// Scripted upstream.
///
/// Known streams resolve to a fresh handle `"<stream>#<n>"` on every
/// metadata call, so a re-resolution is visible in `fetched_handles`. Once
/// the script runs out every fetch returns an empty batch.
#[derive(Default)]
pub struct StubClient {
    streams: Vec<String>,
    list_error: Option<String>,
    metadata_delay: Option<Duration>,
    script: Mutex<VecDeque<FetchStep>>,
    metadata_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetched_handles: Mutex<Vec<Bytes>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream: &str) -> Self {
        self.streams.push(stream.to_string());
        self
    }

    pub fn with_script(self, steps: impl IntoIterator<Item = FetchStep>) -> Self {
        self.script.lock().extend(steps);
        self
    }

    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = Some(delay);
        self
    }

    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetched_handles(&self) -> Vec<String> {
        self.fetched_handles
            .lock()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }
}

#[async_trait]
impl StreamingClient for StubClient {
    async fn list_streams(&self) -> Result<Vec<String>> {
        match &self.list_error {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(self.streams.clone()),
        }
    }

    async fn get_metadata(&self, stream: &str) -> Result<Vec<StreamEndpoint>> {
        let call = self.metadata_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.metadata_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.streams.iter().any(|s| s == stream) {
            return Ok(Vec::new());
        }
        Ok(vec![
            StreamEndpoint::default(),
            StreamEndpoint::with_handle(AccessHandle::new(format!("{}#{}", stream, call))),
        ])
    }

    async fn fetch(&self, handle: &AccessHandle) -> Result<Option<RowBatch>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_handles.lock().push(handle.as_bytes().clone());

        let step = self.script.lock().pop_front().unwrap_or(FetchStep::Empty);
        match step {
            FetchStep::Rows(values) => Ok(RowBatch::from_batches(vec![int_batch(values)])),
            FetchStep::Empty => Ok(Some(RowBatch::new(value_schema(), Vec::new()))),
            FetchStep::Nothing => Ok(None),
            FetchStep::Fail(message) => Err(Error::HandleInvalid(message)),
        }
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, PollEvent)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(String, PollEvent)> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&PollEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|(_, e)| pred(e)).count()
    }
}

impl PollObserver for RecordingObserver {
    fn on_event(&self, stream: &str, event: &PollEvent) {
        self.events.lock().push((stream.to_string(), event.clone()));
    }
}

/// Keeps every frame it is given
#[derive(Default, Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    pub fn values(&self) -> Vec<Vec<i64>> {
        self.frames.lock().iter().map(frame_values).collect()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        self.frames.lock().push(frame);
        Ok(())
    }
}

/// Refuses every frame
pub struct FailingSink;

#[async_trait]
impl FrameSink for FailingSink {
    async fn send_frame(&mut self, _frame: Frame) -> Result<()> {
        Err(Error::Forward("consumer went away".into()))
    }
}

/// One stream served by [`FakeFlightService`]
#[derive(Clone)]
pub struct FakeStream {
    pub name: String,
    pub ticket: Bytes,
    pub batches: Vec<RecordBatch>,
}

#[derive(Clone, Default)]
pub struct FakeFlightService {
    streams: Vec<FakeStream>,
}

impl FakeFlightService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, name: &str, ticket: &'static [u8], batches: Vec<RecordBatch>) -> Self {
        self.streams.push(FakeStream {
            name: name.to_string(),
            ticket: Bytes::from_static(ticket),
            batches,
        });
        self
    }

    fn by_path(&self, descriptor: &FlightDescriptor) -> Option<&FakeStream> {
        let name = descriptor.path.join("/");
        self.streams.iter().find(|s| s.name == name)
    }

    fn info(stream: &FakeStream) -> FlightInfo {
        FlightInfo {
            flight_descriptor: Some(FlightDescriptor::new_path(vec![stream.name.clone()])),
            endpoint: vec![FlightEndpoint {
                ticket: Some(Ticket {
                    ticket: stream.ticket.clone(),
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

type BoxedStream<T> = Pin<Box<dyn Stream<Item = std::result::Result<T, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl FlightService for FakeFlightService {
    type HandshakeStream = BoxedStream<HandshakeResponse>;
    type ListFlightsStream = BoxedStream<FlightInfo>;
    type DoGetStream = BoxedStream<FlightData>;
    type DoPutStream = BoxedStream<PutResult>;
    type DoExchangeStream = BoxedStream<FlightData>;
    type DoActionStream = BoxedStream<arrow_flight::Result>;
    type ListActionsStream = BoxedStream<ActionType>;

    async fn handshake(
        &self,
        _request: Request<tonic::Streaming<HandshakeRequest>>,
    ) -> std::result::Result<Response<Self::HandshakeStream>, Status> {
        Err(Status::unimplemented("handshake"))
    }

    async fn list_flights(
        &self,
        _request: Request<Criteria>,
    ) -> std::result::Result<Response<Self::ListFlightsStream>, Status> {
        let infos: Vec<std::result::Result<FlightInfo, Status>> = self.streams.iter().map(|s| Ok(Self::info(s))).collect();
        Ok(Response::new(Box::pin(stream::iter(infos))))
    }

    async fn get_flight_info(
        &self,
        request: Request<FlightDescriptor>,
    ) -> std::result::Result<Response<FlightInfo>, Status> {
        let descriptor = request.into_inner();
        match self.by_path(&descriptor) {
            Some(stream) => Ok(Response::new(Self::info(stream))),
            None => Err(Status::not_found(format!("unknown stream {:?}", descriptor.path))),
        }
    }

    async fn poll_flight_info(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> std::result::Result<Response<PollInfo>, Status> {
        Err(Status::unimplemented("poll_flight_info"))
    }

    async fn get_schema(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> std::result::Result<Response<SchemaResult>, Status> {
        Err(Status::unimplemented("get_schema"))
    }

    async fn do_get(
        &self,
        request: Request<Ticket>,
    ) -> std::result::Result<Response<Self::DoGetStream>, Status> {
        let ticket = request.into_inner().ticket;
        let stream = self
            .streams
            .iter()
            .find(|s| s.ticket == ticket)
            .ok_or_else(|| Status::permission_denied("ticket expired"))?;

        let batches: Vec<std::result::Result<RecordBatch, FlightError>> =
            stream.batches.iter().cloned().map(Ok).collect();
        let encoded = FlightDataEncoderBuilder::new()
            .with_schema(value_schema())
            .build(stream::iter(batches))
            .map_err(Status::from);
        Ok(Response::new(Box::pin(encoded)))
    }

    async fn do_put(
        &self,
        _request: Request<tonic::Streaming<FlightData>>,
    ) -> std::result::Result<Response<Self::DoPutStream>, Status> {
        Err(Status::unimplemented("do_put"))
    }

    async fn do_exchange(
        &self,
        _request: Request<tonic::Streaming<FlightData>>,
    ) -> std::result::Result<Response<Self::DoExchangeStream>, Status> {
        Err(Status::unimplemented("do_exchange"))
    }

    async fn do_action(
        &self,
        _request: Request<Action>,
    ) -> std::result::Result<Response<Self::DoActionStream>, Status> {
        Err(Status::unimplemented("do_action"))
    }

    async fn list_actions(
        &self,
        _request: Request<Empty>,
    ) -> std::result::Result<Response<Self::ListActionsStream>, Status> {
        Ok(Response::new(Box::pin(stream::empty::<std::result::Result<ActionType, Status>>())))
    }
}

pub struct TestServer {
    pub handle: tokio::task::JoinHandle<()>,
    pub addr: SocketAddr,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn start_flight_server(service: FakeFlightService) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        if let Err(e) = Server::builder()
            .add_service(FlightServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
        {
            eprintln!("Test server failed: {}", e);
        }
    });

    TestServer { handle, addr }
}

/// Next item of `s`
pub async fn first<S: Stream + Unpin>(mut s: S) -> Option<S::Item> {
    s.next().await
}
