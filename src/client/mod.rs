//! Upstream streaming service capability.
//!
//! The gateway only needs three calls from the upstream service: enumerate
//! streams, resolve a stream name into delivery endpoints, and pull the
//! current rows behind an access handle. [`flight::FlightStreamClient`]
//! implements them over Arrow Flight; tests substitute their own.

pub mod flight;

use crate::error::Result;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

pub use flight::FlightStreamClient;

/// Opaque, revocable token that grants access to one stream's data.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessHandle(Bytes);

impl AccessHandle {
    pub fn new(token: impl Into<Bytes>) -> Self {
        Self(token.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

}

impl fmt::Debug for AccessHandle {
    // Handles are credentials; only their size is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessHandle({} bytes)", self.0.len())
    }
}

/// One delivery endpoint returned by a metadata lookup.
///
/// Data is always fetched from the configured server, so only the handle is
/// kept.
#[derive(Debug, Clone, Default)]
pub struct StreamEndpoint {
    /// Handle to present when fetching; endpoints may omit it
    pub handle: Option<AccessHandle>,
}

impl StreamEndpoint {
    pub fn with_handle(handle: AccessHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

/// Ordered rows retrieved by one fetch.
///
/// A batch may hold zero rows; that is a valid answer meaning "nothing new".
#[derive(Debug, Clone)]
pub struct RowBatch {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl RowBatch {
    /// Build from record batches sharing `schema`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// Build from a non-empty list of record batches, taking the schema of the first.
    pub fn from_batches(batches: Vec<RecordBatch>) -> Option<Self> {
        let schema = batches.first()?.schema();
        Some(Self { schema, batches })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }
}

/// Calls the gateway makes against the upstream streaming service.
#[async_trait]
pub trait StreamingClient: Send + Sync + 'static {
    /// Names of the streams currently available upstream.
    async fn list_streams(&self) -> Result<Vec<String>>;

    /// Resolve a stream name to its delivery endpoints.
    async fn get_metadata(&self, stream: &str) -> Result<Vec<StreamEndpoint>>;

    /// Pull the rows currently reachable through `handle`.
    ///
    /// `Ok(None)` is a degenerate answer: the service produced no record
    /// batches at all, not even an empty one.
    async fn fetch(&self, handle: &AccessHandle) -> Result<Option<RowBatch>>;
}
