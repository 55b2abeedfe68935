//! Stream name to access handle cache
//!
//! Handles are resolved lazily through a metadata lookup and dropped as soon
//! as a consumer of the handle sees a failed fetch. There is no expiry: an
//! entry is trusted until proven stale.
//!
//! The lock only guards map reads and writes, never the upstream round trip,
//! so lookups for different streams proceed in parallel. Two concurrent
//! misses on the same stream may both resolve; the last insert wins.
//!
//! Releasing the cache hands back the client and empties the map. Every
//! later lookup fails without going upstream.

use crate::client::{AccessHandle, StreamingClient};
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Process-local map of stream name to its last known good access handle
pub struct HandleCache<C> {
    client: RwLock<Option<Arc<C>>>,
    handles: Mutex<HashMap<String, AccessHandle>>,
}

impl<C: StreamingClient> HandleCache<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The client used for lookups, until the cache is released
    pub fn client(&self) -> Result<Arc<C>> {
        self.client.read().clone().ok_or_else(released)
    }

    /// Drop every handle and give up the client.
    ///
    /// Returns the client if this call released it.
    pub fn release(&self) -> Option<Arc<C>> {
        let mut slot = self.client.write();
        let client = slot.take();
        self.handles.lock().clear();
        client
    }

    pub fn is_released(&self) -> bool {
        self.client.read().is_none()
    }

    /// Return the cached handle for `stream`, resolving it upstream on a miss.
    ///
    /// The handle comes from the first endpoint that carries one. Fails with
    /// [`Error::NotFound`] when no endpoint does; client failures propagate
    /// unchanged.
    pub async fn resolve(&self, stream: &str) -> Result<AccessHandle> {
        if let Some(handle) = self.handles.lock().get(stream).cloned() {
            debug!(stream = %stream, "Access handle found in cache");
            return Ok(handle);
        }

        let client = self.client()?;
        debug!(stream = %stream, "Access handle not in cache, fetching metadata");

        let endpoints = client.get_metadata(stream).await.map_err(|e| {
            warn!(stream = %stream, error = %e, "Metadata lookup failed");
            e
        })?;

        let handle = endpoints
            .into_iter()
            .find_map(|ep| ep.handle)
            .ok_or_else(|| {
                warn!(stream = %stream, "No endpoints found");
                Error::NotFound(format!("no endpoints found for stream {}", stream))
            })?;

        // A release during the lookup wins over the insert.
        let slot = self.client.read();
        if slot.is_none() {
            return Err(released());
        }
        self.handles.lock().insert(stream.to_string(), handle.clone());
        Ok(handle)
    }

    /// Drop the cached handle for `stream`. A no-op when nothing is cached.
    pub fn invalidate(&self, stream: &str) {
        if self.handles.lock().remove(stream).is_some() {
            debug!(stream = %stream, "Invalidated access handle");
        }
    }

    pub fn contains(&self, stream: &str) -> bool {
        self.handles.lock().contains_key(stream)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Forget every handle
    pub fn clear(&self) {
        self.handles.lock().clear();
    }
}

fn released() -> Error {
    Error::Transport("gateway disposed".into())
}
