//! Arrow Flight client for the upstream streaming service
//!
//! Streams are Flight PATH descriptors, access handles are Flight tickets,
//! and a fetch is one `DoGet` drained into record batches.

use super::{AccessHandle, RowBatch, StreamEndpoint, StreamingClient};
use crate::config::TlsSettings;
use crate::error::{Error, Result};
use arrow_array::RecordBatch;
use arrow_flight::{
    decode::FlightRecordBatchStream, error::FlightError,
    flight_service_client::FlightServiceClient, Criteria, FlightDescriptor, Ticket,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::{debug, info};

/// Flight client bound to one upstream server
#[derive(Clone)]
pub struct FlightStreamClient {
    client: FlightServiceClient<Channel>,
}

impl FlightStreamClient {
    /// Connect to a Flight server over plaintext HTTP/2
    ///
    /// # Arguments
    ///
    /// * `addr` - Server address (e.g., "127.0.0.1:50051" or "https://server:50051")
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let client = FlightStreamClient::connect("127.0.0.1:50051").await?;
    /// let streams = client.list_streams().await?;
    /// ```
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_tls(addr, &TlsSettings::default()).await
    }

    /// Connect to a Flight server, enabling TLS when a CA certificate is configured
    pub async fn connect_with_tls(addr: &str, tls: &TlsSettings) -> Result<Self> {
        let tls_enabled = tls.ca_path.is_some();
        let uri = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else if tls_enabled {
            format!("https://{}", addr)
        } else {
            format!("http://{}", addr)
        };

        debug!(uri = %uri, tls = tls_enabled, "Connecting to Flight server");

        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(|e| Error::Config(format!("invalid server_url {:?}: {}", addr, e)))?;

        if let Some(ca_path) = &tls.ca_path {
            let ca = std::fs::read(ca_path)?;
            let mut tls_config = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));

            if let (Some(cert_path), Some(key_path)) = (&tls.cert_path, &tls.key_path) {
                let cert = std::fs::read(cert_path)?;
                let key = std::fs::read(key_path)?;
                tls_config = tls_config.identity(Identity::from_pem(cert, key));
            }

            endpoint = endpoint.tls_config(tls_config)?;
        }

        let channel = endpoint.connect().await?;
        info!(addr = %addr, "Connected to Flight server");

        Ok(Self::from_channel(channel))
    }

    /// Wrap an already established channel
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: FlightServiceClient::new(channel),
        }
    }

    // Channels multiplex, so every call works on its own cheap clone.
    fn client(&self) -> FlightServiceClient<Channel> {
        self.client.clone()
    }
}

#[async_trait]
impl StreamingClient for FlightStreamClient {
    async fn list_streams(&self) -> Result<Vec<String>> {
        let mut stream = self
            .client()
            .list_flights(Criteria::default())
            .await?
            .into_inner();

        let mut names = Vec::new();
        while let Some(info) = stream.message().await? {
            match info.flight_descriptor {
                Some(descriptor) => names.push(descriptor.path.join("/")),
                None => debug!("Skipping flight without descriptor"),
            }
        }

        debug!(count = names.len(), "Listed flights");
        Ok(names)
    }

    async fn get_metadata(&self, stream: &str) -> Result<Vec<StreamEndpoint>> {
        let descriptor = FlightDescriptor::new_path(vec![stream.to_string()]);
        let info = self.client().get_flight_info(descriptor).await?.into_inner();

        let endpoints = info
            .endpoint
            .into_iter()
            .map(|ep| StreamEndpoint {
                handle: ep.ticket.map(|t| AccessHandle::new(t.ticket)),
            })
            .collect::<Vec<_>>();

        debug!(stream = %stream, endpoints = endpoints.len(), "Fetched flight info");
        Ok(endpoints)
    }

    async fn fetch(&self, handle: &AccessHandle) -> Result<Option<RowBatch>> {
        let ticket = Ticket {
            ticket: handle.as_bytes().clone(),
        };

        let stream = self
            .client()
            .do_get(ticket)
            .await
            .map_err(|e| Error::HandleInvalid(e.message().to_string()))?
            .into_inner();

        let mut decoded = FlightRecordBatchStream::new_from_flight_data(stream.map_err(FlightError::from));
        let mut batches: Vec<RecordBatch> = Vec::new();
        while let Some(batch) = decoded
            .try_next()
            .await
            .map_err(|e| Error::HandleInvalid(e.to_string()))?
        {
            batches.push(batch);
        }

        debug!(batch_count = batches.len(), "DoGet complete");

        // A schema without batches is an empty answer; no schema at all is degenerate.
        match (RowBatch::from_batches(batches), decoded.schema()) {
            (Some(rows), _) => Ok(Some(rows)),
            (None, Some(schema)) => Ok(Some(RowBatch::new(schema.clone(), Vec::new()))),
            (None, None) => Ok(None),
        }
    }
}
