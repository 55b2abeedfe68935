//! Orcastream: live streaming over Arrow Flight.
//!
//! The upstream Flight service offers named streams but no way to push new
//! rows. This crate bridges that gap: each live subscription polls its stream
//! through a cached access handle and forwards every non-empty batch to the
//! subscriber as a [`frame::Frame`].

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod poller;
pub mod server;

// Re-export commonly used types
pub use cache::HandleCache;
pub use client::{AccessHandle, FlightStreamClient, RowBatch, StreamEndpoint, StreamingClient};
pub use config::{GatewaySettings, InstanceSettings};
pub use error::{Error, Result};
pub use frame::Frame;
pub use gateway::{Gateway, PublishStatus, SubscribeStatus, SubscriptionHandle};
pub use poller::{ChannelSink, FrameSink, PollerConfig, Termination};
