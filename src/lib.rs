//! Real-time vehicle telemetry over a resilient kameo-managed websocket session.
//!
//! A [`TelemetryClient`] owns one session per device: it reports position and occupancy to the
//! tracking server at a throttled cadence, keeps an application heartbeat, queues traffic while
//! the socket is down and reconnects with bounded exponential backoff.

pub mod client;
pub mod config;
pub mod core;
pub mod session;
pub mod testing;
pub mod transport;

pub use client::{CollaboratorFuture, CredentialProvider, SessionStore, TelemetryClient};
pub use config::TelemetryConfig;
pub use crate::core::{
    BoardingAction, ConnectionState, CoordinateOrder, InboundFrame, InboundKind, LocationSample,
    OutboundMessage, RouteContext, TelemetryError, TelemetryResult, TelemetryStatus,
};
pub use transport::tungstenite::TungsteniteTransport;
