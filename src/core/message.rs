//! Wire messages exchanged with the tracking server.

use serde::Serialize;
use sonic_rs::{JsonValueTrait, Value};

use super::geo::LocationSample;
use super::telemetry::{BoardingAction, RouteContext};
use super::types::{TelemetryError, TelemetryResult};

/// Axis order of coordinates in outbound frames.
///
/// Some backends store positions as `[lng, lat]` and expect the client to swap; this is a
/// contract point with the server, never a hard-coded workaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinateOrder {
    #[default]
    LatLng,
    LngLat,
}

impl CoordinateOrder {
    #[inline]
    fn arrange(self, latitude: f64, longitude: f64) -> (f64, f64) {
        match self {
            CoordinateOrder::LatLng => (latitude, longitude),
            CoordinateOrder::LngLat => (longitude, latitude),
        }
    }
}

/// Messages the client originates. Route identifiers are not part of the payload; they are
/// attached by [`encode_frame`] at transmit time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(rename = "location_update", rename_all = "camelCase")]
    LocationUpdate {
        latitude: f64,
        longitude: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
        timestamp: u64,
        occupied_seats: u32,
    },
    #[serde(rename = "bus_status_update", rename_all = "camelCase")]
    BusStatusUpdate { status: String, occupied_seats: u32 },
    #[serde(rename = "passengerBoarding", rename_all = "camelCase")]
    PassengerBoarding {
        action: BoardingAction,
        count: u32,
        occupied_seats: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_id: Option<String>,
    },
    #[serde(rename = "emergency", rename_all = "camelCase")]
    Emergency {
        description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        latitude: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        longitude: Option<f64>,
    },
}

impl OutboundMessage {
    pub fn location(sample: &LocationSample, occupied_seats: u32) -> Self {
        OutboundMessage::LocationUpdate {
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: sample.speed,
            accuracy: sample.accuracy,
            timestamp: sample.timestamp,
            occupied_seats,
        }
    }

    pub fn emergency(description: impl Into<String>, at: Option<&LocationSample>) -> Self {
        OutboundMessage::Emergency {
            description: description.into(),
            latitude: at.map(|s| s.latitude),
            longitude: at.map(|s| s.longitude),
        }
    }

    /// Wire `type` value.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Heartbeat => "heartbeat",
            OutboundMessage::LocationUpdate { .. } => "location_update",
            OutboundMessage::BusStatusUpdate { .. } => "bus_status_update",
            OutboundMessage::PassengerBoarding { .. } => "passengerBoarding",
            OutboundMessage::Emergency { .. } => "emergency",
        }
    }

    /// Emergency traffic jumps the pending queue.
    pub fn is_emergency(&self) -> bool {
        matches!(self, OutboundMessage::Emergency { .. })
    }

    fn arranged(&self, order: CoordinateOrder) -> Self {
        let mut out = self.clone();
        match &mut out {
            OutboundMessage::LocationUpdate {
                latitude,
                longitude,
                ..
            } => {
                (*latitude, *longitude) = order.arrange(*latitude, *longitude);
            }
            OutboundMessage::Emergency {
                latitude: Some(lat),
                longitude: Some(lon),
                ..
            } => {
                (*lat, *lon) = order.arrange(*lat, *lon);
            }
            _ => {}
        }
        out
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    #[serde(flatten)]
    message: &'a OutboundMessage,
    vehicle_id: &'a str,
    organization_id: &'a str,
    operation_id: &'a str,
    client_timestamp: u64,
}

/// Serialize `message` tagged with `route` and the transmit time.
pub fn encode_frame(
    message: &OutboundMessage,
    route: &RouteContext,
    order: CoordinateOrder,
    client_timestamp: u64,
) -> TelemetryResult<String> {
    let arranged = message.arranged(order);
    let envelope = Envelope {
        message: &arranged,
        vehicle_id: &route.vehicle_id,
        organization_id: &route.organization_id,
        operation_id: &route.operation_id,
        client_timestamp,
    };
    sonic_rs::to_string(&envelope).map_err(|e| TelemetryError::Parse(e.to_string()))
}

/// Inbound message kinds understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    ConnectionEstablished,
    HeartbeatResponse,
    Success,
    Error,
    BusUpdate,
    Boarding,
}

impl InboundKind {
    pub const ALL: [InboundKind; 6] = [
        InboundKind::ConnectionEstablished,
        InboundKind::HeartbeatResponse,
        InboundKind::Success,
        InboundKind::Error,
        InboundKind::BusUpdate,
        InboundKind::Boarding,
    ];

    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "connection_established" => Some(InboundKind::ConnectionEstablished),
            "heartbeat_response" => Some(InboundKind::HeartbeatResponse),
            "success" => Some(InboundKind::Success),
            "error" => Some(InboundKind::Error),
            "busUpdate" => Some(InboundKind::BusUpdate),
            "boarding" => Some(InboundKind::Boarding),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InboundKind::ConnectionEstablished => "connection_established",
            InboundKind::HeartbeatResponse => "heartbeat_response",
            InboundKind::Success => "success",
            InboundKind::Error => "error",
            InboundKind::BusUpdate => "busUpdate",
            InboundKind::Boarding => "boarding",
        }
    }
}

/// A decoded server frame: its kind plus the full JSON document.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub kind: InboundKind,
    pub payload: Value,
}

impl InboundFrame {
    /// Human-readable `message` field, present on `error`/`success` frames.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(|v| v.as_str())
    }
}

/// Result of decoding a text frame in the IO loop.
#[derive(Debug)]
pub enum InboundDecode {
    Frame(InboundFrame),
    Unknown(String),
}

pub fn decode_inbound(bytes: &[u8]) -> TelemetryResult<InboundDecode> {
    let payload: Value =
        sonic_rs::from_slice(bytes).map_err(|e| TelemetryError::Parse(e.to_string()))?;
    let kind = payload
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| TelemetryError::Parse("frame without string `type`".to_string()))?;
    let Some(kind) = InboundKind::from_wire(kind) else {
        return Ok(InboundDecode::Unknown(kind.to_string()));
    };
    Ok(InboundDecode::Frame(InboundFrame { kind, payload }))
}
