//! The live telemetry session: connection manager actor, socket writer and owned tasks.

pub mod actor;
pub mod tasks;
pub mod writer;

pub use actor::{
    Connect, Disconnect, GetStatus, InboundHandler, TelemetryActor, TelemetryActorArgs,
    TelemetryCommand,
};
