pub mod frame;
pub mod geo;
pub mod heartbeat;
pub mod message;
pub mod queue;
pub mod reconnect;
pub mod telemetry;
pub mod throttle;
pub mod types;

pub use frame::*;
pub use geo::*;
pub use heartbeat::*;
pub use message::*;
pub use queue::*;
pub use reconnect::*;
pub use telemetry::*;
pub use throttle::*;
pub use types::*;
