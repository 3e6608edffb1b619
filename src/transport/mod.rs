use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::core::{TelemetryError, WebSocketBufferConfig, WsFrame};

pub mod tungstenite;

/// Boxed future returned by [`WsTransport::connect`].
pub type WsTransportConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), TelemetryError>> + Send>>;

/// Transport boundary for websocket IO.
///
/// The session actor owns state and policy; the transport only opens a socket and hands back
/// its split halves, so tests can substitute an in-memory transport.
pub trait WsTransport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<WsFrame, TelemetryError>> + Send + Unpin + 'static;
    type Writer: Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin + 'static;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer>;
}
