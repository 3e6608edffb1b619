use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::{
    Connector, connect_async_tls_with_config, connect_async_with_config,
    tungstenite::{
        Message, Utf8Bytes,
        protocol::{CloseFrame, WebSocketConfig},
    },
};

use crate::core::{TelemetryError, WebSocketBufferConfig, WsCloseFrame, WsFrame};
use crate::transport::{WsTransport, WsTransportConnectFuture};

/// Read half of a tungstenite socket, already mapped to [`WsFrame`].
pub type TungsteniteReader = Box<dyn Stream<Item = Result<WsFrame, TelemetryError>> + Send + Unpin>;

/// Write half of a tungstenite socket accepting [`WsFrame`].
pub type TungsteniteWriter = Box<dyn Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin>;

fn ensure_crypto_provider() {
    static PROVIDER: OnceLock<()> = OnceLock::new();
    PROVIDER.get_or_init(|| {
        // Err means the host already installed one.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn transport_error(
    context: &'static str,
) -> impl Fn(tokio_tungstenite::tungstenite::Error) -> TelemetryError {
    move |err| TelemetryError::Transport {
        context,
        error: err.to_string(),
    }
}

impl From<Message> for WsFrame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => WsFrame::Text(Bytes::from(text)),
            Message::Binary(payload) => WsFrame::Binary(payload),
            Message::Ping(payload) => WsFrame::Ping(payload),
            Message::Pong(payload) => WsFrame::Pong(payload),
            Message::Close(close) => WsFrame::Close(close.map(|c| WsCloseFrame {
                code: c.code.into(),
                reason: Bytes::from(c.reason),
            })),
            // Raw frames never surface from a read.
            Message::Frame(_) => WsFrame::Binary(Bytes::new()),
        }
    }
}

impl From<WsFrame> for Message {
    fn from(frame: WsFrame) -> Self {
        match frame {
            WsFrame::Text(payload) => Utf8Bytes::try_from(payload.clone())
                .map(Message::Text)
                .unwrap_or(Message::Binary(payload)),
            WsFrame::Binary(payload) => Message::Binary(payload),
            WsFrame::Ping(payload) => Message::Ping(payload),
            WsFrame::Pong(payload) => Message::Pong(payload),
            WsFrame::Close(close) => Message::Close(close.map(|c| CloseFrame {
                code: c.code.into(),
                reason: Utf8Bytes::try_from(c.reason)
                    .unwrap_or_else(|_| Utf8Bytes::from_static("")),
            })),
        }
    }
}

impl From<WebSocketBufferConfig> for WebSocketConfig {
    fn from(buffers: WebSocketBufferConfig) -> Self {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(buffers.max_message_bytes);
        config.max_frame_size = Some(buffers.max_frame_bytes);
        config.write_buffer_size = buffers.write_buffer_bytes;
        config.max_write_buffer_size = buffers.max_write_buffer_bytes;
        config
    }
}

/// Production transport over tokio-tungstenite.
///
/// `wss://` uses rustls with webpki roots unless a client config is supplied through
/// [`TungsteniteTransport::rustls`].
#[derive(Clone, Default)]
pub struct TungsteniteTransport {
    connector: Option<Connector>,
}

impl TungsteniteTransport {
    pub fn rustls(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            connector: Some(Connector::Rustls(config)),
        }
    }
}

impl WsTransport for TungsteniteTransport {
    type Reader = TungsteniteReader;
    type Writer = TungsteniteWriter;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let connector = self.connector.clone();
        Box::pin(async move {
            ensure_crypto_provider();
            let config = Some(WebSocketConfig::from(buffers));

            let opened = match connector {
                Some(connector) => {
                    connect_async_tls_with_config(url, config, false, Some(connector)).await
                }
                None => connect_async_with_config(url, config, false).await,
            };
            let (socket, _response) =
                opened.map_err(|e| TelemetryError::Connection(e.to_string()))?;

            let (sink, stream) = socket.split();
            let reader =
                stream.map(|item| item.map(WsFrame::from).map_err(transport_error("read")));
            let writer = sink.sink_map_err(transport_error("write")).with(|frame: WsFrame| {
                future::ready(Ok::<_, TelemetryError>(Message::from(frame)))
            });

            Ok((
                Box::new(reader) as TungsteniteReader,
                Box::new(writer) as TungsteniteWriter,
            ))
        })
    }
}
