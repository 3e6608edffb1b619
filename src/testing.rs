//! Reusable test utilities for driving a telemetry session without a real socket.
//!
//! [`MockTransport::pair`] yields the transport handed to the client plus a [`MockServer`]
//! that accepts each connection attempt as a [`MockConnection`], refuses attempts on demand
//! and records the URLs the client dialled.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::task::AtomicWaker;
use futures_util::{Sink, Stream};
use sonic_rs::Value;
use tokio::sync::{Mutex, mpsc};

use crate::client::{CollaboratorFuture, CredentialProvider, SessionStore};
use crate::core::{
    RouteContext, TelemetryError, WebSocketBufferConfig, WsCloseFrame, WsFrame,
};
use crate::transport::{WsTransport, WsTransportConnectFuture};

struct MockShared {
    refuse: AtomicUsize,
    connects: AtomicUsize,
    urls: Mutex<Vec<String>>,
    accepted_tx: mpsc::UnboundedSender<MockConnection>,
}

/// A transport over in-memory channels; every successful connect opens a fresh connection.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<MockShared>,
}

impl MockTransport {
    /// Build a transport + server control pair.
    pub fn pair() -> (Self, MockServer) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(MockShared {
            refuse: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            accepted_tx,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockServer {
                shared,
                accepted_rx,
            },
        )
    }
}

impl WsTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(
        &self,
        url: String,
        _buffers: WebSocketBufferConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            shared.connects.fetch_add(1, Ordering::SeqCst);
            shared.urls.lock().await.push(url);

            let refused = shared
                .refuse
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(TelemetryError::Connection(
                    "mock server refused the connection".to_string(),
                ));
            }

            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let control = Arc::new(WriteControl::default());

            let connection = MockConnection {
                outbound_rx: sent_rx,
                inbound_tx: Some(inbound_tx),
                control: Arc::clone(&control),
            };
            shared.accepted_tx.send(connection).map_err(|_| {
                TelemetryError::Connection("mock server handle dropped".to_string())
            })?;

            Ok((
                MockReader { rx: inbound_rx },
                MockWriter { sent_tx, control },
            ))
        })
    }
}

/// Server-side test handle paired with [`MockTransport`].
pub struct MockServer {
    shared: Arc<MockShared>,
    accepted_rx: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockServer {
    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.shared.refuse.store(count, Ordering::SeqCst);
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub async fn dialled_urls(&self) -> Vec<String> {
        self.shared.urls.lock().await.clone()
    }

    /// Wait for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MockConnection> {
        self.accepted_rx.recv().await
    }

    pub async fn accept_timeout(&mut self, timeout: Duration) -> Option<MockConnection> {
        tokio::time::timeout(timeout, self.accepted_rx.recv())
            .await
            .unwrap_or_default()
    }
}

/// Error surface for operations on [`MockConnection`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MockServerError {
    /// The inbound socket side was intentionally dropped.
    SocketDropped,
    /// The client is no longer reading this connection.
    ChannelClosed,
}

impl std::fmt::Display for MockServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockServerError::SocketDropped => f.write_str("mock socket already dropped"),
            MockServerError::ChannelClosed => f.write_str("mock client channel is closed"),
        }
    }
}

impl std::error::Error for MockServerError {}

/// Server-side switches over how the client's writes behave.
#[derive(Default)]
struct WriteControl {
    fail: AtomicBool,
    stall: AtomicBool,
    waker: AtomicWaker,
}

/// One accepted connection as seen by the server.
pub struct MockConnection {
    outbound_rx: mpsc::UnboundedReceiver<WsFrame>,
    inbound_tx: Option<mpsc::UnboundedSender<WsFrame>>,
    control: Arc<WriteControl>,
}

impl MockConnection {
    /// Receive a frame written by the client.
    pub async fn recv_outbound(&mut self) -> Option<WsFrame> {
        self.outbound_rx.recv().await
    }

    pub async fn recv_outbound_timeout(&mut self, timeout: Duration) -> Option<WsFrame> {
        tokio::time::timeout(timeout, self.outbound_rx.recv())
            .await
            .unwrap_or_default()
    }

    /// Next data frame parsed as JSON; control frames are skipped.
    pub async fn recv_json(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.outbound_rx.recv())
                .await
                .ok()??;
            if let Some(bytes) = frame.payload() {
                return sonic_rs::from_slice(bytes).ok();
            }
        }
    }

    /// Frames already written by the client, without waiting.
    pub fn drain_outbound(&mut self) -> Vec<WsFrame> {
        std::iter::from_fn(|| self.outbound_rx.try_recv().ok()).collect()
    }

    /// Push an inbound frame to the client.
    pub fn send_inbound(&self, frame: WsFrame) -> Result<(), MockServerError> {
        let Some(tx) = self.inbound_tx.as_ref() else {
            return Err(MockServerError::SocketDropped);
        };
        tx.send(frame).map_err(|_| MockServerError::ChannelClosed)
    }

    pub fn send_text(&self, text: impl AsRef<str>) -> Result<(), MockServerError> {
        self.send_inbound(WsFrame::json(text.as_ref().to_string()))
    }

    /// Send a close frame, then drop the inbound side.
    pub fn close(&mut self, code: u16) -> Result<(), MockServerError> {
        let sent = self.send_inbound(WsFrame::Close(Some(WsCloseFrame {
            code,
            reason: bytes::Bytes::from_static(b"server closing"),
        })));
        self.inbound_tx = None;
        sent
    }

    /// Simulate an abrupt socket drop; the client's reader sees end of stream.
    pub fn drop_socket(&mut self) {
        self.inbound_tx = None;
    }

    /// Make subsequent client writes on this connection fail.
    pub fn fail_writes(&self, fail: bool) {
        self.control.fail.store(fail, Ordering::SeqCst);
    }

    /// Stop accepting client writes without failing them, like a socket whose send buffer
    /// never drains. Clearing the stall wakes the blocked writer.
    pub fn stall_writes(&self, stall: bool) {
        self.control.stall.store(stall, Ordering::SeqCst);
        if !stall {
            self.control.waker.wake();
        }
    }
}

/// Reader side for [`MockTransport`].
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<WsFrame>,
}

impl Stream for MockReader {
    type Item = Result<WsFrame, TelemetryError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.rx).poll_recv(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Writer side for [`MockTransport`].
pub struct MockWriter {
    sent_tx: mpsc::UnboundedSender<WsFrame>,
    control: Arc<WriteControl>,
}

impl Sink<WsFrame> for MockWriter {
    type Error = TelemetryError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.control.stall.load(Ordering::SeqCst) {
            self.control.waker.register(cx.waker());
            // Re-check so a concurrent un-stall is not missed.
            if self.control.stall.load(Ordering::SeqCst) {
                return Poll::Pending;
            }
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        if self.control.fail.load(Ordering::SeqCst) {
            return Err(TelemetryError::Transport {
                context: "mock_transport_write",
                error: "write refused by mock server".to_string(),
            });
        }
        self.get_mut()
            .sent_tx
            .send(item)
            .map_err(|_| TelemetryError::Transport {
                context: "mock_transport_write",
                error: "mock outbound channel closed".to_string(),
            })
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Credential provider returning a fixed token.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> CollaboratorFuture<Option<String>> {
        let token = self.token.clone();
        Box::pin(async move { Some(token) })
    }
}

/// Credential provider with no token, as on a signed-out device.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn bearer_token(&self) -> CollaboratorFuture<Option<String>> {
        Box::pin(async { None })
    }
}

/// In-memory [`SessionStore`].
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    route: Arc<Mutex<Option<RouteContext>>>,
}

impl MemorySessionStore {
    pub fn new(route: Option<RouteContext>) -> Self {
        Self {
            route: Arc::new(Mutex::new(route)),
        }
    }

    pub async fn set(&self, route: Option<RouteContext>) {
        *self.route.lock().await = route;
    }
}

impl SessionStore for MemorySessionStore {
    fn last_route(&self) -> CollaboratorFuture<Option<RouteContext>> {
        let route = Arc::clone(&self.route);
        Box::pin(async move { route.lock().await.clone() })
    }
}
