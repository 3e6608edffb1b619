use futures_util::{Sink, SinkExt};
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{OutboundMessage, TelemetryError, TelemetryResult, WsFrame};

/// A write the socket did not take, handed back so the session can re-queue it.
#[derive(Debug)]
pub struct WriteFailure {
    pub message: OutboundMessage,
    pub error: TelemetryError,
}

/// Owns the write half of one socket and serializes writes to it.
///
/// Writes are fire-and-forget for the session: a stalled sink only backs up this actor's
/// mailbox, and failures come back on the `failures` channel. A writer lives exactly as long
/// as its socket; a reconnect spawns a fresh one.
pub struct WsWriterActor<W>
where
    W: Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin + 'static,
{
    writer: W,
    closed: bool,
    failures: mpsc::UnboundedSender<WriteFailure>,
}

impl<W> WsWriterActor<W>
where
    W: Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin + 'static,
{
    pub fn new(writer: W, failures: mpsc::UnboundedSender<WriteFailure>) -> Self {
        Self {
            writer,
            closed: false,
            failures,
        }
    }
}

impl<W> Actor for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin + 'static,
{
    type Args = Self;
    type Error = TelemetryError;

    fn name() -> &'static str {
        "WsWriterActor"
    }

    async fn on_start(args: Self::Args, _ctx: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(args)
    }
}

/// Write one encoded frame; `message` is what it was encoded from.
#[derive(Debug, Clone)]
pub struct WriterWrite {
    pub frame: WsFrame,
    pub message: OutboundMessage,
}

impl<W> KameoMessage<WriterWrite> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin + 'static,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: WriterWrite,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let result = if self.closed {
            Err(TelemetryError::InvalidState("writer closed".to_string()))
        } else {
            debug!(
                target: "telemetry-writer",
                kind = msg.message.kind(),
                "sending websocket frame to wire"
            );
            self.writer.send(msg.frame).await
        };

        if let Err(error) = result {
            let _ = self.failures.send(WriteFailure {
                message: msg.message,
                error,
            });
        }
    }
}

/// Send a close frame (when given) and shut the sink.
#[derive(Debug, Clone)]
pub struct WriterClose {
    pub frame: Option<WsFrame>,
}

impl<W> KameoMessage<WriterClose> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = TelemetryError> + Send + Sync + Unpin + 'static,
{
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        msg: WriterClose,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(frame) = msg.frame {
            self.writer.feed(frame).await?;
        }
        self.writer.close().await
    }
}
