//! Connection manager actor.
//!
//! Every piece of session state lives inside one kameo actor, so its mailbox serializes all
//! mutation. Socket reads, timers and connect attempts run as owned tasks that only talk back
//! through epoch-stamped messages; anything stamped with an older epoch is ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::tasks::{ScheduledTask, SessionTasks};
use super::writer::{WriteFailure, WriterClose, WriterWrite, WsWriterActor};
use crate::client::CredentialProvider;
use crate::config::TelemetryConfig;
use crate::core::{
    BoardingAction, ConnectionState, ExponentialBackoffReconnect, HeartbeatMonitor,
    InboundDecode, InboundFrame, InboundKind, LocationSample, LocationThrottle, OutboundMessage,
    OutboundQueue, ReconnectStrategy, RouteContext, TelemetryError, TelemetryResult,
    TelemetryState, TelemetryStatus, WsFrame, decode_inbound, encode_frame,
};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;

/// How long a closing writer may take to flush its close frame before it is killed.
const WRITER_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Callback registered for one inbound kind.
pub type InboundHandler = Box<dyn FnMut(&InboundFrame) + Send + 'static>;

/// Arguments passed when constructing a telemetry actor instance.
pub struct TelemetryActorArgs<T = TungsteniteTransport, R = ExponentialBackoffReconnect>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    pub config: TelemetryConfig,
    pub transport: T,
    pub reconnect_strategy: R,
    pub credentials: Arc<dyn CredentialProvider>,
}

pub struct TelemetryActor<T = TungsteniteTransport, R = ExponentialBackoffReconnect>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    config: TelemetryConfig,
    transport: T,
    reconnect: R,
    credentials: Arc<dyn CredentialProvider>,
    actor_ref: ActorRef<Self>,
    state: ConnectionState,
    epoch: u64,
    route: Option<RouteContext>,
    telemetry: TelemetryState,
    throttle: LocationThrottle,
    queue: OutboundQueue,
    heartbeat: HeartbeatMonitor,
    handlers: HashMap<InboundKind, InboundHandler>,
    writer: Option<ActorRef<WsWriterActor<T::Writer>>>,
    tasks: SessionTasks,
    pending_connect: Option<oneshot::Sender<TelemetryResult<()>>>,
}

impl<T, R> Actor for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Args = TelemetryActorArgs<T, R>;
    type Error = TelemetryError;

    fn name() -> &'static str {
        "TelemetryActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> TelemetryResult<Self> {
        let TelemetryActorArgs {
            config,
            transport,
            reconnect_strategy,
            credentials,
        } = args;

        Ok(Self {
            throttle: LocationThrottle::new(
                config.location_update.min_distance_meters,
                config.max_silence(),
            ),
            queue: OutboundQueue::new(config.message_queue.max_size),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval()),
            config,
            transport,
            reconnect: reconnect_strategy,
            credentials,
            actor_ref: ctx,
            state: ConnectionState::Disconnected,
            epoch: 0,
            route: None,
            telemetry: TelemetryState::default(),
            handlers: HashMap::new(),
            writer: None,
            tasks: SessionTasks::default(),
            pending_connect: None,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: kameo::error::ActorStopReason,
    ) -> TelemetryResult<()> {
        self.tasks.cancel_all();
        self.close_writer(Some(WsFrame::normal_close("client shutdown")));
        Ok(())
    }

    fn on_panic(
        &mut self,
        _actor_ref: kameo::actor::WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            tracing::error!(error = ?err, "TelemetryActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}

impl<T, R> TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    fn vehicle_id(&self) -> &str {
        self.route
            .as_ref()
            .map(|r| r.vehicle_id.as_str())
            .unwrap_or("-")
    }

    fn bump_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    fn handle_connect(
        &mut self,
        route: RouteContext,
        reply: oneshot::Sender<TelemetryResult<()>>,
    ) {
        if self.state == ConnectionState::Connected && self.route.as_ref() == Some(&route) {
            let _ = reply.send(Ok(()));
            return;
        }

        if let Some(previous) = self.pending_connect.take() {
            let _ = previous.send(Err(TelemetryError::Connection(
                "superseded by a newer connect()".to_string(),
            )));
        }

        if self.route.as_ref().is_some_and(|current| current != &route) {
            info!(
                from = %self.vehicle_id(),
                to = %route.vehicle_id,
                operation_id = %route.operation_id,
                "route changed, replacing telemetry session"
            );
            self.teardown();
        } else {
            self.tasks.cancel_all();
            self.close_writer(Some(WsFrame::normal_close("client reconnect")));
        }

        self.route = Some(route);
        self.reconnect.reset();
        self.pending_connect = Some(reply);
        self.begin_attempt();
    }

    /// Spawn one connect attempt: fetch the credential, then open the socket.
    fn begin_attempt(&mut self) {
        let epoch = self.bump_epoch();
        self.state = ConnectionState::Connecting;
        debug!(
            vehicle_id = %self.vehicle_id(),
            attempt = self.reconnect.attempts(),
            "opening telemetry socket"
        );

        let actor_ref = self.actor_ref.clone();
        let credentials = Arc::clone(&self.credentials);
        let transport = self.transport.clone();
        let config = self.config.clone();

        self.tasks.connect = Some(ScheduledTask::spawn(async move {
            let outcome: TelemetryResult<(T::Reader, T::Writer)> = async {
                let token = credentials.bearer_token().await.ok_or_else(|| {
                    TelemetryError::Authentication(
                        "credential provider returned no token".to_string(),
                    )
                })?;
                let url = config.socket_url(&token)?;
                transport.connect(url, config.ws_buffers).await
            }
            .await;

            match outcome {
                Ok((reader, writer)) => {
                    let _ = actor_ref
                        .tell(ConnectionEstablished::<T> {
                            epoch,
                            reader,
                            writer,
                        })
                        .send()
                        .await;
                }
                Err(error) => {
                    let _ = actor_ref
                        .tell(SessionEvent::ConnectionFailed { epoch, error })
                        .send()
                        .await;
                }
            }
        }));
    }

    fn on_connection_established(&mut self, reader: T::Reader, writer: T::Writer) {
        self.tasks.connect = None;
        self.state = ConnectionState::Connected;
        self.reconnect.reset();
        self.heartbeat.reset();

        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        self.writer = Some(WsWriterActor::spawn(WsWriterActor::new(writer, failures_tx)));
        self.spawn_failure_relay(failures_rx);
        self.spawn_reader(reader);
        self.start_timers();

        info!(
            vehicle_id = %self.vehicle_id(),
            pending = self.queue.len(),
            "telemetry socket open"
        );
        self.drain_queue();

        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Ok(()));
        }
    }

    fn handle_connection_failed(&mut self, error: TelemetryError) {
        self.tasks.connect = None;
        if self.state != ConnectionState::Connecting {
            return;
        }

        let fatal = matches!(error, TelemetryError::Authentication(_));
        let reason = error.to_string();
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(error));
        }

        if fatal {
            warn!(
                vehicle_id = %self.vehicle_id(),
                error = %reason,
                "no credential available, staying disconnected"
            );
            self.state = ConnectionState::Disconnected;
            return;
        }
        self.schedule_reconnect("connect_failed", &reason);
    }

    fn handle_socket_closed(&mut self, reason: String) {
        if self.state != ConnectionState::Connected {
            return;
        }
        self.tasks.stop_io();
        self.close_writer(None);
        self.heartbeat.reset();
        self.schedule_reconnect("socket_closed", &reason);
    }

    fn schedule_reconnect(&mut self, event: &'static str, reason: &str) {
        self.tasks.stop_io();

        let Some(delay) = self.reconnect.next_delay() else {
            self.state = ConnectionState::Disconnected;
            warn!(
                vehicle_id = %self.vehicle_id(),
                event,
                reason = %reason,
                attempts = self.reconnect.attempts(),
                pending = self.queue.len(),
                "reconnect budget exhausted, waiting for an explicit connect()"
            );
            return;
        };

        self.state = ConnectionState::Reconnecting;
        warn!(
            vehicle_id = %self.vehicle_id(),
            event,
            reason = %reason,
            attempt = self.reconnect.attempts(),
            delay_ms = delay.as_millis().min(u64::MAX as u128) as u64,
            pending = self.queue.len(),
            "telemetry reconnect scheduled"
        );

        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();
        self.tasks.reconnect = Some(ScheduledTask::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = actor_ref
                .tell(SessionEvent::ReconnectDue { epoch })
                .send()
                .await;
        }));
    }

    fn spawn_reader(&mut self, mut reader: T::Reader) {
        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();

        self.tasks.reader = Some(ScheduledTask::spawn(async move {
            let reason = loop {
                match reader.next().await {
                    Some(Ok(WsFrame::Close(close))) => {
                        break match close {
                            Some(close) => format!(
                                "server closed ({}): {}",
                                close.code,
                                String::from_utf8_lossy(&close.reason)
                            ),
                            None => "server closed".to_string(),
                        };
                    }
                    Some(Ok(frame)) => {
                        let Some(bytes) = frame.payload() else {
                            continue;
                        };
                        match decode_inbound(bytes) {
                            Ok(InboundDecode::Frame(inbound)) => {
                                if actor_ref
                                    .tell(SessionEvent::Inbound {
                                        epoch,
                                        frame: inbound,
                                    })
                                    .send()
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            Ok(InboundDecode::Unknown(kind)) => {
                                debug!(kind = %kind, "ignoring unknown inbound message type");
                            }
                            Err(err) => {
                                warn!(error = %err, "dropping undecodable inbound frame");
                            }
                        }
                    }
                    Some(Err(err)) => break err.to_string(),
                    None => break "stream ended".to_string(),
                }
            };

            let _ = actor_ref
                .tell(SessionEvent::SocketClosed { epoch, reason })
                .send()
                .await;
        }));
    }

    /// Forward writes the socket rejected back into the mailbox. Outlives the reader so
    /// failures raised while a dead socket drains still reach the queue.
    fn spawn_failure_relay(&mut self, mut failures: mpsc::UnboundedReceiver<WriteFailure>) {
        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();

        self.tasks.write_failures = Some(ScheduledTask::spawn(async move {
            while let Some(failure) = failures.recv().await {
                if actor_ref
                    .tell(SessionEvent::WriteFailed { epoch, failure })
                    .send()
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    fn start_timers(&mut self) {
        let epoch = self.epoch;
        self.tasks.heartbeat = Some(self.spawn_ticker(self.heartbeat.interval(), move || {
            SessionEvent::HeartbeatTick { epoch }
        }));
        self.tasks.flush = Some(self.spawn_ticker(self.config.flush_interval(), move || {
            SessionEvent::FlushTick { epoch }
        }));
    }

    /// First tick fires one full period after the socket opens.
    fn spawn_ticker<F>(&self, period: Duration, event: F) -> ScheduledTask
    where
        F: Fn() -> SessionEvent + Send + 'static,
    {
        let actor_ref = self.actor_ref.clone();
        ScheduledTask::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if actor_ref.tell(event()).send().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Detach the writer and close it in the background. A close stuck behind a stalled
    /// write is abandoned after [`WRITER_CLOSE_GRACE`] and the writer is killed.
    fn close_writer(&mut self, frame: Option<WsFrame>) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        tokio::spawn(async move {
            let closing = async { writer.ask(WriterClose { frame }).await };
            match tokio::time::timeout(WRITER_CLOSE_GRACE, closing).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(error = ?err, "telemetry writer close failed"),
                Err(_) => warn!(
                    grace_ms = WRITER_CLOSE_GRACE.as_millis() as u64,
                    "telemetry writer stalled, dropping socket"
                ),
            }
            writer.kill();
        });
    }

    /// Drop the socket, every task and all session data. Handlers survive.
    fn teardown(&mut self) {
        self.bump_epoch();
        self.tasks.cancel_all();
        self.close_writer(Some(WsFrame::normal_close("client disconnect")));
        self.queue.clear();
        self.route = None;
        self.telemetry.clear();
        self.throttle.reset();
        self.heartbeat = HeartbeatMonitor::new(self.config.heartbeat_interval());
        self.reconnect.reset();
        self.state = ConnectionState::Disconnected;
    }

    fn handle_disconnect(&mut self) {
        let was = self.state;
        self.teardown();
        self.handlers.clear();
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(TelemetryError::Connection(
                "disconnect() called before the socket opened".to_string(),
            )));
        }
        if was != ConnectionState::Disconnected {
            info!(previous = was.as_str(), "telemetry session closed");
        }
    }

    /// Enrich one message and hand it to the writer without waiting for the wire.
    ///
    /// Fails with `SendFailure` when there is no writer or its mailbox is full; write errors
    /// surface later as [`SessionEvent::WriteFailed`].
    fn transmit(&self, message: &OutboundMessage) -> TelemetryResult<()> {
        let (Some(route), Some(writer)) = (self.route.as_ref(), self.writer.as_ref()) else {
            return Err(TelemetryError::SendFailure("no open socket".to_string()));
        };
        let encoded = encode_frame(message, route, self.config.coordinate_order, epoch_millis())?;
        writer
            .tell(WriterWrite {
                frame: WsFrame::json(encoded),
                message: message.clone(),
            })
            .try_send()
            .map_err(|err| TelemetryError::SendFailure(format!("writer unavailable: {err:?}")))
    }

    fn send(&mut self, message: OutboundMessage) {
        if self.state != ConnectionState::Connected {
            self.enqueue(message);
            return;
        }
        // Anything left from a failed drain goes out first.
        if !self.queue.is_empty() && !self.drain_queue() {
            self.enqueue(message);
            return;
        }

        match self.transmit(&message) {
            Ok(()) => debug!(kind = message.kind(), "telemetry frame sent"),
            Err(TelemetryError::SendFailure(error)) => {
                warn!(
                    vehicle_id = %self.vehicle_id(),
                    kind = message.kind(),
                    error = %error,
                    "telemetry write failed, message queued"
                );
                self.enqueue(message);
            }
            Err(err) => {
                warn!(kind = message.kind(), error = %err, "dropping unencodable message");
            }
        }
    }

    fn enqueue(&mut self, message: OutboundMessage) {
        let kind = message.kind();
        match self.queue.push(message) {
            Some(evicted) => debug!(
                queued = kind,
                evicted = evicted.kind(),
                capacity = self.queue.capacity(),
                "pending queue full, evicted oldest entry"
            ),
            None => debug!(kind, pending = self.queue.len(), "message queued"),
        }
    }

    /// Flush pending messages in order; stops at the first write failure.
    fn drain_queue(&mut self) -> bool {
        while let Some(message) = self.queue.pop_front() {
            match self.transmit(&message) {
                Ok(()) => {}
                Err(TelemetryError::SendFailure(error)) => {
                    warn!(
                        kind = message.kind(),
                        error = %error,
                        pending = self.queue.len() + 1,
                        "queue drain interrupted"
                    );
                    self.queue.push_front(message);
                    return false;
                }
                Err(err) => {
                    warn!(kind = message.kind(), error = %err, "dropping unencodable message");
                }
            }
        }
        true
    }

    fn handle_write_failure(&mut self, failure: WriteFailure) {
        let WriteFailure { message, error } = failure;
        if message == OutboundMessage::Heartbeat {
            warn!(error = %error, "heartbeat write failed");
            return;
        }
        warn!(
            vehicle_id = %self.vehicle_id(),
            kind = message.kind(),
            error = %error,
            "telemetry write failed, message queued"
        );
        self.enqueue(message);
    }

    fn send_latest_location(&mut self, trigger: &'static str) {
        if self.route.is_none() {
            return;
        }
        let Some(sample) = self.telemetry.last_location().copied() else {
            return;
        };
        let decision = self.throttle.admit(&sample, Instant::now());
        if !decision.should_send() {
            debug!(trigger, ?decision, "location suppressed");
            return;
        }
        debug!(trigger, ?decision, "location accepted");
        let message = OutboundMessage::location(&sample, self.telemetry.occupied_seats());
        self.send(message);
    }

    fn update_location(&mut self, sample: LocationSample) {
        if let Err(err) = sample.validate() {
            debug!(error = %err, "discarding location sample");
            return;
        }
        self.telemetry.set_location(sample);
        if sample.is_moving() {
            self.send_latest_location("motion");
        }
    }

    fn dispatch(&mut self, frame: InboundFrame) {
        match frame.kind {
            InboundKind::HeartbeatResponse => {
                let rtt = self.heartbeat.record_response(Instant::now());
                debug!(
                    rtt_ms = rtt.map(|d| d.as_millis().min(u64::MAX as u128) as u64),
                    "heartbeat acknowledged"
                );
            }
            InboundKind::ConnectionEstablished => {
                info!(vehicle_id = %self.vehicle_id(), "server acknowledged session");
            }
            InboundKind::Error => {
                warn!(
                    server_message = frame.message().unwrap_or("<none>"),
                    "server reported an error"
                );
            }
            InboundKind::Success | InboundKind::BusUpdate | InboundKind::Boarding => {
                debug!(kind = frame.kind.as_str(), "inbound message");
            }
        }

        if let Some(handler) = self.handlers.get_mut(&frame.kind) {
            handler(&frame);
        }
    }

    fn status(&self) -> TelemetryStatus {
        TelemetryStatus {
            connected: self.state == ConnectionState::Connected,
            state: self.state,
            reconnect_attempts: self.reconnect.attempts(),
            pending_message_count: self.queue.len(),
            route: self.route.clone(),
            messages_evicted: self.queue.evicted(),
            heartbeats_sent: self.heartbeat.sent(),
            heartbeat_responses: self.heartbeat.responses(),
            awaiting_heartbeat_response: self.heartbeat.awaiting_response(),
            last_heartbeat_rtt: self.heartbeat.last_rtt(),
        }
    }
}

/// Open a session for `route`; the outcome is delivered on `reply` once the socket opens or
/// the attempt fails.
#[derive(Debug)]
pub struct Connect {
    pub route: RouteContext,
    pub reply: oneshot::Sender<TelemetryResult<()>>,
}

impl<T, R> KameoMessage<Connect> for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Reply = TelemetryResult<()>;

    async fn handle(&mut self, msg: Connect, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.handle_connect(msg.route, msg.reply);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Disconnect;

impl<T, R> KameoMessage<Disconnect> for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        _msg: Disconnect,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.handle_disconnect();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetStatus;

impl<T, R> KameoMessage<GetStatus> for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Reply = TelemetryResult<TelemetryStatus>;

    async fn handle(&mut self, _msg: GetStatus, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.status())
    }
}

/// Host-issued commands that need no reply.
pub enum TelemetryCommand {
    Send(OutboundMessage),
    UpdateLocation(LocationSample),
    UpdateOccupancy(u32),
    RecordBoarding {
        action: BoardingAction,
        count: u32,
        stop_id: Option<String>,
    },
    ReportEmergency {
        description: String,
    },
    UpdateBusStatus {
        status: String,
    },
    On {
        kind: InboundKind,
        handler: InboundHandler,
    },
    Off {
        kind: InboundKind,
    },
}

impl<T, R> KameoMessage<TelemetryCommand> for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        command: TelemetryCommand,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        match command {
            TelemetryCommand::Send(message) => self.send(message),
            TelemetryCommand::UpdateLocation(sample) => self.update_location(sample),
            TelemetryCommand::UpdateOccupancy(count) => {
                self.telemetry.set_occupancy(count);
                debug!(occupied_seats = count, "occupancy updated");
            }
            TelemetryCommand::RecordBoarding {
                action,
                count,
                stop_id,
            } => {
                let occupied_seats = self.telemetry.apply_boarding(action, count);
                self.send(OutboundMessage::PassengerBoarding {
                    action,
                    count,
                    occupied_seats,
                    stop_id,
                });
            }
            TelemetryCommand::ReportEmergency { description } => {
                warn!(vehicle_id = %self.vehicle_id(), description = %description, "emergency reported");
                let message = OutboundMessage::emergency(description, self.telemetry.last_location());
                self.send(message);
            }
            TelemetryCommand::UpdateBusStatus { status } => {
                let occupied_seats = self.telemetry.occupied_seats();
                self.send(OutboundMessage::BusStatusUpdate {
                    status,
                    occupied_seats,
                });
            }
            TelemetryCommand::On { kind, handler } => {
                if self.handlers.insert(kind, handler).is_some() {
                    debug!(kind = kind.as_str(), "replaced inbound handler");
                }
            }
            TelemetryCommand::Off { kind } => {
                self.handlers.remove(&kind);
            }
        }
        Ok(())
    }
}

/// A socket opened by a connect attempt.
pub struct ConnectionEstablished<T: WsTransport> {
    pub epoch: u64,
    pub reader: T::Reader,
    pub writer: T::Writer,
}

impl<T, R> KameoMessage<ConnectionEstablished<T>> for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        msg: ConnectionEstablished<T>,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if msg.epoch != self.epoch || self.state != ConnectionState::Connecting {
            debug!(epoch = msg.epoch, "discarding socket from a superseded attempt");
            return Ok(());
        }
        self.on_connection_established(msg.reader, msg.writer);
        Ok(())
    }
}

/// Events raised by session tasks.
#[derive(Debug)]
pub enum SessionEvent {
    ConnectionFailed { epoch: u64, error: TelemetryError },
    Inbound { epoch: u64, frame: InboundFrame },
    SocketClosed { epoch: u64, reason: String },
    WriteFailed { epoch: u64, failure: WriteFailure },
    HeartbeatTick { epoch: u64 },
    FlushTick { epoch: u64 },
    ReconnectDue { epoch: u64 },
}

impl SessionEvent {
    fn epoch(&self) -> u64 {
        match self {
            SessionEvent::ConnectionFailed { epoch, .. }
            | SessionEvent::Inbound { epoch, .. }
            | SessionEvent::SocketClosed { epoch, .. }
            | SessionEvent::WriteFailed { epoch, .. }
            | SessionEvent::HeartbeatTick { epoch }
            | SessionEvent::FlushTick { epoch }
            | SessionEvent::ReconnectDue { epoch } => *epoch,
        }
    }
}

impl<T, R> KameoMessage<SessionEvent> for TelemetryActor<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    type Reply = TelemetryResult<()>;

    async fn handle(
        &mut self,
        event: SessionEvent,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if event.epoch() != self.epoch {
            return Ok(());
        }

        match event {
            SessionEvent::ConnectionFailed { error, .. } => self.handle_connection_failed(error),
            SessionEvent::Inbound { frame, .. } => self.dispatch(frame),
            SessionEvent::SocketClosed { reason, .. } => self.handle_socket_closed(reason),
            SessionEvent::WriteFailed { failure, .. } => self.handle_write_failure(failure),
            SessionEvent::HeartbeatTick { .. } => {
                if self.state == ConnectionState::Connected {
                    let heartbeat = self.heartbeat.create_heartbeat(Instant::now());
                    if let Err(err) = self.transmit(&heartbeat) {
                        warn!(error = %err, "heartbeat write failed");
                    }
                }
            }
            SessionEvent::FlushTick { .. } => {
                if self.state == ConnectionState::Connected {
                    self.send_latest_location("flush");
                }
            }
            SessionEvent::ReconnectDue { .. } => {
                if self.state == ConnectionState::Reconnecting {
                    self.tasks.reconnect = None;
                    self.begin_attempt();
                }
            }
        }
        Ok(())
    }
}
