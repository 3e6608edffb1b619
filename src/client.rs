//! Host-facing handle over a telemetry session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use kameo::error::SendError;
use kameo::prelude::{Actor, ActorRef};
use tokio::sync::oneshot;

use crate::config::TelemetryConfig;
use crate::core::{
    BoardingAction, ExponentialBackoffReconnect, InboundFrame, InboundKind, LocationSample,
    OutboundMessage, ReconnectStrategy, RouteContext, TelemetryError, TelemetryResult,
    TelemetryStatus,
};
use crate::session::{
    Connect, Disconnect, GetStatus, TelemetryActor, TelemetryActorArgs, TelemetryCommand,
};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;

pub type CollaboratorFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Supplies the bearer token used to authenticate the socket.
///
/// Asked again on every connect attempt, reconnects included. `None` means no credential is
/// available and the attempt fails with [`TelemetryError::Authentication`].
pub trait CredentialProvider: Send + Sync + 'static {
    fn bearer_token(&self) -> CollaboratorFuture<Option<String>>;
}

/// Key-value store holding the last route the device was assigned.
pub trait SessionStore: Send + Sync + 'static {
    fn last_route(&self) -> CollaboratorFuture<Option<RouteContext>>;
}

fn ask_error<M>(err: SendError<M, TelemetryError>) -> TelemetryError {
    match err {
        SendError::HandlerError(err) => err,
        other => tell_error(other),
    }
}

fn tell_error<M, E>(_err: SendError<M, E>) -> TelemetryError {
    TelemetryError::Actor("telemetry session is not running".to_string())
}

/// Cheap-to-clone handle owned by the host application.
pub struct TelemetryClient<T = TungsteniteTransport, R = ExponentialBackoffReconnect>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    actor: ActorRef<TelemetryActor<T, R>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl<T, R> Clone for TelemetryClient<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            store: self.store.clone(),
        }
    }
}

impl TelemetryClient {
    /// Production client over tokio-tungstenite with the configured backoff.
    pub fn new(
        config: TelemetryConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> TelemetryResult<Self> {
        let strategy = config.reconnect.strategy();
        Self::with_transport(config, TungsteniteTransport::default(), strategy, credentials)
    }
}

impl<T, R> TelemetryClient<T, R>
where
    T: WsTransport,
    R: ReconnectStrategy,
{
    /// Spawn the session actor. Must be called inside a tokio runtime.
    pub fn with_transport(
        config: TelemetryConfig,
        transport: T,
        reconnect_strategy: R,
        credentials: Arc<dyn CredentialProvider>,
    ) -> TelemetryResult<Self> {
        config.validate()?;
        let actor = TelemetryActor::spawn(TelemetryActorArgs {
            config,
            transport,
            reconnect_strategy,
            credentials,
        });
        Ok(Self { actor, store: None })
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Open a session tagged with the given route; resolves once the socket is open.
    pub async fn connect(
        &self,
        vehicle_id: impl Into<String>,
        organization_id: impl Into<String>,
        operation_id: impl Into<String>,
    ) -> TelemetryResult<()> {
        self.connect_route(RouteContext::new(vehicle_id, organization_id, operation_id))
            .await
    }

    pub async fn connect_route(&self, route: RouteContext) -> TelemetryResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.actor
            .tell(Connect { route, reply })
            .send()
            .await
            .map_err(tell_error)?;
        outcome
            .await
            .map_err(|_| TelemetryError::Actor("connect reply dropped".to_string()))?
    }

    /// Reconnect with the route persisted in the session store.
    pub async fn resume(&self) -> TelemetryResult<()> {
        let store = self.store.as_ref().ok_or(TelemetryError::MissingRoute)?;
        let route = store
            .last_route()
            .await
            .ok_or(TelemetryError::MissingRoute)?;
        self.connect_route(route).await
    }

    /// Tear the session down. Idempotent; returns after every timer is cancelled.
    pub async fn disconnect(&self) -> TelemetryResult<()> {
        self.actor.ask(Disconnect).await.map_err(ask_error)
    }

    pub async fn status(&self) -> TelemetryResult<TelemetryStatus> {
        self.actor.ask(GetStatus).await.map_err(ask_error)
    }

    async fn command(&self, command: TelemetryCommand) -> TelemetryResult<()> {
        self.actor
            .tell(command)
            .send()
            .await
            .map_err(tell_error)
    }

    /// Transmit now when connected, otherwise queue.
    pub async fn send(&self, message: OutboundMessage) -> TelemetryResult<()> {
        self.command(TelemetryCommand::Send(message)).await
    }

    /// Register the handler for `kind`, replacing any previous one.
    pub async fn on<F>(&self, kind: InboundKind, handler: F) -> TelemetryResult<()>
    where
        F: FnMut(&InboundFrame) + Send + 'static,
    {
        self.command(TelemetryCommand::On {
            kind,
            handler: Box::new(handler),
        })
        .await
    }

    pub async fn off(&self, kind: InboundKind) -> TelemetryResult<()> {
        self.command(TelemetryCommand::Off { kind }).await
    }

    /// Invalid samples are dropped without error.
    pub async fn update_location(&self, sample: LocationSample) -> TelemetryResult<()> {
        self.command(TelemetryCommand::UpdateLocation(sample)).await
    }

    pub async fn update_occupancy(&self, occupied_seats: u32) -> TelemetryResult<()> {
        self.command(TelemetryCommand::UpdateOccupancy(occupied_seats))
            .await
    }

    pub async fn record_boarding(
        &self,
        action: BoardingAction,
        count: u32,
        stop_id: Option<String>,
    ) -> TelemetryResult<()> {
        self.command(TelemetryCommand::RecordBoarding {
            action,
            count,
            stop_id,
        })
        .await
    }

    pub async fn report_emergency(&self, description: impl Into<String>) -> TelemetryResult<()> {
        self.command(TelemetryCommand::ReportEmergency {
            description: description.into(),
        })
        .await
    }

    pub async fn update_bus_status(&self, status: impl Into<String>) -> TelemetryResult<()> {
        self.command(TelemetryCommand::UpdateBusStatus {
            status: status.into(),
        })
        .await
    }

    /// Stop the session actor; the handle is unusable afterwards.
    pub async fn shutdown(self) {
        let _ = self.actor.stop_gracefully().await;
        self.actor.wait_for_shutdown().await;
    }
}
