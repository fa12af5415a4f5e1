use super::state::Session;
use super::timers::ReconnectTimer;
use super::{LinkCommand, LinkHandle};
use crate::error::{LinkError, PollError, Result, TransportError};
use crate::poll::AmsSource;
use crate::transport::{Connector, Transport};
use chrono::Utc;
use filaman_common::config::LinkSettings;
use filaman_common::protocol::{
    settings_ack_success, AmsUnit, InboundMessage, NfcContent, OutboundMessage,
};
use filaman_common::{DisconnectReason, EventBus, LinkEvent, SessionState};
use futures_util::future::BoxFuture;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const COMMAND_CAPACITY: usize = 32;

/// Upper bound on closing a transport during teardown
const CLOSE_GRACE: Duration = Duration::from_millis(1000);

type ConnectFuture = BoxFuture<'static, std::result::Result<Box<dyn Transport>, TransportError>>;
type PollFuture = BoxFuture<'static, std::result::Result<Vec<AmsUnit>, PollError>>;

/// Owner of the session, its transport and timers
pub struct SessionManager {
    settings: LinkSettings,
    connector: Arc<dyn Connector>,
    ams_source: Option<Arc<dyn AmsSource>>,
    bus: EventBus,
    state_tx: watch::Sender<SessionState>,
    commands: mpsc::Receiver<LinkCommand>,
    shutdown: CancellationToken,

    session: Session,
    generation: u64,
    transport: Option<Box<dyn Transport>>,
    connecting: Option<ConnectFuture>,
    /// Exists iff the session is open
    liveness: Option<Interval>,
    reconnect: ReconnectTimer,
    poll_timer: Option<Interval>,
    poll_in_flight: Option<PollFuture>,
}

impl SessionManager {
    /// Start the manager task in the Disconnected state
    ///
    /// Nothing connects until `LinkHandle::connect` is called; the polling
    /// fallback (when a source is given and polling is enabled) starts
    /// immediately.
    pub fn spawn(
        settings: LinkSettings,
        connector: Arc<dyn Connector>,
        ams_source: Option<Arc<dyn AmsSource>>,
        bus: EventBus,
    ) -> LinkHandle {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let shutdown = CancellationToken::new();

        let poll_timer = (settings.poll_enabled && ams_source.is_some()).then(|| {
            let period = settings.poll_interval();
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        let manager = SessionManager {
            settings,
            connector,
            ams_source,
            bus: bus.clone(),
            state_tx,
            commands,
            shutdown: shutdown.clone(),
            session: Session::new(0, SessionState::Disconnected),
            generation: 0,
            transport: None,
            connecting: None,
            liveness: None,
            reconnect: ReconnectTimer::new(),
            poll_timer,
            poll_in_flight: None,
        };
        tokio::spawn(manager.run());

        LinkHandle {
            commands: command_tx,
            state: state_rx,
            bus,
            shutdown,
        }
    }

    async fn run(mut self) {
        info!("Session manager started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All link handles dropped");
                        break;
                    }
                },

                frame = recv_frame(&mut self.transport) => self.handle_frame(frame).await,

                result = take_when_ready(&mut self.connecting) => self.handle_connect_result(result).await,

                _ = tick(&mut self.liveness) => self.handle_probe_tick().await,

                _ = self.reconnect.fired() => self.handle_reconnect_due(),

                _ = tick(&mut self.poll_timer) => self.start_poll(),

                result = take_when_ready(&mut self.poll_in_flight) => self.handle_poll_result(result),
            }
        }

        self.stop().await;
        info!("Session manager stopped");
    }

    async fn handle_command(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::Connect => {
                if self.session.state == SessionState::Disconnected && self.connecting.is_none() {
                    self.begin_connect();
                } else {
                    debug!(state = %self.session.state, "Connect request ignored");
                }
            }
            LinkCommand::Send { message, reply } => {
                let result = self.write(message).await;
                let _ = reply.send(result);
            }
            LinkCommand::PollNow => self.start_poll(),
        }
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.session.state;
        if from == to {
            return;
        }
        self.session.state = to;
        info!(generation = self.session.generation, %from, %to, "Session state changed");

        self.state_tx.send_replace(to);
        let timestamp = Utc::now();
        self.bus.emit_lossy(LinkEvent::StateChanged { from, to, timestamp });

        if to == SessionState::Open || from == SessionState::Open {
            self.bus.emit_lossy(LinkEvent::ConnectionChanged {
                connected: to == SessionState::Open,
                timestamp,
            });
        }
    }

    fn begin_connect(&mut self) {
        if self.reconnect.cancel() {
            debug!("Pending reconnect cancelled by explicit connect");
        }

        self.generation += 1;
        self.session = Session::new(self.generation, SessionState::Disconnected);
        self.set_state(SessionState::Connecting);

        let connector = self.connector.clone();
        let limit = self.settings.connect_timeout();
        self.connecting = Some(Box::pin(async move {
            match tokio::time::timeout(limit, connector.connect()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            }
        }));
    }

    async fn handle_connect_result(
        &mut self,
        result: std::result::Result<Box<dyn Transport>, TransportError>,
    ) {
        match result {
            Ok(mut transport) => {
                if self.session.state != SessionState::Connecting {
                    // superseded attempt
                    let _ = tokio::time::timeout(CLOSE_GRACE, transport.close()).await;
                    return;
                }
                self.transport = Some(transport);
                self.session.ack();

                let period = self.settings.probe_interval();
                let mut liveness = interval_at(Instant::now() + period, period);
                liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.liveness = Some(liveness);

                self.set_state(SessionState::Open);
            }
            Err(e) => {
                warn!(generation = self.session.generation, error = %e, "Connection attempt failed");
                self.set_state(SessionState::Disconnected);
                self.emit_disconnected(DisconnectReason::TransportUnavailable(e.to_string()));
                self.schedule_reconnect();
            }
        }
    }

    async fn handle_frame(&mut self, frame: std::result::Result<Option<String>, TransportError>) {
        match frame {
            Ok(Some(text)) => {
                // any inbound frame counts as a liveness ack, parseable or not
                self.session.ack();
                match InboundMessage::parse(&text) {
                    Ok(message) => self.route(message),
                    Err(e) => {
                        let error = LinkError::MalformedMessage(e.to_string());
                        warn!(%error, frame_len = text.len(), "Dropping inbound frame");
                    }
                }
            }
            Ok(None) => {
                self.teardown(DisconnectReason::TransportLost("closed by peer".to_string()))
                    .await
            }
            Err(e) => self.teardown(DisconnectReason::TransportLost(e.to_string())).await,
        }
    }

    fn route(&mut self, message: InboundMessage) {
        trace!(kind = message.kind(), "Inbound message");
        let timestamp = Utc::now();
        let event = match message {
            InboundMessage::AmsData { payload } => LinkEvent::AmsData {
                units: payload,
                timestamp,
            },
            InboundMessage::NfcTag { payload } => LinkEvent::NfcTag {
                presence: payload.presence(),
                timestamp,
            },
            InboundMessage::NfcData { payload } => LinkEvent::NfcData {
                content: NfcContent::from_value(&payload),
                timestamp,
            },
            InboundMessage::WriteNfcTag { success } => {
                LinkEvent::WriteNfcTagResult { success, timestamp }
            }
            InboundMessage::Heartbeat(status) => LinkEvent::PeerStatus { status, timestamp },
            InboundMessage::SetSpoolmanSettings { payload } => LinkEvent::SpoolmanSettingsResult {
                success: settings_ack_success(&payload),
                timestamp,
            },
            InboundMessage::Unknown => {
                debug!("Ignoring inbound message of unknown type");
                return;
            }
        };
        self.bus.emit_lossy(event);
    }

    async fn handle_probe_tick(&mut self) {
        if self.session.state != SessionState::Open {
            return;
        }

        let timeout = self.settings.liveness_timeout();
        if self.session.is_silent_for(timeout) {
            warn!(
                generation = self.session.generation,
                timeout_ms = timeout.as_millis() as u64,
                "No inbound traffic within liveness timeout"
            );
            self.teardown(DisconnectReason::LivenessTimeout).await;
            return;
        }

        if let Err(e) = self.write(OutboundMessage::Heartbeat).await {
            debug!(error = %e, "Liveness probe not sent");
        }
    }

    /// Write to the open transport; a failed write tears the session down
    async fn write(&mut self, message: OutboundMessage) -> Result<()> {
        if self.session.state != SessionState::Open {
            return Err(LinkError::NotConnected);
        }
        let Some(transport) = self.transport.as_mut() else {
            return Err(LinkError::NotConnected);
        };

        let text = message.to_json()?;
        trace!(kind = message.kind(), "Outbound message");
        match transport.send_text(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let detail = e.to_string();
                self.teardown(DisconnectReason::TransportLost(detail.clone()))
                    .await;
                Err(LinkError::TransportLost(detail))
            }
        }
    }

    /// Close the session and, unless stopping, schedule one reconnect
    async fn teardown(&mut self, reason: DisconnectReason) {
        self.liveness = None;
        self.connecting = None;
        let transport = self.transport.take();

        if self.session.state == SessionState::Open {
            self.set_state(SessionState::Closing);
        }
        if let Some(mut transport) = transport {
            match tokio::time::timeout(CLOSE_GRACE, transport.close()).await {
                Ok(Ok(())) => trace!("Transport closed"),
                Ok(Err(e)) => debug!(error = %e, "Transport close failed"),
                Err(_) => debug!("Transport close timed out"),
            }
        }
        self.set_state(SessionState::Disconnected);

        if reason != DisconnectReason::Shutdown {
            warn!(
                generation = self.session.generation,
                error = %LinkError::from(reason.clone()),
                "Session closed"
            );
        }
        let schedule = reason != DisconnectReason::Shutdown;
        self.emit_disconnected(reason);
        if schedule {
            self.schedule_reconnect();
        }
    }

    fn emit_disconnected(&self, reason: DisconnectReason) {
        self.bus.emit_lossy(LinkEvent::Disconnected {
            reason,
            timestamp: Utc::now(),
        });
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.settings.reconnect_interval();
        if !self.reconnect.schedule(delay) {
            debug!("Reconnect already pending");
            return;
        }
        info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        self.bus.emit_lossy(LinkEvent::ReconnectScheduled {
            delay_ms: delay.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    fn handle_reconnect_due(&mut self) {
        if self.session.state == SessionState::Disconnected && self.connecting.is_none() {
            info!("Reconnecting");
            self.begin_connect();
        }
    }

    fn start_poll(&mut self) {
        if self.session.state == SessionState::Open {
            trace!("Session open, poll skipped");
            return;
        }
        if self.poll_in_flight.is_some() {
            trace!("Poll already in flight");
            return;
        }
        let Some(source) = self.ams_source.clone() else {
            return;
        };
        self.poll_in_flight = Some(Box::pin(async move { source.fetch().await }));
    }

    fn handle_poll_result(&mut self, result: std::result::Result<Vec<AmsUnit>, PollError>) {
        match result {
            Ok(_) if self.session.state == SessionState::Open => {
                debug!("Poll result discarded, session is open");
            }
            Ok(units) if units.is_empty() => trace!("Poll returned no AMS data"),
            Ok(units) => {
                debug!(units = units.len(), "Poll delivered AMS data");
                self.bus.emit_lossy(LinkEvent::AmsData {
                    units,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => debug!(error = %e, "Poll failed"),
        }
    }

    async fn stop(&mut self) {
        self.reconnect.cancel();
        self.poll_in_flight = None;
        self.poll_timer = None;
        if self.transport.is_some() || self.session.state != SessionState::Disconnected {
            self.teardown(DisconnectReason::Shutdown).await;
        }
    }
}

/// Next frame from the transport; pends forever without one
async fn recv_frame(
    transport: &mut Option<Box<dyn Transport>>,
) -> std::result::Result<Option<String>, TransportError> {
    match transport {
        Some(transport) => transport.recv().await,
        None => pending().await,
    }
}

/// Output of the stored future, clearing the slot; pends forever when empty
async fn take_when_ready<T>(slot: &mut Option<BoxFuture<'static, T>>) -> T {
    match slot.as_mut() {
        Some(future) => {
            let output = future.await;
            *slot = None;
            output
        }
        None => pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => pending().await,
    }
}
