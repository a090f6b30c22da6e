mod inner;

pub use inner::{ConnectionError, DispatchEvent, EventStream, GatewayEvent, ProtocolViolation};

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use snafu::prelude::*;
use tokio::{sync::watch, task::JoinHandle};

use super::{
    message::Message,
    session::{ConnectionStage, Credentials, SessionState},
    transport::{Transport, TungsteniteTransport},
    url::GatewayURLInfo,
};
use crate::{config::Config, error, Result};
use inner::{Context, EventStreamSender, Shared, Shutdown, Supervisor};

/// Outbound command accepted while connected
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// op 3, update own presence
    PresenceUpdate(Value),
    /// op 4, join, move or leave voice channels
    VoiceStateUpdate(Value),
    /// op 8, request members of a guild
    RequestGuildMembers(Value),
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        match command {
            Command::PresenceUpdate(d) => Message::PresenceUpdate(d),
            Command::VoiceStateUpdate(d) => Message::VoiceStateUpdate(d),
            Command::RequestGuildMembers(d) => Message::RequestGuildMembers(d),
        }
    }
}

#[derive(Debug)]
struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Resumable gateway connection manager.
///
/// After [`start`](Self::start) a background task connects, performs identify or resume,
/// keeps the connection alive with heartbeats and reconnects when it breaks.
/// Dispatches are delivered through the returned [`EventStream`].
///
/// Dropping the gateway or the event stream stops the background task.
#[derive(Debug)]
pub struct Gateway<T: Transport = TungsteniteTransport> {
    config: Arc<Config>,
    transport: Arc<T>,
    shared: Arc<Shared>,
    running: Option<Running>,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Gateway {
    /// Create a gateway client over tungstenite websocket
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, TungsteniteTransport)
    }
}

impl<T: Transport> Gateway<T> {
    /// Create a gateway client over custom transport
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            shared: Arc::default(),
            running: None,
        }
    }

    /// Seed a session from previous run, next start will try to resume it
    pub fn resume(self, session: SessionState) -> Self {
        let mut state = self.shared.lock();
        state.session = SessionState {
            connected: false,
            ..session
        };
        drop(state);
        self
    }

    /// Start connecting to gateway at `url`, returning the event stream.
    ///
    /// # Errors
    ///
    /// Fails if already running, config is invalid, or url is not a websocket url.
    pub fn start(&mut self, url: &str, credentials: Credentials) -> Result<EventStream> {
        if let Some(running) = &self.running {
            ensure!(running.task.is_finished(), error::AlreadyRunning);
        }

        self.config.validate().context(error::InvalidConfig)?;

        let gateway: GatewayURLInfo = url
            .parse()
            .with_context(|_| error::InvalidGatewayURL { url })?;

        log::info!("Starting gateway client for {}", gateway);
        log::debug!("Credentials: {:?}", credentials);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events, stream) =
            EventStreamSender::new(self.config.event_buffer, Shutdown::new(shutdown_rx.clone()));

        let ctx = Context {
            config: self.config.clone(),
            transport: self.transport.clone(),
            credentials,
            gateway,
            shared: self.shared.clone(),
            events,
            shutdown: Shutdown::new(shutdown_rx),
        };

        let task = tokio::spawn(Supervisor::new(ctx).run());

        self.running = Some(Running {
            shutdown: shutdown_tx,
            task,
        });

        Ok(stream)
    }

    /// Stop gracefully, no reconnect is attempted.
    ///
    /// Returns after the connection is closed, no frame is sent or event delivered after that.
    /// The session is discarded.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            log::info!("Stopping gateway client");

            let _ = running.shutdown.send(true);
            if let Err(err) = running.task.await {
                log::error!("Gateway task crashed: {}", err);
            }
        }

        let mut state = self.shared.lock();
        state.session.invalidate();
        state.stage = ConnectionStage::Disconnected;
        state.session.connected = false;
    }

    /// true if background task is still working
    pub fn is_running(&self) -> bool {
        matches!(&self.running, Some(r) if !r.task.is_finished())
    }

    /// true if a session is established on current connection
    pub fn is_connected(&self) -> bool {
        self.shared.lock().session.connected
    }

    /// Snapshot of session state, can be fed to [`resume`](Self::resume) later
    pub fn session(&self) -> SessionState {
        self.shared.lock().session.clone()
    }

    /// Current protocol stage
    pub fn stage(&self) -> ConnectionStage {
        self.shared.lock().stage
    }

    /// Round trip of last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.shared.lock().heartbeat.latency
    }

    /// Send a command to gateway
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotConnected`](crate::Error::NotConnected) unless a session
    /// is established.
    pub fn send(&self, command: Command) -> Result<()> {
        let state = self.shared.lock();
        let outbox = state
            .outbox
            .as_ref()
            .filter(|_| state.session.connected)
            .context(error::NotConnected)?;

        let message = Message::from(command);
        log::debug!("Send {} command", message.type_name());

        outbox
            .send(message)
            .map_err(|_| error::NotConnected.build())
    }
}
