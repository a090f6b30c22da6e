use std::{collections::VecDeque, time::Duration};

use futures_util::{
    future,
    stream::{SplitSink, SplitStream},
    FutureExt, SinkExt, StreamExt,
};
use rand::Rng;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{frame::coding::CloseCode, CloseFrame},
};

use super::{
    disconnect::{ConnectionEnd, Disconnect},
    protocol::{transition, Action, Transition},
    streaming::{HeartbeatExit, HeartbeatTask, Outbox, WriterTask},
    ClientInner, ConnectionError, Context, GatewayEvent,
};
use crate::ws::{
    close::{self, CloseAction},
    message::{Message, MessageStreamSink, MessageStreamSinkError},
    session::ConnectionStage,
    transport::Transport,
    url::GatewayURLInfo,
};

type Messages<T> = MessageStreamSink<<T as Transport>::Socket>;

#[derive(Debug)]
pub(crate) struct ClientStateConnected<'a, T: Transport> {
    pub ctx: &'a mut Context<T>,
    pub socket: T::Socket,
}

/// Per connection state of the receive loop
#[derive(Debug)]
struct Connection<'c, T> {
    ctx: &'c mut Context<T>,
    stage: ConnectionStage,
    outbox: Outbox,
    heartbeat: Option<HeartbeatTask>,
    /// hello or ready wait deadline
    deadline: Option<Instant>,
    established: bool,
    /// received events waiting for room in the event channel
    backlog: VecDeque<GatewayEvent>,
}

async fn heartbeat_exited(task: &mut Option<HeartbeatTask>) -> HeartbeatExit {
    match task {
        Some(task) => task.exited().await,
        None => future::pending().await,
    }
}

impl<'c, T: Transport> Connection<'c, T> {
    fn enter(&mut self, stage: ConnectionStage) {
        log::debug!("Connection stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
        self.ctx.shared.enter(stage, Some(&self.outbox));
    }

    fn enqueue(&self, message: Message) -> Option<Disconnect> {
        log::trace!("Enqueue {} message", message.type_name());
        if self.outbox.send(message).is_err() {
            return Some(Disconnect::reconnect(true, ConnectionError::WriterStopped));
        }
        None
    }

    fn deliver(&mut self, event: GatewayEvent) {
        self.backlog.push_back(event);
        if self.backlog.len() > self.ctx.config.event_buffer {
            log::debug!("Consumer is slow, {} events waiting", self.backlog.len());
        }
    }

    /// Hand remaining received events to consumer after the socket is closed
    async fn flush(&mut self) -> Option<Disconnect> {
        while let Some(event) = self.backlog.pop_front() {
            let events = &self.ctx.events;
            let shutdown = &mut self.ctx.shutdown;

            tokio::select! {
                biased;

                _ = shutdown.wait() => return Some(Disconnect::Stopped),

                delivered = events.send_event(event) => {
                    if !delivered {
                        log::debug!("Event stream dropped when flush events");
                        return Some(Disconnect::ConsumerGone);
                    }
                }
            }
        }
        None
    }

    fn start_heartbeat(&mut self, interval: Duration) {
        log::debug!("Hello received, heartbeat interval {:?}", interval);

        self.heartbeat = Some(HeartbeatTask::spawn(
            self.ctx.shared.clone(),
            self.outbox.clone(),
            interval,
        ));
        self.deadline = Some(Instant::now() + self.ctx.config.ready_timeout);
    }

    fn invalid_session_delay(&self) -> Duration {
        let min = self.ctx.config.invalid_session_delay_min;
        let max = self.ctx.config.invalid_session_delay_max;
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn handle(&mut self, message: Message) -> Option<Disconnect> {
        log::trace!("Received {} message in {:?}", message.type_name(), self.stage);

        let can_resume = self.ctx.shared.lock().session.can_resume();

        let Transition { next, action } = match transition(self.stage, message, can_resume) {
            Ok(t) => t,
            Err(source) => {
                log::warn!("Gateway protocol violation: {}", source);
                return Some(Disconnect::reconnect(
                    true,
                    ConnectionError::Protocol { source },
                ));
            }
        };

        if next != ConnectionStage::Connected && next != self.stage {
            self.enter(next);
        }

        match action {
            Action::Identify { interval } => {
                log::info!("Identifying new session");
                let identify = self.ctx.credentials.identify();
                let result = self.enqueue(identify);
                self.start_heartbeat(interval);
                result
            }

            Action::Resume { interval } => {
                let resume = self.ctx.shared.lock().session.resume(&self.ctx.credentials);
                let result = match resume {
                    Some(resume) => {
                        log::info!("Resuming session");
                        self.enqueue(resume)
                    }
                    None => Some(Disconnect::reconnect(
                        false,
                        ConnectionError::InvalidSession { resumable: false },
                    )),
                };
                self.start_heartbeat(interval);
                result
            }

            Action::Ready(dispatch, ready) => {
                let resume_url = ready.resume_gateway_url.as_deref().and_then(|url| {
                    url.parse::<GatewayURLInfo>()
                        .map_err(|e| log::warn!("Ignore invalid resume url {}: {}", url, e))
                        .ok()
                });

                {
                    let mut state = self.ctx.shared.lock();
                    state.session.establish(ready.session_id.clone(), resume_url);
                    state.session.record_sequence(dispatch.sequence);
                }

                log::info!("Session {} ready", ready.session_id);

                self.established();
                self.deliver(GatewayEvent::Dispatch(dispatch.into()));
                None
            }

            Action::Resumed(dispatch) => {
                self.ctx.shared.lock().session.record_sequence(dispatch.sequence);

                log::info!("Session resumed");

                self.established();
                self.deliver(GatewayEvent::Dispatch(dispatch.into()));
                None
            }

            Action::Forward(dispatch) => {
                self.ctx.shared.lock().session.record_sequence(dispatch.sequence);
                self.deliver(GatewayEvent::Dispatch(dispatch.into()));
                None
            }

            Action::Heartbeat => {
                log::debug!("Gateway requested heartbeat");
                let heartbeat = {
                    let mut state = self.ctx.shared.lock();
                    state.heartbeat.requested();
                    state.session.heartbeat()
                };
                self.enqueue(heartbeat)
            }

            Action::Acknowledge => {
                let latency = {
                    let mut state = self.ctx.shared.lock();
                    state.heartbeat.acknowledged(Instant::now());
                    state.heartbeat.latency
                };
                log::trace!("Heartbeat acknowledged, latency {:?}", latency);
                None
            }

            Action::Reconnect => {
                log::info!("Gateway requested reconnect");
                Some(Disconnect::reconnect(true, ConnectionError::ServerReconnect))
            }

            Action::InvalidSession { resumable: true } => {
                log::info!("Session invalidated but resumable");
                Some(Disconnect::reconnect(
                    true,
                    ConnectionError::InvalidSession { resumable: true },
                ))
            }

            Action::InvalidSession { resumable: false } => {
                log::warn!("Session invalidated, will identify again");

                self.ctx.shared.lock().session.invalidate();
                self.deliver(GatewayEvent::SessionReset);

                Some(Disconnect::Reconnect {
                    resume: false,
                    delay: Some(self.invalid_session_delay()),
                    reason: ConnectionError::InvalidSession { resumable: false },
                })
            }
        }
    }

    fn established(&mut self) {
        self.established = true;
        self.deadline = None;
        self.enter(ConnectionStage::Connected);
    }

    fn closed(err: MessageStreamSinkError) -> Disconnect {
        let code = err.close_code();
        let reason = ConnectionError::MessageStream { source: err };

        match (code, close::classify(code)) {
            (Some(code), CloseAction::Fatal) => Disconnect::Rejected { code, reason },
            (_, CloseAction::Reidentify) => Disconnect::reconnect(false, reason),
            _ => Disconnect::reconnect(true, reason),
        }
    }

    async fn drive(
        &mut self,
        stream: &mut SplitStream<Messages<T>>,
        writer: &mut WriterTask<SplitSink<Messages<T>, Message>>,
    ) -> Disconnect {
        loop {
            let deadline = match self.deadline {
                Some(deadline) => time::sleep_until(deadline).boxed(),
                None => future::pending().boxed(),
            };
            let events = self.ctx.events.clone();

            tokio::select! {
                biased;

                _ = self.ctx.shutdown.wait() => {
                    log::debug!("Stop requested");
                    return Disconnect::Stopped;
                }

                _ = deadline => {
                    let reason = if self.stage == ConnectionStage::AwaitingHello {
                        ConnectionError::HelloTimeout
                    } else {
                        ConnectionError::ReadyTimeout
                    };
                    log::warn!("Handshake timeout in {:?}: {}", self.stage, reason);
                    return Disconnect::reconnect(true, reason);
                }

                _ = self.ctx.events.closed() => {
                    log::debug!("Event stream dropped");
                    return Disconnect::ConsumerGone;
                }

                exit = heartbeat_exited(&mut self.heartbeat) => {
                    let reason = match exit {
                        HeartbeatExit::Zombied => ConnectionError::Zombied,
                        _ => ConnectionError::WriterStopped,
                    };
                    return Disconnect::reconnect(true, reason);
                }

                permit = events.reserve(), if !self.backlog.is_empty() => {
                    let permit = match permit {
                        Some(permit) => permit,
                        None => {
                            log::debug!("Event stream dropped when deliver event");
                            return Disconnect::ConsumerGone;
                        }
                    };
                    if let Some(event) = self.backlog.pop_front() {
                        permit.send(event);
                    }
                }

                exit = writer.exited() => {
                    let reason = match exit {
                        Ok((_, Err(source))) => ConnectionError::MessageStream { source },
                        _ => ConnectionError::WriterStopped,
                    };
                    log::warn!("Writer exited: {}", reason);
                    return Disconnect::reconnect(true, reason);
                }

                item = stream.next() => {
                    match item {
                        Some(Ok(message)) => {
                            if let Some(disconnect) = self.handle(message) {
                                return disconnect;
                            }
                        }
                        Some(Err(err)) if !err.is_fatal() => {
                            log::warn!("Message stream error happened but ignored: {}", err);
                        }
                        Some(Err(err)) => {
                            log::warn!("Find message stream broken when receive message: {}", err);
                            return Self::closed(err);
                        }
                        None => {
                            log::warn!("Message stream ended");
                            return Disconnect::reconnect(true, ConnectionError::TransportClosed);
                        }
                    }
                }
            }
        }
    }
}

impl<'a, T: Transport> ClientInner<ClientStateConnected<'a, T>> {
    pub async fn run(self) -> ConnectionEnd {
        let ClientStateConnected { ctx, socket } = self.state;

        let (sink, mut stream) = MessageStreamSink::new(socket).split();
        let (mut writer, outbox) = WriterTask::spawn(sink);

        let mut conn = Connection {
            deadline: Some(Instant::now() + ctx.config.hello_timeout),
            ctx,
            stage: ConnectionStage::Connecting,
            outbox,
            heartbeat: None,
            established: false,
            backlog: VecDeque::new(),
        };
        conn.enter(ConnectionStage::AwaitingHello);

        let disconnect = conn.drive(&mut stream, &mut writer).await;

        log::debug!("Connection ending: {:?}", disconnect);

        conn.enter(ConnectionStage::Disconnecting);

        if let Some(heartbeat) = conn.heartbeat.take() {
            heartbeat.stop().await;
        }

        let close_timeout = conn.ctx.config.close_timeout;
        let code = disconnect.close_code();
        let established = conn.established;

        if let Some(sink) = writer.stop().await {
            match sink.reunite(stream) {
                Ok(messages) => close_socket(messages.into_inner(), code, close_timeout).await,
                Err(err) => log::warn!("Can not reunite websocket halves: {}", err),
            }
        }

        let disconnect = if disconnect.delivers_backlog() {
            conn.flush().await.unwrap_or(disconnect)
        } else {
            disconnect
        };

        ConnectionEnd {
            established,
            disconnect,
        }
    }
}

async fn close_socket<S>(mut socket: S, code: u16, timeout: Duration)
where
    S: futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: "".into(),
    };

    log::debug!("Close websocket with code {}", code);

    match time::timeout(timeout, socket.send(tungstenite::Message::Close(Some(frame)))).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::debug!("Send close frame failed: {}", err),
        Err(_) => log::debug!("Send close frame timed out"),
    }
}
