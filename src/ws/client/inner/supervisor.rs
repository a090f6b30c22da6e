use tokio::time::{self, Instant};

use super::{
    disconnect::{ConnectionEnd, Disconnect},
    init::ClientStateInit,
    reconnect::{Plan, ReconnectController},
    ClientInner, Context, GatewayEvent,
};
use crate::{
    ws::{session::ConnectionStage, transport::Transport, url::GatewayURLInfo},
    Error,
};

/// Background task keeping a gateway connection alive until stopped
#[derive(Debug)]
pub(crate) struct Supervisor<T> {
    ctx: Context<T>,
    controller: ReconnectController,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(ctx: Context<T>) -> Self {
        Self {
            controller: ReconnectController::new(&ctx.config),
            ctx,
        }
    }

    /// Deliver to consumer unless stop is requested first
    async fn emit(&mut self, item: Result<GatewayEvent, Error>) -> bool {
        let events = &self.ctx.events;
        let shutdown = &mut self.ctx.shutdown;

        tokio::select! {
            biased;

            _ = shutdown.wait() => false,

            sent = async {
                match item {
                    Ok(event) => events.send_event(event).await,
                    Err(err) => events.send_err(err).await,
                }
            } => sent,
        }
    }

    async fn connect_once(&mut self, url: GatewayURLInfo) -> Option<ConnectionEnd> {
        let mut shutdown = self.ctx.shutdown.clone();

        let connect = ClientInner {
            state: ClientStateInit {
                ctx: &mut self.ctx,
                url,
            },
        }
        .connect();

        let connected = tokio::select! {
            biased;

            _ = shutdown.wait() => return None,
            connected = connect => connected,
        };

        let end = match connected {
            Ok(inner) => inner.run().await,
            Err(reason) => {
                log::warn!("Connect gateway failed: {}", reason);
                ConnectionEnd {
                    established: false,
                    disconnect: Disconnect::reconnect(true, reason),
                }
            }
        };

        Some(end)
    }

    pub async fn run(mut self) {
        log::debug!("Supervisor start");

        let mut url = self.ctx.gateway.clone();
        let mut keep_session = false;

        loop {
            let end = match self.connect_once(url.clone()).await {
                Some(end) => end,
                None => break,
            };

            self.ctx.shared.enter(ConnectionStage::Disconnected, None);

            if end.established {
                self.controller.reset();
            }

            let (resume, min_delay, reason) = match end.disconnect {
                Disconnect::Stopped => {
                    log::info!("Gateway stopped");
                    break;
                }
                Disconnect::ConsumerGone => {
                    log::info!("Event stream dropped, gateway stop");
                    break;
                }
                Disconnect::Rejected { code, reason } => {
                    log::error!("Gateway rejected connection with close code {}", code);
                    self.emit(Err(Error::GatewayRejected {
                        code,
                        source: reason,
                    }))
                    .await;
                    break;
                }
                Disconnect::Reconnect {
                    resume,
                    delay,
                    reason,
                } => (resume, delay, reason),
            };

            log::warn!("Gateway connection lost: {}", reason);

            let can_resume = self.ctx.shared.lock().session.can_resume();

            let (resume, delay) =
                match self
                    .controller
                    .plan(resume, can_resume, min_delay, Instant::now())
                {
                    Plan::Retry { resume, delay } => (resume, delay),
                    Plan::GiveUp { attempts } => {
                        log::error!("Give up reconnecting after {} attempts", attempts);
                        keep_session = true;
                        self.emit(Err(Error::RetriesExhausted {
                            attempts,
                            source: reason,
                        }))
                        .await;
                        break;
                    }
                };

            if !resume {
                let had_session = {
                    let mut state = self.ctx.shared.lock();
                    let had_session = state.session.can_resume();
                    state.session.invalidate();
                    had_session
                };

                if had_session && !self.emit(Ok(GatewayEvent::SessionReset)).await {
                    break;
                }
            }

            url = match self.ctx.shared.lock().session.resume_url.clone() {
                Some(resume_url) if resume => resume_url,
                _ => self.ctx.gateway.clone(),
            };

            log::info!(
                "Reconnect to {} in {:?}, resume: {}",
                url,
                delay,
                resume
            );

            tokio::select! {
                biased;

                _ = self.ctx.shutdown.wait() => break,
                _ = self.ctx.events.closed() => break,
                _ = time::sleep(delay) => {}
            }
        }

        let mut state = self.ctx.shared.lock();
        if !keep_session {
            state.session.invalidate();
        }
        state.stage = ConnectionStage::Disconnected;
        state.session.connected = false;
        state.outbox = None;

        log::debug!("Supervisor stop");
    }
}
