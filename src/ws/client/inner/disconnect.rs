use std::time::Duration;

use snafu::prelude::*;
use tokio_tungstenite::tungstenite;

use super::protocol::ProtocolViolation;
use crate::ws::message::MessageStreamSinkError;

/// Why a single gateway connection ended
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ConnectionError {
    /// open websocket connection failed
    #[snafu(display("connect to gateway {url} failed: {source}"))]
    ConnectGateway {
        /// gateway url
        url: String,
        /// source error
        source: tungstenite::Error,
    },

    /// open websocket connection took too long
    #[snafu(display("connect to gateway {url} timed out"))]
    ConnectTimeout {
        /// gateway url
        url: String,
    },

    /// no hello received in time after connect
    #[snafu(display("timeout when wait server hello message"))]
    HelloTimeout,

    /// no READY or RESUMED received in time after identify or resume
    #[snafu(display("timeout when wait session ready"))]
    ReadyTimeout,

    /// underlying message stream broken
    #[snafu(display("underlying message stream broken: {source}"))]
    MessageStream {
        /// source error
        source: MessageStreamSinkError,
    },

    /// peer ended the connection without close frame
    #[snafu(display("websocket connection ended by peer"))]
    TransportClosed,

    /// last heartbeat was never acknowledged
    #[snafu(display("heartbeat not acknowledged, connection zombied"))]
    Zombied,

    /// gateway asked us to reconnect
    #[snafu(display("received server reconnect request"))]
    ServerReconnect,

    /// gateway invalidated the session
    #[snafu(display("received invalid session, resumable: {resumable}"))]
    InvalidSession {
        /// session can still be resumed
        resumable: bool,
    },

    /// gateway broke the protocol
    #[snafu(display("gateway protocol violation: {source}"))]
    Protocol {
        /// source error
        source: ProtocolViolation,
    },

    /// outgoing frames can not be written anymore
    #[snafu(display("message writer stopped unexpectedly"))]
    WriterStopped,
}

impl ConnectionError {
    /// Close code received from gateway, if this was caused by a close frame
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::MessageStream { source } => source.close_code(),
            _ => None,
        }
    }
}

/// What the supervisor should do after a connection ended
#[derive(Debug)]
pub(crate) enum Disconnect {
    /// stop requested by owner
    Stopped,
    /// event stream dropped, nobody is listening anymore
    ConsumerGone,
    /// connection lost, try again
    Reconnect {
        resume: bool,
        /// minimal wait before next attempt
        delay: Option<Duration>,
        reason: ConnectionError,
    },
    /// gateway closed with a code we can not recover from
    Rejected { code: u16, reason: ConnectionError },
}

impl Disconnect {
    pub fn reconnect(resume: bool, reason: ConnectionError) -> Self {
        Self::Reconnect {
            resume,
            delay: None,
            reason,
        }
    }

    /// Close code this client sends when tearing the connection down
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Stopped | Self::ConsumerGone | Self::Rejected { .. } => {
                crate::ws::close::CLOSE_NORMAL
            }
            Self::Reconnect { .. } => crate::ws::close::CLOSE_RESUMABLE,
        }
    }

    /// Events received before the connection ended still reach consumer
    pub fn delivers_backlog(&self) -> bool {
        matches!(self, Self::Reconnect { .. } | Self::Rejected { .. })
    }
}

#[derive(Debug)]
pub(crate) struct ConnectionEnd {
    /// connection reached connected stage at least once
    pub established: bool,
    pub disconnect: Disconnect,
}
