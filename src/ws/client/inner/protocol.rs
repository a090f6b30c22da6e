//! Transition table of the gateway protocol.

use std::time::Duration;

use snafu::prelude::*;

use crate::ws::{
    message::{Dispatch, Message, Opcode, Ready},
    session::ConnectionStage,
};

/// Gateway sent something the protocol does not allow
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ProtocolViolation {
    /// message not allowed in current stage
    #[snafu(display("unexpected {opcode} message in {stage:?} stage"))]
    UnexpectedMessage {
        /// stage when message arrived
        stage: ConnectionStage,
        /// opcode of the message
        opcode: Opcode,
    },

    /// hello asked for a zero heartbeat interval
    #[snafu(display("hello message has zero heartbeat interval"))]
    ZeroHeartbeatInterval,

    /// READY payload has no usable session id
    #[snafu(display("malformed READY payload: {source}"))]
    MalformedReady {
        /// source error
        source: serde_json::Error,
    },
}

#[derive(Debug, PartialEq)]
pub(crate) enum Action {
    /// start heartbeat and send identify
    Identify { interval: Duration },
    /// start heartbeat and send resume
    Resume { interval: Duration },
    /// new session established
    Ready(Dispatch, Ready),
    /// old session resumed
    Resumed(Dispatch),
    /// deliver to consumer
    Forward(Dispatch),
    /// gateway wants a heartbeat now
    Heartbeat,
    Acknowledge,
    Reconnect,
    InvalidSession { resumable: bool },
}

#[derive(Debug, PartialEq)]
pub(crate) struct Transition {
    pub next: ConnectionStage,
    pub action: Action,
}

impl Transition {
    fn stay(stage: ConnectionStage, action: Action) -> Self {
        Self {
            next: stage,
            action,
        }
    }

    fn to(next: ConnectionStage, action: Action) -> Self {
        Self { next, action }
    }
}

/// Decide what a received message means in current stage.
///
/// `can_resume` is only consulted on hello, to pick between identify and resume.
pub(crate) fn transition(
    stage: ConnectionStage,
    message: Message,
    can_resume: bool,
) -> Result<Transition, ProtocolViolation> {
    use ConnectionStage::*;

    let opcode = message.opcode();

    let transition = match (stage, message) {
        (AwaitingHello, Message::Hello(hello)) => {
            ensure!(hello.heartbeat_interval > 0, error::ZeroHeartbeatInterval);
            let interval = Duration::from_millis(hello.heartbeat_interval);
            if can_resume {
                Transition::to(Resuming, Action::Resume { interval })
            } else {
                Transition::to(Identifying, Action::Identify { interval })
            }
        }

        (Identifying, Message::Dispatch(dispatch)) if dispatch.is_ready() => {
            let ready = serde_json::from_value(dispatch.data.clone()).context(error::MalformedReady)?;
            Transition::to(Connected, Action::Ready(dispatch, ready))
        }

        (Resuming, Message::Dispatch(dispatch)) if dispatch.is_resumed() => {
            Transition::to(Connected, Action::Resumed(dispatch))
        }

        // resume replays missed dispatches before RESUMED
        (Resuming | Connected, Message::Dispatch(dispatch)) => {
            Transition::stay(stage, Action::Forward(dispatch))
        }

        (AwaitingHello | Identifying | Resuming | Connected, Message::Heartbeat(_)) => {
            Transition::stay(stage, Action::Heartbeat)
        }

        (Identifying | Resuming | Connected, Message::HeartbeatAck) => {
            Transition::stay(stage, Action::Acknowledge)
        }

        (AwaitingHello | Identifying | Resuming | Connected, Message::Reconnect) => {
            Transition::to(Disconnecting, Action::Reconnect)
        }

        (Identifying | Resuming | Connected, Message::InvalidSession(resumable)) => {
            Transition::to(Disconnecting, Action::InvalidSession { resumable })
        }

        _ => return error::UnexpectedMessage { stage, opcode }.fail(),
    };

    Ok(transition)
}
