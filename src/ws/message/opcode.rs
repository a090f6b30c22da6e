use std::fmt::Display;

/// Gateway opcode, the `op` field of every frame.
///
/// Values are fixed by the wire protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// An event was dispatched, server -> client
    Dispatch = 0,
    /// Heartbeat, both directions (server side means "send one now")
    Heartbeat = 1,
    /// Start a new session, client -> server
    Identify = 2,
    /// Update presence, client -> server
    PresenceUpdate = 3,
    /// Join/leave/move voice channels, client -> server
    VoiceStateUpdate = 4,
    /// Voice ping, legacy
    VoicePing = 5,
    /// Resume a previous session, client -> server
    Resume = 6,
    /// Server asks client to reconnect and resume, server -> client
    Reconnect = 7,
    /// Request guild member chunks, client -> server
    RequestGuildMembers = 8,
    /// Session has been invalidated, server -> client
    InvalidSession = 9,
    /// First frame after connect, carries heartbeat interval, server -> client
    Hello = 10,
    /// Heartbeat acknowledged, server -> client
    HeartbeatAck = 11,
}

impl Opcode {
    /// Map a wire number to opcode, `None` for unknown numbers
    pub fn from_number(op: u64) -> Option<Self> {
        let op = match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            5 => Self::VoicePing,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        };
        Some(op)
    }

    /// Wire number of this opcode
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Human readable name, for logging
    pub fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::VoicePing => "VoicePing",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.number())
    }
}
