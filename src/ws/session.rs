//! Resumable session identity and heartbeat bookkeeping.

use std::{fmt::Debug, time::Duration};

use serde_json::Value;
use tokio::time::Instant;

use super::{
    message::{ConnectionProperties, Identify, Message, Resume},
    url::GatewayURLInfo,
};
use crate::config::DEFAULT_LARGE_THRESHOLD;

/// Identity presented to the gateway on identify and resume
#[derive(Clone)]
pub struct Credentials {
    /// bot token
    pub token: String,
    /// intents bitmask
    pub intents: u64,
    /// `[shard_id, shard_count]`
    pub shard: Option<[u32; 2]>,
    /// request zlib compressed payloads
    pub compress: bool,
    /// member count above which a guild is sent without offline members
    pub large_threshold: u8,
    /// connection properties
    pub properties: ConnectionProperties,
    /// initial presence
    pub presence: Option<Value>,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .finish()
    }
}

impl Credentials {
    /// Credentials with given token and intents, defaults for everything else
    pub fn new<S: AsRef<str> + ?Sized>(token: &S, intents: u64) -> Self {
        Self {
            token: token.as_ref().to_string(),
            intents,
            shard: None,
            compress: false,
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            properties: ConnectionProperties::default(),
            presence: None,
        }
    }

    /// Run as shard `id` of `total`
    pub fn with_shard(mut self, id: u32, total: u32) -> Self {
        self.shard = Some([id, total]);
        self
    }

    /// Request zlib compressed payloads
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set initial presence
    pub fn with_presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }

    pub(crate) fn identify(&self) -> Message {
        Message::Identify(Box::new(Identify {
            token: self.token.clone(),
            properties: self.properties.clone(),
            compress: self.compress,
            large_threshold: self.large_threshold,
            shard: self.shard,
            presence: self.presence.clone(),
            intents: self.intents,
        }))
    }
}

/// Resumable identity of the current gateway session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// session id from READY
    pub session_id: Option<String>,
    /// last dispatch sequence number seen in this session
    pub last_sequence: Option<u64>,
    /// url to resume this session on
    pub resume_url: Option<GatewayURLInfo>,
    /// true between READY/RESUMED and the following disconnect
    pub connected: bool,
}

impl SessionState {
    /// Session of a previous run, to be resumed on next connect
    pub fn resumable(session_id: impl Into<String>, last_sequence: Option<u64>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            last_sequence,
            resume_url: None,
            connected: false,
        }
    }

    /// true if a resume can be attempted with this state
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some()
    }

    pub(crate) fn record_sequence(&mut self, sequence: u64) {
        self.last_sequence = Some(self.last_sequence.map_or(sequence, |s| s.max(sequence)));
    }

    pub(crate) fn establish(&mut self, session_id: String, resume_url: Option<GatewayURLInfo>) {
        if self.session_id.as_deref() != Some(session_id.as_str()) {
            self.last_sequence = None;
        }
        self.session_id = Some(session_id);
        self.resume_url = resume_url;
    }

    pub(crate) fn invalidate(&mut self) {
        self.session_id = None;
        self.last_sequence = None;
        self.resume_url = None;
    }

    pub(crate) fn resume(&self, credentials: &Credentials) -> Option<Message> {
        let session_id = self.session_id.clone()?;
        Some(Message::Resume(Resume {
            token: credentials.token.clone(),
            session_id,
            seq: self.last_sequence,
        }))
    }

    pub(crate) fn heartbeat(&self) -> Message {
        Message::Heartbeat(self.last_sequence)
    }
}

/// Heartbeat bookkeeping of current connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatContext {
    /// period from hello
    pub interval: Duration,
    /// a heartbeat was sent and its ack has not come yet
    pub ack_pending: bool,
    /// when the last heartbeat was sent
    pub last_sent_at: Option<Instant>,
    /// round trip of last acknowledged heartbeat
    pub latency: Option<Duration>,
    /// unacknowledged replies to server requests sent before the pending heartbeat
    requests_before: u32,
    /// and those sent after it
    requests_after: u32,
}

impl HeartbeatContext {
    pub(crate) fn start(&mut self, interval: Duration) {
        *self = Self {
            interval,
            latency: self.latency,
            ..Self::default()
        };
    }

    pub(crate) fn sent(&mut self, at: Instant) {
        self.ack_pending = true;
        self.last_sent_at = Some(at);
        self.requests_before += std::mem::take(&mut self.requests_after);
    }

    /// A heartbeat was sent because the server asked for one
    pub(crate) fn requested(&mut self) {
        if self.ack_pending {
            self.requests_after += 1;
        } else {
            self.requests_before += 1;
        }
    }

    /// Acks come in send order, only the one of the scheduled heartbeat clears `ack_pending`
    pub(crate) fn acknowledged(&mut self, at: Instant) {
        if self.requests_before > 0 {
            self.requests_before -= 1;
            return;
        }

        if !self.ack_pending {
            log::debug!("Heartbeat ack without pending heartbeat, ignored");
            return;
        }

        self.ack_pending = false;
        self.requests_before = std::mem::take(&mut self.requests_after);
        if let Some(sent) = self.last_sent_at {
            self.latency = Some(at.saturating_duration_since(sent));
        }
    }
}

/// Protocol state of the connection manager
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStage {
    /// no connection
    #[default]
    Disconnected,
    /// websocket being established
    Connecting,
    /// websocket up, waiting for hello
    AwaitingHello,
    /// identify sent, waiting for READY
    Identifying,
    /// resume sent, waiting for RESUMED
    Resuming,
    /// session established, dispatches flowing
    Connected,
    /// connection being torn down
    Disconnecting,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_sequence_keeps_maximum() {
        let mut session = SessionState::default();

        for seq in [1, 2, 2, 5, 5, 9] {
            session.record_sequence(seq);
        }
        assert_eq!(session.last_sequence, Some(9));

        session.record_sequence(3);
        assert_eq!(session.last_sequence, Some(9));
    }

    #[test]
    fn test_invalidate_clears_identity() {
        let mut session = SessionState::resumable("abc", Some(42));
        session.resume_url = Some("wss://resume.example.com".parse().unwrap());

        assert!(session.can_resume());
        session.invalidate();

        assert!(!session.can_resume());
        assert_eq!(session.last_sequence, None);
        assert_eq!(session.resume_url, None);
    }

    #[test]
    fn test_establish_new_session_resets_sequence() {
        let mut session = SessionState::resumable("old", Some(42));

        session.establish("old".to_string(), None);
        assert_eq!(session.last_sequence, Some(42));

        session.establish("new".to_string(), None);
        assert_eq!(session.last_sequence, None);
        assert_eq!(session.session_id.as_deref(), Some("new"));
    }

    #[test]
    fn test_resume_message_carries_session() {
        let session = SessionState::resumable("abc", Some(42));
        let credentials = Credentials::new("tk", 0);

        let resume = session.resume(&credentials).unwrap().into_resume().unwrap();

        assert_eq!(resume.session_id, "abc");
        assert_eq!(resume.seq, Some(42));
        assert!(SessionState::default().resume(&credentials).is_none());
    }

    #[test]
    fn test_heartbeat_context_latency() {
        let mut hb = HeartbeatContext::default();
        let now = Instant::now();

        hb.start(Duration::from_secs(41));
        hb.sent(now);
        assert!(hb.ack_pending);

        hb.acknowledged(now + Duration::from_millis(80));
        assert!(!hb.ack_pending);
        assert_eq!(hb.latency, Some(Duration::from_millis(80)));
        assert_eq!(hb.interval, Duration::from_secs(41));
    }

    #[test]
    fn test_requested_heartbeat_ack_does_not_count_for_scheduled() {
        let mut hb = HeartbeatContext::default();
        let now = Instant::now();

        hb.start(Duration::from_secs(41));
        hb.requested();
        hb.sent(now + Duration::from_millis(100));

        // ack of the requested reply
        hb.acknowledged(now + Duration::from_millis(120));
        assert!(hb.ack_pending);
        assert_eq!(hb.latency, None);

        hb.requested();
        hb.acknowledged(now + Duration::from_millis(150));
        assert!(!hb.ack_pending);
        assert_eq!(hb.latency, Some(Duration::from_millis(50)));

        // ack of the reply sent while scheduled one was pending
        hb.acknowledged(now + Duration::from_millis(160));
        hb.sent(now + Duration::from_millis(200));
        hb.acknowledged(now + Duration::from_millis(230));
        assert!(!hb.ack_pending);
        assert_eq!(hb.latency, Some(Duration::from_millis(30)));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let credentials = Credentials::new("secret-token", 1).with_shard(0, 1);

        assert!(!format!("{:?}", credentials).contains("secret-token"));
    }
}
