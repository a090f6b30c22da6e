//! What a websocket close code means for the session.

/// Close code sent by client when it leaves for good, session ends
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code sent by client before reconnecting, session stays resumable
pub const CLOSE_RESUMABLE: u16 = 4000;

/// Follow-up a close code asks for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloseAction {
    /// reconnect and resume the session
    Resume,
    /// session is gone, reconnect with fresh identify
    Reidentify,
    /// the gateway will keep rejecting us, give up
    Fatal,
}

/// Classify a close code received from gateway
pub fn classify(code: Option<u16>) -> CloseAction {
    match code {
        // authentication failed, invalid shard, sharding required,
        // invalid api version, invalid intents, disallowed intents
        Some(4004 | 4010 | 4011 | 4012 | 4013 | 4014) => CloseAction::Fatal,
        // invalid seq, session timed out
        Some(4007 | 4009) => CloseAction::Reidentify,
        _ => CloseAction::Resume,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify_close_codes() {
        assert_eq!(classify(Some(4004)), CloseAction::Fatal);
        assert_eq!(classify(Some(4014)), CloseAction::Fatal);
        assert_eq!(classify(Some(4007)), CloseAction::Reidentify);
        assert_eq!(classify(Some(4009)), CloseAction::Reidentify);
        assert_eq!(classify(Some(4000)), CloseAction::Resume);
        assert_eq!(classify(Some(1006)), CloseAction::Resume);
        assert_eq!(classify(None), CloseAction::Resume);
    }
}
