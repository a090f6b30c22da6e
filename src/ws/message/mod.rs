//! Gateway wire frames.

mod opcode;
mod stream;
mod types;

pub use opcode::Opcode;
pub use stream::{MessageStreamSink, MessageStreamSinkError};
pub use types::{ConnectionProperties, Dispatch, Hello, Identify, Ready, Resume};

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use miniz_oxide::inflate::{self, TINFLStatus};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use snafu::prelude::*;

/// Error when parse frame data as message
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)), module(error), context(suffix(false)))]
pub enum ParseMessageError {
    /// Decompress data failed
    #[snafu(display("decompress message failed: {status:?}"))]
    DecompressFailed {
        /// data for decode
        data: Bytes,
        /// decompress error status code
        status: TINFLStatus,
    },

    /// data is invalid json
    #[snafu(display("parse json failed: {source:?}"))]
    ParseJSONFailed {
        /// data for decode
        data: Bytes,
        /// source error
        source: serde_json::Error,
    },

    /// data json is not an object
    #[snafu(display("parsed message is not object: {json}"))]
    MessageNotObject {
        /// json string
        json: String,
    },

    /// data json has no op field
    #[snafu(display("message has no op field: {json}"))]
    NoOpcode {
        /// json string
        json: String,
    },

    /// data json op field is not an unsigned number
    #[snafu(display("message has non-number op field: {json}"))]
    OpcodeNotNumber {
        /// json string
        json: String,
    },

    /// data json has an unknown opcode
    #[snafu(display("message has unknown opcode {op}"))]
    UnknownOpcode {
        /// opcode number
        op: u64,
    },

    /// dispatch message lacks a field it must carry
    #[snafu(display("dispatch message has no {field} field"))]
    DispatchMissingField {
        /// field name
        field: &'static str,
    },

    /// d field does not match the shape of its opcode
    #[snafu(display("parse data of {opcode} message failed: {source}"))]
    ParseJSONToTypedMessageFailed {
        /// opcode of the message
        opcode: Opcode,
        /// source error
        source: serde_json::Error,
    },
}

/// Gateway protocol message, one variant per opcode
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Message {
    /// Event, server -> client
    Dispatch(Dispatch),
    /// Heartbeat with last sequence, both directions
    Heartbeat(Option<u64>),
    /// Identify, client -> server
    Identify(Box<Identify>),
    /// Presence update, client -> server
    PresenceUpdate(Value),
    /// Voice state update, client -> server
    VoiceStateUpdate(Value),
    /// Voice ping, legacy
    VoicePing(Value),
    /// Resume, client -> server
    Resume(Resume),
    /// Reconnect request, server -> client
    Reconnect,
    /// Request guild members, client -> server
    RequestGuildMembers(Value),
    /// Invalid session with its resumable flag, server -> client
    InvalidSession(bool),
    /// Hello, server -> client
    Hello(Hello),
    /// Heartbeat ACK, server -> client
    HeartbeatAck,
}

#[derive(Serialize)]
struct OutgoingFrame<'a> {
    op: u8,
    d: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    t: Option<&'a str>,
}

fn typed<T: DeserializeOwned>(opcode: Opcode, data: Value) -> Result<T, ParseMessageError> {
    serde_json::from_value(data).context(error::ParseJSONToTypedMessageFailed { opcode })
}

impl Message {
    /// Decode data to a message, `compressed` data is a zlib stream of the json text
    pub fn decode(mut buff: Bytes, compressed: bool) -> Result<Self, ParseMessageError> {
        if compressed {
            buff = inflate::decompress_to_vec_zlib(&buff)
                .map_err(|e| ParseMessageError::DecompressFailed {
                    data: buff.clone(),
                    status: e,
                })?
                .into();
        }

        let mut value: Value =
            serde_json::from_slice(&buff).context(error::ParseJSONFailed { data: buff.clone() })?;

        let obj = value
            .as_object_mut()
            .with_context(|| error::MessageNotObject {
                json: String::from_utf8_lossy(&buff),
            })?;

        let op = obj
            .get("op")
            .with_context(|| error::NoOpcode {
                json: String::from_utf8_lossy(&buff),
            })?
            .as_u64()
            .with_context(|| error::OpcodeNotNumber {
                json: String::from_utf8_lossy(&buff),
            })?;

        let opcode = Opcode::from_number(op).context(error::UnknownOpcode { op })?;

        let sequence = obj.get("s").and_then(Value::as_u64);
        let event = obj.get("t").and_then(Value::as_str).map(str::to_string);
        let data = obj.remove("d").unwrap_or(Value::Null);

        Self::from_parts(opcode, sequence, event, data)
    }

    fn from_parts(
        opcode: Opcode,
        sequence: Option<u64>,
        event: Option<String>,
        data: Value,
    ) -> Result<Self, ParseMessageError> {
        let message = match opcode {
            Opcode::Dispatch => Self::Dispatch(Dispatch {
                sequence: sequence.context(error::DispatchMissingField { field: "s" })?,
                event: event.context(error::DispatchMissingField { field: "t" })?,
                data,
            }),
            Opcode::Heartbeat => Self::Heartbeat(typed(opcode, data)?),
            Opcode::Identify => Self::Identify(Box::new(typed(opcode, data)?)),
            Opcode::PresenceUpdate => Self::PresenceUpdate(data),
            Opcode::VoiceStateUpdate => Self::VoiceStateUpdate(data),
            Opcode::VoicePing => Self::VoicePing(data),
            Opcode::Resume => Self::Resume(typed(opcode, data)?),
            Opcode::Reconnect => Self::Reconnect,
            Opcode::RequestGuildMembers => Self::RequestGuildMembers(data),
            Opcode::InvalidSession => {
                Self::InvalidSession(typed::<Option<bool>>(opcode, data)?.unwrap_or(false))
            }
            Opcode::Hello => Self::Hello(typed(opcode, data)?),
            Opcode::HeartbeatAck => Self::HeartbeatAck,
        };

        Ok(message)
    }

    /// encode to json text frame (without compress)
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let (d, s, t) = match self {
            Self::Dispatch(dispatch) => (
                dispatch.data.clone(),
                Some(dispatch.sequence),
                Some(dispatch.event.as_str()),
            ),
            Self::Heartbeat(seq) => (serde_json::to_value(seq)?, None, None),
            Self::Identify(identify) => (serde_json::to_value(identify)?, None, None),
            Self::PresenceUpdate(data)
            | Self::VoiceStateUpdate(data)
            | Self::VoicePing(data)
            | Self::RequestGuildMembers(data) => (data.clone(), None, None),
            Self::Resume(resume) => (serde_json::to_value(resume)?, None, None),
            Self::Reconnect | Self::HeartbeatAck => (Value::Null, None, None),
            Self::InvalidSession(resumable) => (Value::Bool(*resumable), None, None),
            Self::Hello(hello) => (serde_json::to_value(hello)?, None, None),
        };

        serde_json::to_string(&OutgoingFrame {
            op: self.opcode().number(),
            d,
            s,
            t,
        })
    }

    /// get opcode
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Dispatch(_) => Opcode::Dispatch,
            Self::Heartbeat(_) => Opcode::Heartbeat,
            Self::Identify(_) => Opcode::Identify,
            Self::PresenceUpdate(_) => Opcode::PresenceUpdate,
            Self::VoiceStateUpdate(_) => Opcode::VoiceStateUpdate,
            Self::VoicePing(_) => Opcode::VoicePing,
            Self::Resume(_) => Opcode::Resume,
            Self::Reconnect => Opcode::Reconnect,
            Self::RequestGuildMembers(_) => Opcode::RequestGuildMembers,
            Self::InvalidSession(_) => Opcode::InvalidSession,
            Self::Hello(_) => Opcode::Hello,
            Self::HeartbeatAck => Opcode::HeartbeatAck,
        }
    }

    /// get type name
    pub fn type_name(&self) -> &'static str {
        self.opcode().name()
    }
}

#[cfg(test)]
mod test {
    mod decode {
        use super::super::*;
        use serde_json::json;

        fn bytes_of(value: Value) -> Bytes {
            serde_json::to_vec(&value).unwrap().into()
        }

        #[test]
        fn test_message_decode_hello() {
            let data = bytes_of(json!({
                "op": 10,
                "d": {
                    "heartbeat_interval": 41250,
                },
            }));

            let msg = Message::decode(data, false).unwrap();

            assert_eq!(
                msg.into_hello().unwrap(),
                Hello {
                    heartbeat_interval: 41250
                }
            );
        }

        #[test]
        fn test_message_decode_dispatch() {
            let data = bytes_of(json!({
                "op": 0,
                "s": 42,
                "t": "MESSAGE_CREATE",
                "d": {"content": "hi"},
            }));

            let dispatch = Message::decode(data, false)
                .unwrap()
                .into_dispatch()
                .unwrap();

            assert_eq!(dispatch.sequence, 42);
            assert_eq!(dispatch.event, "MESSAGE_CREATE");
            assert_eq!(dispatch.data, json!({"content": "hi"}));
        }

        #[test]
        fn test_message_decode_dispatch_without_sequence() {
            let data = bytes_of(json!({
                "op": 0,
                "s": null,
                "t": "MESSAGE_CREATE",
                "d": {},
            }));

            let err = Message::decode(data, false).unwrap_err();

            assert!(matches!(
                err,
                ParseMessageError::DispatchMissingField { field: "s" }
            ));
        }

        #[test]
        fn test_message_decode_heartbeat_request() {
            let data = bytes_of(json!({"op": 1, "d": null}));
            assert_eq!(
                Message::decode(data, false).unwrap(),
                Message::Heartbeat(None)
            );

            let data = bytes_of(json!({"op": 1, "d": 7}));
            assert_eq!(
                Message::decode(data, false).unwrap(),
                Message::Heartbeat(Some(7))
            );
        }

        #[test]
        fn test_message_decode_invalid_session() {
            let data = bytes_of(json!({"op": 9, "d": true}));
            assert_eq!(
                Message::decode(data, false).unwrap(),
                Message::InvalidSession(true)
            );

            let data = bytes_of(json!({"op": 9, "d": false}));
            assert_eq!(
                Message::decode(data, false).unwrap(),
                Message::InvalidSession(false)
            );
        }

        #[test]
        fn test_message_decode_reconnect_and_ack() {
            let data = bytes_of(json!({"op": 7, "d": null}));
            assert!(Message::decode(data, false).unwrap().is_reconnect());

            let data = bytes_of(json!({"op": 11}));
            assert!(Message::decode(data, false).unwrap().is_heartbeat_ack());
        }

        #[test]
        fn test_message_decode_unknown_opcode() {
            let data = bytes_of(json!({"op": 42, "d": null}));

            let err = Message::decode(data, false).unwrap_err();

            assert!(matches!(err, ParseMessageError::UnknownOpcode { op: 42 }));
        }

        #[test]
        fn test_message_decode_bad_hello_data() {
            let data = bytes_of(json!({"op": 10, "d": {"interval": 1}}));

            let err = Message::decode(data, false).unwrap_err();

            assert!(matches!(
                err,
                ParseMessageError::ParseJSONToTypedMessageFailed {
                    opcode: Opcode::Hello,
                    ..
                }
            ));
        }

        #[test]
        fn test_message_decode_not_object() {
            let err = Message::decode(bytes_of(json!([1, 2])), false).unwrap_err();
            assert!(matches!(err, ParseMessageError::MessageNotObject { .. }));

            let err = Message::decode(bytes_of(json!({"d": 1})), false).unwrap_err();
            assert!(matches!(err, ParseMessageError::NoOpcode { .. }));

            let err = Message::decode(bytes_of(json!({"op": "x"})), false).unwrap_err();
            assert!(matches!(err, ParseMessageError::OpcodeNotNumber { .. }));
        }

        #[test]
        fn test_message_decode_compressed() {
            let raw = serde_json::to_vec(&json!({"op": 11})).unwrap();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);

            let msg = Message::decode(compressed.into(), true).unwrap();

            assert!(msg.is_heartbeat_ack());
        }

        #[test]
        fn test_message_decode_broken_compressed() {
            let err = Message::decode(Bytes::from_static(b"not zlib"), true).unwrap_err();

            assert!(matches!(err, ParseMessageError::DecompressFailed { .. }));
        }
    }

    mod encode {
        use super::super::*;
        use serde_json::json;

        fn encoded(msg: &Message) -> Value {
            serde_json::from_str(&msg.encode().unwrap()).unwrap()
        }

        #[test]
        fn test_message_encode_heartbeat() {
            assert_eq!(
                encoded(&Message::Heartbeat(Some(251))),
                json!({"op": 1, "d": 251})
            );
            assert_eq!(
                encoded(&Message::Heartbeat(None)),
                json!({"op": 1, "d": null})
            );
        }

        #[test]
        fn test_message_encode_resume() {
            let msg = Message::Resume(Resume {
                token: "tk".to_string(),
                session_id: "abc".to_string(),
                seq: Some(42),
            });

            assert_eq!(
                encoded(&msg),
                json!({
                    "op": 6,
                    "d": {"token": "tk", "session_id": "abc", "seq": 42},
                })
            );
        }

        #[test]
        fn test_message_encode_identify() {
            let msg = Message::Identify(Box::new(Identify {
                token: "tk".to_string(),
                properties: ConnectionProperties {
                    os: "linux".to_string(),
                    browser: "gatecord".to_string(),
                    device: "gatecord".to_string(),
                },
                compress: false,
                large_threshold: 250,
                shard: Some([0, 2]),
                presence: None,
                intents: 513,
            }));

            assert_eq!(
                encoded(&msg),
                json!({
                    "op": 2,
                    "d": {
                        "token": "tk",
                        "properties": {"os": "linux", "browser": "gatecord", "device": "gatecord"},
                        "compress": false,
                        "large_threshold": 250,
                        "shard": [0, 2],
                        "intents": 513,
                    },
                })
            );
        }

        #[test]
        fn test_message_identify_debug_hides_token() {
            let identify = Identify {
                token: "secret-token".to_string(),
                properties: ConnectionProperties::default(),
                compress: false,
                large_threshold: 250,
                shard: None,
                presence: None,
                intents: 0,
            };

            assert!(!format!("{:?}", identify).contains("secret-token"));
        }

        #[test]
        fn test_message_encode_dispatch_keeps_s_and_t() {
            let msg = Message::Dispatch(Dispatch {
                sequence: 3,
                event: "READY".to_string(),
                data: json!({"session_id": "x"}),
            });

            assert_eq!(
                encoded(&msg),
                json!({"op": 0, "s": 3, "t": "READY", "d": {"session_id": "x"}})
            );
        }
    }
}
