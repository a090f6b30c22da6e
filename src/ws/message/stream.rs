use std::{pin::Pin, task::Poll};

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use snafu::prelude::*;
use tokio_tungstenite::tungstenite as websocket;

use super::{Message, ParseMessageError};

/// Error when read/write message stream/sink
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum MessageStreamSinkError {
    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Websocket {
        /// source error
        source: websocket::Error,
    },

    /// peer sent a close frame
    #[snafu(display("websocket closed by peer, code {code:?}, reason: {reason}"))]
    Closed {
        /// close code, `None` if the frame carried no status
        code: Option<u16>,
        /// close reason
        reason: String,
    },

    /// parse frame data failed
    #[snafu(display("parse frame to message failed: {source}"))]
    ParseMessageFailed {
        /// source error
        source: ParseMessageError,
    },

    /// encode message to text frame failed
    #[snafu(display("encode {type_name} message failed: {source}"))]
    EncodeMessageFailed {
        /// message type name
        type_name: &'static str,
        /// source error
        source: serde_json::Error,
    },
}

impl MessageStreamSinkError {
    /// Check if this error will make the stream/sink stop
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Websocket { .. } | Self::Closed { .. } => true,
            Self::ParseMessageFailed { source } => {
                !matches!(source, ParseMessageError::UnknownOpcode { .. })
            }
            Self::EncodeMessageFailed { .. } => false,
        }
    }

    /// Close code if this error is a close frame from peer
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Closed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Gateway message stream/sink over a websocket connection.
///
/// Text frames are decoded as plain json, binary frames as zlib compressed json.
/// Outgoing messages are always sent as text frames.
#[derive(Debug)]
pub struct MessageStreamSink<S> {
    ws: S,
}

impl<S> MessageStreamSink<S> {
    /// Construct a new stream with underlying websocket connection.
    pub fn new(ws: S) -> Self {
        Self { ws }
    }

    /// Give back the underlying websocket connection
    pub fn into_inner(self) -> S {
        self.ws
    }
}

impl<S> Stream for MessageStreamSink<S>
where
    S: Stream<Item = Result<websocket::Message, websocket::Error>> + Unpin,
{
    type Item = Result<Message, MessageStreamSinkError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            let frame = match self.ws.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(frame)) => frame,
            };

            let (buffer, compressed): (Bytes, bool) = match frame.context(error::Websocket) {
                Err(e) => return Poll::Ready(Some(Err(e))),
                Ok(websocket::Message::Text(text)) => (text.into(), false),
                Ok(websocket::Message::Binary(data)) => (data.into(), true),
                Ok(websocket::Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Poll::Ready(Some(error::Closed { code, reason }.fail()));
                }
                Ok(other) => {
                    log::trace!("Skip websocket control frame: {:?}", other);
                    continue;
                }
            };

            let result = Message::decode(buffer.clone(), compressed).map_err(|e| {
                log::trace!(
                    "Parse failed message data: {}",
                    std::str::from_utf8(&buffer).unwrap_or("<not-utf8-binary>")
                );
                MessageStreamSinkError::ParseMessageFailed { source: e }
            });

            return Poll::Ready(Some(result));
        }
    }
}

impl<S> Sink<Message> for MessageStreamSink<S>
where
    S: Sink<websocket::Message, Error = websocket::Error> + Unpin,
{
    type Error = MessageStreamSinkError;

    fn poll_ready(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_ready_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        let text = item.encode().context(error::EncodeMessageFailed {
            type_name: item.type_name(),
        })?;
        self.ws
            .start_send_unpin(websocket::Message::Text(text))
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_flush_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_close_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }
}
