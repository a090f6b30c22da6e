//! In-memory transport driving the gateway client from tests

use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{frame::coding::CloseCode, CloseFrame},
    Message as WsMessage,
};

use super::transport::Transport;

type Frame = Result<WsMessage, tungstenite::Error>;

#[derive(Debug)]
pub(crate) struct MockSocket {
    rx: mpsc::UnboundedReceiver<Frame>,
    tx: mpsc::UnboundedSender<WsMessage>,
}

impl Stream for MockSocket {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Sink<WsMessage> for MockSocket {
    type Error = tungstenite::Error;

    fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
        self.tx
            .send(item)
            .map_err(|_| tungstenite::Error::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Server side of one accepted connection
#[derive(Debug)]
pub(crate) struct ServerConn {
    pub url: url::Url,
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<WsMessage>,
}

impl ServerConn {
    pub fn send(&self, value: Value) {
        let _ = self.tx.send(Ok(WsMessage::Text(value.to_string())));
    }

    pub fn hello(&self, interval_ms: u64) {
        self.send(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}));
    }

    pub fn dispatch(&self, event: &str, sequence: u64, data: Value) {
        self.send(json!({"op": 0, "s": sequence, "t": event, "d": data}));
    }

    pub fn ready(&self, session_id: &str, sequence: u64, resume_url: Option<&str>) {
        self.dispatch(
            "READY",
            sequence,
            json!({"v": 10, "session_id": session_id, "resume_gateway_url": resume_url}),
        );
    }

    pub fn close(&self, code: u16, reason: &'static str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        let _ = self.tx.send(Ok(WsMessage::Close(Some(frame))));
    }

    /// Next frame written by client, `None` once client dropped the connection
    pub async fn recv_frame(&mut self) -> Option<WsMessage> {
        self.rx.recv().await
    }

    pub async fn recv_json(&mut self) -> Value {
        match self.recv_frame().await {
            Some(WsMessage::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expect text frame, got {:?}", other),
        }
    }

    /// Next frame that is not a heartbeat
    pub async fn recv_command(&mut self) -> Value {
        loop {
            let frame = self.recv_json().await;
            if frame["op"] != 1 {
                return frame;
            }
        }
    }

    /// Skip text frames until client closes, returning the close code
    pub async fn expect_close(&mut self) -> u16 {
        loop {
            match self.recv_frame().await {
                Some(WsMessage::Text(_)) => continue,
                Some(WsMessage::Close(Some(frame))) => return u16::from(frame.code),
                other => panic!("expect close frame, got {:?}", other),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    conns: mpsc::UnboundedSender<ServerConn>,
    refuse: Arc<AtomicBool>,
}

#[derive(Debug)]
pub(crate) struct MockServer {
    conns: mpsc::UnboundedReceiver<ServerConn>,
    refuse: Arc<AtomicBool>,
}

pub(crate) fn mock() -> (MockTransport, MockServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let refuse = Arc::new(AtomicBool::new(false));

    (
        MockTransport {
            conns: tx,
            refuse: refuse.clone(),
        },
        MockServer { conns: rx, refuse },
    )
}

impl MockServer {
    pub async fn accept(&mut self) -> ServerConn {
        self.conns.recv().await.expect("client never connected")
    }

    pub fn try_accept(&mut self) -> Option<ServerConn> {
        self.conns.try_recv().ok()
    }

    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Socket = MockSocket;

    async fn connect(&self, url: &url::Url) -> Result<Self::Socket, tungstenite::Error> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(tungstenite::Error::ConnectionClosed);
        }

        let (to_client, rx) = mpsc::unbounded_channel();
        let (tx, from_client) = mpsc::unbounded_channel();

        self.conns
            .send(ServerConn {
                url: url.clone(),
                tx: to_client,
                rx: from_client,
            })
            .map_err(|_| tungstenite::Error::ConnectionClosed)?;

        Ok(MockSocket { rx, tx })
    }
}
