//! Websocket transport the gateway client runs on.

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use tokio_tungstenite::{self as websocket, tungstenite};

/// Websocket connection established by [`TungsteniteTransport`]
pub type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

/// Something that can open a full-duplex websocket to a url.
///
/// The returned socket is a stream of received frames and a sink of frames to send.
/// It ends when the connection is closed and can not be restarted, a new `connect`
/// is needed.
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// connection type
    type Socket: Stream<Item = Result<tungstenite::Message, tungstenite::Error>>
        + Sink<tungstenite::Message, Error = tungstenite::Error>
        + Debug
        + Send
        + Unpin
        + 'static;

    /// open a connection
    async fn connect(&self, url: &url::Url) -> Result<Self::Socket, tungstenite::Error>;
}

/// Transport over tokio-tungstenite, with rustls for wss
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    type Socket = WebsocketClient;

    async fn connect(&self, url: &url::Url) -> Result<Self::Socket, tungstenite::Error> {
        log::debug!("Connecting gateway: {}", url);

        websocket::connect_async(url.as_str())
            .await
            .map(|(client, _)| client)
    }
}
