use snafu::prelude::*;

use super::{
    connected::ClientStateConnected, disconnect::error, ClientInner, ConnectionError, Context,
};
use crate::ws::{session::ConnectionStage, transport::Transport, url::GatewayURLInfo};

#[derive(Debug)]
pub(crate) struct ClientStateInit<'a, T> {
    pub ctx: &'a mut Context<T>,
    pub url: GatewayURLInfo,
}

impl<'a, T: Transport> ClientInner<ClientStateInit<'a, T>> {
    pub async fn connect(self) -> Result<ClientInner<ClientStateConnected<'a, T>>, ConnectionError> {
        let ClientStateInit { ctx, url } = self.state;

        ctx.shared.enter(ConnectionStage::Connecting, None);

        let url = url.with_version(ctx.config.api_version).url();

        log::info!("Connecting gateway {}", url);

        let socket = tokio::time::timeout(ctx.config.connect_timeout, ctx.transport.connect(&url))
            .await
            .map_err(|_| error::ConnectTimeout { url: url.as_str() }.build())?
            .with_context(|_| error::ConnectGateway { url: url.as_str() })?;

        log::debug!("Gateway connected, move to connected state");

        Ok(ClientInner {
            state: ClientStateConnected { ctx, socket },
        })
    }
}
