//! crate error types

use snafu::prelude::*;

use crate::{
    config::ConfigError,
    ws::{url::ParseGatewayURLError, ConnectionError},
};

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Gateway is already started
    #[snafu(display("gateway client is already running"))]
    AlreadyRunning,

    /// Command sent while no session is established
    #[snafu(display("gateway is not connected"))]
    NotConnected,

    /// Invalid websocket gateway url address
    #[snafu(display("invalid gateway url {url}: {source}"))]
    InvalidGatewayURL {
        /// given url
        url: String,
        /// source error
        source: ParseGatewayURLError,
    },

    /// Invalid client configuration
    #[snafu(display("invalid config: {source}"))]
    InvalidConfig {
        /// source error
        source: ConfigError,
    },

    /// Gateway closed the connection with a close code that can not be recovered from
    #[snafu(display("gateway rejected connection with close code {code}: {source}"))]
    GatewayRejected {
        /// close code
        code: u16,
        /// source error
        source: ConnectionError,
    },

    /// Reconnect limits exceeded
    #[snafu(display("gave up reconnecting after {attempts} attempts: {source}"))]
    RetriesExhausted {
        /// attempts made since last established connection
        attempts: u32,
        /// last failure
        source: ConnectionError,
    },
}
