//! Gateway url parsing and construction

use std::{fmt::Display, str::FromStr};

use snafu::prelude::*;

/// Wire encoding requested from gateway, only json is supported
pub const ENCODING: &str = "json";

/// Parse string as gateway url error
#[derive(Debug, Snafu)]
#[snafu(
    visibility(pub(crate)),
    module(parse_gateway_url_error_variant),
    context(suffix(false))
)]
pub enum ParseGatewayURLError {
    #[snafu(display("{s} is an invalid url: {source}"))]
    /// the str is not a valid url
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url schema is not websocket
    #[snafu(display("the url {s} has invalid schema {schema}, only ws or wss is ok"))]
    InvalidSchema {
        /// the url
        s: String,
        /// invalid schema
        schema: String,
    },

    /// the parsed url has no host
    #[snafu(display("the gateway url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },
}

/// parsed gateway url
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayURLInfo {
    base: url::Url,
    /// gateway api version
    pub version: u8,
}

impl GatewayURLInfo {
    /// Return a copy requesting another api version
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// url schema
    pub fn schema(&self) -> &str {
        self.base.scheme()
    }

    /// gateway host(domain)
    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// gateway port
    pub fn port(&self) -> Option<u16> {
        self.base.port()
    }

    /// construct final url
    pub fn url(&self) -> url::Url {
        let mut u = self.base.clone();
        u.set_query(None);
        u.set_fragment(None);

        u.query_pairs_mut()
            .append_pair("v", &self.version.to_string())
            .append_pair("encoding", ENCODING);

        u
    }
}

impl FromStr for GatewayURLInfo {
    type Err = ParseGatewayURLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)
            .with_context(|_| parse_gateway_url_error_variant::InvalidURL { s: s.to_string() })?;

        ensure!(
            url.scheme() == "wss" || url.scheme() == "ws",
            parse_gateway_url_error_variant::InvalidSchema {
                s,
                schema: url.scheme(),
            }
        );

        ensure!(
            url.host().is_some(),
            parse_gateway_url_error_variant::NoHost { s }
        );

        Ok(GatewayURLInfo {
            base: url,
            version: crate::config::DEFAULT_API_VERSION,
        })
    }
}

impl Display for GatewayURLInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.url().fmt(f)
    }
}
