//! # Gatecord
//!
//! A resumable real-time gateway client.
//!
//! [`ws::Gateway`] connects to a gateway, identifies or resumes a session, keeps it
//! alive with heartbeats and reconnects with backoff when the connection breaks.

#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod ws;

mod error;
pub use error::{Error, Result};
