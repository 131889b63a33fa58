//! yakd watch: keeps a [`yakd_store`] state in sync with the dashboard
//! backend's `/watch` event stream.
//!
//! [`WatchManager`] opens the stream, applies every event through the single
//! [`yakd_store::StoreWriter`] and runs a self-rescheduling liveness cycle
//! that probes the API and reconnects (with a full resync) when the stream
//! has died.

#![forbid(unsafe_code)]

mod config;
mod connection;
mod error;
mod manager;
mod probe;
mod transport;

pub use config::{WatchConfig, DEFAULT_API_URL, DEFAULT_POLL_INTERVAL, ENV_API_URL, ENV_POLL_INTERVAL_MS};
pub use connection::ReadyState;
pub use error::{Result, WatchError};
pub use manager::{WatchManager, POLL_ERROR};
pub use probe::{ApiProbe, HttpApi};
pub use transport::{MessageStream, SseTransport, Transport};
