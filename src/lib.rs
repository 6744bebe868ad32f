//! # realtime-channel
//!
//! `realtime-channel` is a reconnecting publish/subscribe client for a
//! payment portal's realtime feed. It keeps one websocket to the server,
//! authenticates it, restores channel subscriptions after every drop, and
//! dispatches typed server messages to registered listeners.
//!
//! ## Core Modules
//!
//! - `client`: the channel client state machine, reconnect backoff and heartbeat.
//! - `config`: loading client settings from files and environment.
//! - `dispatch`: the ordered event handler registry.
//! - `store`: local state and notifications that UI code renders from.
//! - `transport`: message envelopes and the connectors that open physical links.
//! - `utils`: error type and logging setup.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod store;
pub mod transport;
pub mod utils;

pub use client::{ChannelClient, ConnectionState, ConnectionStatus, ReconnectPolicy};
pub use utils::ChannelError;
