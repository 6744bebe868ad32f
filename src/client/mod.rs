//! The `client` module is the realtime channel client: one logical channel to
//! the server kept alive over a transport that may drop at any time.
//!
//! It owns the connection state machine, the reconnect policy, the
//! heartbeat, the subscription set and the dispatch of inbound messages.

pub mod backoff;
pub mod channel_client;
pub mod status;

pub use backoff::ReconnectPolicy;
pub use channel_client::{ChannelClient, events};
pub use status::{ConnectionState, ConnectionStatus};
