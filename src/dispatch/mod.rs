//! The `dispatch` module holds the handler registry: named events mapped to
//! ordered listener lists.
//!
//! Event names are message types (`payment_status`), lifecycle events
//! (`connected`, `disconnected`, `maxReconnectAttemptsReached`), channel
//! fan-outs (`channel:<id>`) or the catch-all `message`.

pub mod registry;

pub use registry::{Handler, HandlerRegistry, ListenerId};

#[cfg(test)]
mod tests;
