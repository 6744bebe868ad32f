//! The `store` module is the client-side state that UI code renders from.
//!
//! Built-in message handling writes payment, transaction, notification and
//! connection state here; widgets subscribe to keys instead of listening to
//! raw messages.

pub mod notification;
pub mod state_store;

use serde_json::Value;

pub use notification::{Notification, NotificationLevel};
pub use state_store::StateStore;

/// Maximum entries kept in list-valued keys such as `notifications`.
pub const MAX_LIST_ENTRIES: usize = 50;

/// Maximum per-id records kept under one prefix such as `payments`.
pub const MAX_RECORDS_PER_PREFIX: usize = 200;

pub mod keys {
    pub const CONNECTION: &str = "connection";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const USER_MESSAGES: &str = "user_messages";
    pub const PAYMENTS_LATEST: &str = "payments.latest";
    pub const STATS_TOTAL_AMOUNT: &str = "stats.totalAmount";
    pub const STATS_TRANSACTION_COUNT: &str = "stats.transactionCount";

    /// Prefix of `payments.<orderId>` records.
    pub const PAYMENTS: &str = "payments";
    /// Prefix of `transactions.<id>` records.
    pub const TRANSACTIONS: &str = "transactions";
}

/// Reads an id that servers send either as a string or as a number.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
