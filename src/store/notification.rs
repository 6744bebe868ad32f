//! Notifications derived from payment and system messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::id_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    fn parse(level: &str) -> Self {
        match level {
            "success" => NotificationLevel::Success,
            "warning" | "warn" => NotificationLevel::Warning,
            "error" => NotificationLevel::Error,
            _ => NotificationLevel::Info,
        }
    }
}

/// What a notification widget shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    /// Maps a `payment_status` payload to a notification.
    ///
    /// Returns `None` for statuses that have no user-facing message.
    pub fn from_payment_status(data: &Value) -> Option<Self> {
        let status = data.get("status")?.as_str()?;
        let order_id = data
            .get("orderId")
            .and_then(id_string)
            .unwrap_or_else(|| "unknown".to_string());

        let (level, message) = match status {
            "completed" => {
                let amount = data.get("amount").map(format_amount).unwrap_or_default();
                (
                    NotificationLevel::Success,
                    format!("Payment completed, amount: {amount}"),
                )
            }
            "failed" => (
                NotificationLevel::Error,
                format!("Payment failed, order: {order_id}"),
            ),
            "pending" => (
                NotificationLevel::Info,
                "Payment is being processed, please wait".to_string(),
            ),
            "expired" => (
                NotificationLevel::Warning,
                format!("Payment expired, order: {order_id}"),
            ),
            _ => return None,
        };

        Some(Self { level, message })
    }

    /// Maps a `system_notification` payload (`{message, type?}`) to a notification.
    pub fn from_system(data: &Value) -> Option<Self> {
        let message = data.get("message")?.as_str()?.to_string();
        let level = data
            .get("type")
            .and_then(Value::as_str)
            .map(NotificationLevel::parse)
            .unwrap_or(NotificationLevel::Info);
        Some(Self { level, message })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Formats a TWD amount with thousands separators and no decimals, e.g. `NT$1,500`.
pub fn format_amount(amount: &Value) -> String {
    let number = match amount {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(number) = number else {
        return amount.to_string();
    };

    let rounded = number.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}NT${grouped}")
}
