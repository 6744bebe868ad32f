use serde::Deserialize;

/// Top-level configuration for a realtime channel client.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub reconnect: ReconnectSettings,
    pub heartbeat: HeartbeatSettings,
    pub channels: ChannelSettings,
    pub logging: LoggingSettings,
}

/// Where the realtime endpoint lives.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub url: String,
    /// Upper bound on the TCP connect plus websocket handshake. `0` waits forever.
    pub connect_timeout_ms: u64,
}

/// Credentials attached to the `auth` message sent after every open.
///
/// The token is forwarded as-is; it is never validated on this side.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthSettings {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

/// Linear backoff parameters for automatic reconnects.
#[derive(Debug, Deserialize, Clone)]
pub struct ReconnectSettings {
    pub base_interval_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatSettings {
    pub interval_ms: u64,
}

/// Channels the CLI subscribes to on startup.
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelSettings {
    pub default: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub reconnect: Option<PartialReconnectSettings>,
    pub heartbeat: Option<PartialHeartbeatSettings>,
    pub channels: Option<PartialChannelSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAuthSettings {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialReconnectSettings {
    pub base_interval_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHeartbeatSettings {
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialChannelSettings {
    pub default: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                url: "ws://127.0.0.1:8080/ws".to_string(),
                connect_timeout_ms: 10_000,
            },
            auth: AuthSettings::default(),
            reconnect: ReconnectSettings {
                base_interval_ms: 3_000,
                max_delay_ms: 30_000,
                max_attempts: 10,
            },
            heartbeat: HeartbeatSettings {
                interval_ms: 30_000,
            },
            channels: ChannelSettings {
                default: vec!["payments".to_string(), "notifications".to_string()],
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every unset value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let auth = self.auth;
        let reconnect = self.reconnect;
        let heartbeat = self.heartbeat;
        let channels = self.channels;
        let logging = self.logging;

        Settings {
            server: ServerSettings {
                url: server
                    .as_ref()
                    .and_then(|s| s.url.clone())
                    .unwrap_or(default.server.url),
                connect_timeout_ms: server
                    .as_ref()
                    .and_then(|s| s.connect_timeout_ms)
                    .unwrap_or(default.server.connect_timeout_ms),
            },
            auth: AuthSettings {
                token: auth
                    .as_ref()
                    .and_then(|a| a.token.clone())
                    .or(default.auth.token),
                user_id: auth
                    .as_ref()
                    .and_then(|a| a.user_id.clone())
                    .or(default.auth.user_id),
            },
            reconnect: ReconnectSettings {
                base_interval_ms: reconnect
                    .as_ref()
                    .and_then(|r| r.base_interval_ms)
                    .unwrap_or(default.reconnect.base_interval_ms),
                max_delay_ms: reconnect
                    .as_ref()
                    .and_then(|r| r.max_delay_ms)
                    .unwrap_or(default.reconnect.max_delay_ms),
                max_attempts: reconnect
                    .as_ref()
                    .and_then(|r| r.max_attempts)
                    .unwrap_or(default.reconnect.max_attempts),
            },
            heartbeat: HeartbeatSettings {
                interval_ms: heartbeat
                    .and_then(|h| h.interval_ms)
                    .unwrap_or(default.heartbeat.interval_ms),
            },
            channels: ChannelSettings {
                default: channels
                    .and_then(|c| c.default)
                    .unwrap_or(default.channels.default),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
