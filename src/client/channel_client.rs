//! Realtime channel client
//!
//! `ChannelClient` keeps one logical channel to the server available while
//! the physical connection comes and goes:
//! - on open it authenticates, re-subscribes every held channel and starts the heartbeat
//! - on abnormal close it schedules a single reconnect with linear backoff
//! - after `max_attempts` failed reconnects it emits `maxReconnectAttemptsReached` and stops
//!
//! Every connection attempt gets a new generation number. Events from a
//! superseded generation are ignored, so a late close or message from an old
//! transport can never touch the current one.
//!
//! Nothing here panics into the caller: failures are reported through events
//! (`disconnected`, `maxReconnectAttemptsReached`) or boolean returns.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::backoff::ReconnectPolicy;
use crate::client::status::{ConnectionState, ConnectionStatus};
use crate::config::Settings;
use crate::dispatch::{HandlerRegistry, ListenerId};
use crate::store::{
    MAX_LIST_ENTRIES, MAX_RECORDS_PER_PREFIX, Notification, StateStore, id_string, keys,
};
use crate::transport::{
    ABNORMAL_CLOSURE, ClientMessage, Connector, Frame, InboundMessage, MessageKind,
    NORMAL_CLOSURE, TransportEvent, TransportLink, WsConnector,
};
use crate::utils::ChannelError;

/// Lifecycle event names.
pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const MAX_RECONNECT_ATTEMPTS_REACHED: &str = "maxReconnectAttemptsReached";
    pub const MESSAGE: &str = "message";
    pub const NOTIFICATION: &str = "notification";

    pub fn channel(channel_id: &str) -> String {
        format!("channel:{channel_id}")
    }
}

/// Cloneable handle to one client instance.
///
/// Construct one per session and hand clones to whatever renders from it.
/// Operations must be called from within a tokio runtime.
#[derive(Clone)]
pub struct ChannelClient {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    heartbeat_interval: Duration,
    registry: HandlerRegistry,
    store: StateStore,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    connection: Option<Connection>,
    generation: u64,
    reconnect_attempts: u32,
    exhausted: bool,
    token: Option<String>,
    user_id: Option<String>,
    subscriptions: BTreeSet<String>,
    visible: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

/// One transport session. Replaced, never mutated, when the state changes.
struct Connection {
    id: String,
    outbound: Option<UnboundedSender<Frame>>,
}

enum CloseOutcome {
    Intentional,
    Scheduled { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

impl ChannelClient {
    pub fn new<C: Connector>(settings: &Settings, connector: C) -> Self {
        let inner = Inner {
            state: ConnectionState::Disconnected,
            connection: None,
            generation: 0,
            reconnect_attempts: 0,
            exhausted: false,
            token: settings.auth.token.clone(),
            user_id: settings.auth.user_id.clone(),
            subscriptions: BTreeSet::new(),
            visible: true,
            reconnect_timer: None,
            heartbeat: None,
        };

        Self {
            shared: Arc::new(Shared {
                url: settings.server.url.clone(),
                connector: Arc::new(connector),
                connect_timeout: Duration::from_millis(settings.server.connect_timeout_ms),
                policy: ReconnectPolicy::from_settings(&settings.reconnect),
                heartbeat_interval: Duration::from_millis(settings.heartbeat.interval_ms),
                registry: HandlerRegistry::new(),
                store: StateStore::new(),
                inner: Mutex::new(inner),
            }),
        }
    }

    /// Client over a real websocket to `settings.server.url`.
    pub fn with_websocket(settings: &Settings) -> Self {
        Self::new(settings, WsConnector::new())
    }

    /// Opens the transport unless an attempt is already in flight or open.
    ///
    /// After the reconnect budget was exhausted, an explicit call starts over
    /// with a fresh budget.
    pub fn connect(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.exhausted {
                info!("connect requested after reconnect budget was exhausted, resetting");
                inner.exhausted = false;
                inner.reconnect_attempts = 0;
            }
        }
        self.shared.start_connect();
    }

    /// Intentional shutdown. No reconnect is scheduled.
    pub fn disconnect(&self) {
        self.shared.disconnect("client disconnect");
    }

    /// Adds `channel` to the subscription set; sends `subscribe` now if open.
    pub fn subscribe(&self, channel: &str) {
        let mut inner = self.shared.lock();
        if !inner.subscriptions.insert(channel.to_string()) {
            return;
        }
        if inner.state == ConnectionState::Open {
            inner.write(&ClientMessage::Subscribe {
                channel: channel.to_string(),
            });
        }
        info!(channel, "subscribed");
    }

    /// Removes `channel` from the subscription set; sends `unsubscribe` now if open.
    pub fn unsubscribe(&self, channel: &str) {
        let mut inner = self.shared.lock();
        if !inner.subscriptions.remove(channel) {
            return;
        }
        if inner.state == ConnectionState::Open {
            inner.write(&ClientMessage::Unsubscribe {
                channel: channel.to_string(),
            });
        }
        info!(channel, "unsubscribed");
    }

    /// Serializes and hands `message` to the transport.
    ///
    /// Returns false, without writing anything, unless the connection is open.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        self.shared.send(message)
    }

    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.registry.on(event, handler)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.shared.registry.off(event, id)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let inner = self.shared.lock();
        ConnectionStatus {
            connected: inner.state == ConnectionState::Open,
            state: inner.state,
            reconnect_attempts: inner.reconnect_attempts,
            subscriptions: inner.subscriptions.iter().cloned().collect(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Local state written by built-in message handling.
    pub fn store(&self) -> &StateStore {
        &self.shared.store
    }

    /// Credentials for the next `auth` message. Takes effect on the next open.
    pub fn set_token(&self, token: Option<String>, user_id: Option<String>) {
        let mut inner = self.shared.lock();
        inner.token = token;
        inner.user_id = user_id;
    }

    /// Host visibility changed.
    ///
    /// Hidden pauses the heartbeat. Visible re-arms it, or reconnects when the
    /// client dropped while hidden.
    pub fn set_visible(&self, visible: bool) {
        let reconnect = {
            let mut inner = self.shared.lock();
            inner.visible = visible;
            if !visible {
                inner.stop_heartbeat();
                debug!("heartbeat paused");
                false
            } else {
                match inner.state {
                    ConnectionState::Open => {
                        self.shared.start_heartbeat(&mut inner);
                        false
                    }
                    ConnectionState::Disconnected => !inner.exhausted,
                    _ => false,
                }
            }
        };
        if reconnect {
            self.shared.start_connect();
        }
    }

    pub fn network_online(&self) {
        info!("network online, connecting");
        self.connect();
    }

    pub fn network_offline(&self) {
        info!("network offline, disconnecting");
        self.shared.disconnect("network offline");
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("url", &self.shared.url)
            .field("status", &self.connection_status())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // handlers never run under this lock
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start_connect(self: &Arc<Self>) {
        let (generation, conn_id) = {
            let mut inner = self.lock();
            if matches!(
                inner.state,
                ConnectionState::Connecting | ConnectionState::Open
            ) {
                debug!(state = ?inner.state, "connect ignored");
                return;
            }
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            inner.generation += 1;
            let conn_id = format!("conn-{}", Uuid::new_v4());
            inner.state = ConnectionState::Connecting;
            inner.connection = Some(Connection {
                id: conn_id.clone(),
                outbound: None,
            });
            (inner.generation, conn_id)
        };

        info!(url = %self.url, conn_id = %conn_id, "connecting");

        let weak = Arc::downgrade(self);
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let connect_timeout = self.connect_timeout;
        let task = spawn(async move {
            let result = if connect_timeout.is_zero() {
                connector.connect(&url).await
            } else {
                match tokio::time::timeout(connect_timeout, connector.connect(&url)).await {
                    Ok(result) => result,
                    Err(_) => Err(ChannelError::Connect(format!(
                        "{url}: no handshake within {}ms",
                        connect_timeout.as_millis()
                    ))),
                }
            };
            match result {
                Ok(link) => drive_link(weak, generation, conn_id, link).await,
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "connect failed");
                    if let Some(shared) = weak.upgrade() {
                        shared.handle_close(generation, ABNORMAL_CLOSURE, e.to_string());
                    }
                }
            }
        });

        if task.is_none() {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.state = ConnectionState::Disconnected;
                inner.connection = None;
            }
        }
    }

    fn handle_open(
        self: &Arc<Self>,
        generation: u64,
        conn_id: &str,
        outbound: UnboundedSender<Frame>,
    ) -> bool {
        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != ConnectionState::Connecting {
                debug!(conn_id, "discarding superseded connection");
                let _ = outbound.send(Frame::Close {
                    code: NORMAL_CLOSURE,
                    reason: "superseded".to_string(),
                });
                return false;
            }

            inner.connection = Some(Connection {
                id: conn_id.to_string(),
                outbound: Some(outbound),
            });
            inner.state = ConnectionState::Open;
            inner.reconnect_attempts = 0;
            inner.exhausted = false;

            if let Some(token) = inner.token.clone() {
                let auth = ClientMessage::Auth {
                    token,
                    user_id: inner.user_id.clone(),
                };
                inner.write(&auth);
            }
            let resubscribe: Vec<ClientMessage> = inner
                .subscriptions
                .iter()
                .map(|channel| ClientMessage::Subscribe {
                    channel: channel.clone(),
                })
                .collect();
            for message in &resubscribe {
                inner.write(message);
            }
            if inner.visible {
                self.start_heartbeat(&mut inner);
            }
            info!(conn_id, resubscribed = resubscribe.len(), "connected");
        }

        self.store.set(
            keys::CONNECTION,
            json!({ "connected": true, "reconnectAttempts": 0 }),
        );
        self.registry
            .emit(events::CONNECTED, &json!({ "timestamp": now_ms() }));
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.generation == generation && inner.state == ConnectionState::Open
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        let (outcome, attempts) = {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(code, "ignoring close from superseded connection");
                return;
            }
            if !matches!(
                inner.state,
                ConnectionState::Connecting | ConnectionState::Open
            ) {
                return;
            }
            let conn_id = inner
                .connection
                .take()
                .map(|c| c.id)
                .unwrap_or_default();
            inner.state = ConnectionState::Disconnected;
            inner.stop_heartbeat();

            let outcome = if code == NORMAL_CLOSURE {
                info!(conn_id = %conn_id, "connection closed normally");
                CloseOutcome::Intentional
            } else {
                warn!(conn_id = %conn_id, code, reason = %reason, "connection lost");
                self.schedule_reconnect(&mut inner)
            };
            (outcome, inner.reconnect_attempts)
        };

        match &outcome {
            CloseOutcome::Scheduled { attempt, delay } => {
                info!(
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
            }
            CloseOutcome::Exhausted { attempts } => {
                error!(attempts, "reconnect attempts exhausted, giving up");
            }
            CloseOutcome::Intentional => {}
        }

        self.store.set(
            keys::CONNECTION,
            json!({ "connected": false, "reconnectAttempts": attempts }),
        );
        self.registry.emit(
            events::DISCONNECTED,
            &json!({ "code": code, "reason": reason, "timestamp": now_ms() }),
        );
        if let CloseOutcome::Exhausted { attempts } = outcome {
            self.registry.emit(
                events::MAX_RECONNECT_ATTEMPTS_REACHED,
                &json!({ "attempts": attempts }),
            );
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner) -> CloseOutcome {
        inner.reconnect_attempts += 1;
        let attempt = inner.reconnect_attempts;
        if self.policy.is_exhausted(attempt) {
            inner.exhausted = true;
            return CloseOutcome::Exhausted { attempts: attempt };
        }

        let delay = self.policy.delay_for_attempt(attempt);
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        let weak = Arc::downgrade(self);
        let generation = inner.generation;
        inner.reconnect_timer = spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_reconnect(generation);
            }
        });
        CloseOutcome::Scheduled { attempt, delay }
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != ConnectionState::Disconnected {
                return;
            }
            // the running timer is this task; drop the handle instead of aborting it
            inner.reconnect_timer = None;
        }
        self.start_connect();
    }

    fn disconnect(&self, reason: &str) {
        let (was_active, attempts) = {
            let mut inner = self.lock();
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            inner.stop_heartbeat();
            inner.generation += 1;

            let was_active = matches!(
                inner.state,
                ConnectionState::Connecting | ConnectionState::Open
            );
            if was_active {
                inner.state = ConnectionState::Closing;
            }
            if let Some(connection) = inner.connection.take() {
                if let Some(outbound) = connection.outbound {
                    let _ = outbound.send(Frame::Close {
                        code: NORMAL_CLOSURE,
                        reason: reason.to_string(),
                    });
                }
                info!(conn_id = %connection.id, reason, "disconnected");
            }
            inner.state = ConnectionState::Disconnected;
            (was_active, inner.reconnect_attempts)
        };

        if was_active {
            self.store.set(
                keys::CONNECTION,
                json!({ "connected": false, "reconnectAttempts": attempts }),
            );
            self.registry.emit(
                events::DISCONNECTED,
                &json!({ "code": NORMAL_CLOSURE, "reason": reason, "timestamp": now_ms() }),
            );
        }
    }

    fn send<T: Serialize>(&self, message: &T) -> bool {
        let inner = self.lock();
        if inner.state != ConnectionState::Open {
            warn!(state = ?inner.state, "not connected, message not sent");
            return false;
        }
        inner.write(message)
    }

    fn start_heartbeat(self: &Arc<Self>, inner: &mut Inner) {
        inner.stop_heartbeat();
        let period = self.heartbeat_interval;
        if period.is_zero() {
            return;
        }
        let weak = Arc::downgrade(self);
        inner.heartbeat = spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.send(&ClientMessage::heartbeat_now());
            }
        });
    }

    fn handle_text(self: &Arc<Self>, conn_id: &str, text: &str) {
        let (message, envelope) = match InboundMessage::parse_with_envelope(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    conn_id,
                    error = %e,
                    payload = %text.chars().take(100).collect::<String>(),
                    "dropping malformed message"
                );
                return;
            }
        };
        debug!(conn_id, kind = %message.kind, channel = ?message.channel, "message received");

        self.handle_builtin(&message);
        self.registry.emit(&message.kind, &message.data);
        if let Some(channel) = &message.channel {
            self.registry.emit(&events::channel(channel), &message.data);
        }
        self.registry.emit(events::MESSAGE, &envelope);
    }

    fn handle_builtin(&self, message: &InboundMessage) {
        let data = &message.data;
        match message.message_kind() {
            MessageKind::Heartbeat => {
                self.send(&ClientMessage::heartbeat_now());
            }
            MessageKind::PaymentStatus => {
                if let Some(order_id) = data.get("orderId").and_then(id_string) {
                    self.store.set_record(
                        keys::PAYMENTS,
                        &order_id,
                        data.clone(),
                        MAX_RECORDS_PER_PREFIX,
                    );
                }
                self.store.set(keys::PAYMENTS_LATEST, data.clone());
                if let Some(notification) = Notification::from_payment_status(data) {
                    self.publish_notification(notification);
                }
            }
            MessageKind::TransactionUpdate => {
                if let Some(id) = data.get("id").and_then(id_string) {
                    self.store.set_record(
                        keys::TRANSACTIONS,
                        &id,
                        data.clone(),
                        MAX_RECORDS_PER_PREFIX,
                    );
                }
                if let Some(total) = data.get("totalAmount") {
                    self.store.set(keys::STATS_TOTAL_AMOUNT, total.clone());
                }
                if let Some(count) = data.get("transactionCount") {
                    self.store.set(keys::STATS_TRANSACTION_COUNT, count.clone());
                }
            }
            MessageKind::SystemNotification => {
                if let Some(notification) = Notification::from_system(data) {
                    self.publish_notification(notification);
                }
            }
            MessageKind::UserMessage => {
                self.store
                    .push(keys::USER_MESSAGES, data.clone(), MAX_LIST_ENTRIES);
            }
            MessageKind::Other(kind) => {
                debug!(kind = %kind, "no built-in handling for message type");
            }
        }
    }

    fn publish_notification(&self, notification: Notification) {
        let value = notification.to_value();
        self.store
            .push(keys::NOTIFICATIONS, value.clone(), MAX_LIST_ENTRIES);
        self.registry.emit(events::NOTIFICATION, &value);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        inner.stop_heartbeat();
    }
}

impl Inner {
    /// Writes to the current transport. Caller checks the state.
    fn write<T: Serialize>(&self, message: &T) -> bool {
        let Some(outbound) = self.connection.as_ref().and_then(|c| c.outbound.as_ref()) else {
            return false;
        };
        match serde_json::to_string(message) {
            Ok(text) => match outbound.send(Frame::Text(text)) {
                Ok(()) => true,
                Err(_) => {
                    warn!("transport closed, message not sent");
                    false
                }
            },
            Err(e) => {
                error!(error = %e, "failed to serialize outbound message");
                false
            }
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

/// Reads one link until it closes, feeding events back into the client.
///
/// Holds only a weak reference between events so a dropped client lets the
/// link go.
async fn drive_link(weak: Weak<Shared>, generation: u64, conn_id: String, link: TransportLink) {
    let TransportLink {
        outbound,
        mut inbound,
    } = link;

    match weak.upgrade() {
        Some(shared) => {
            if !shared.handle_open(generation, &conn_id, outbound) {
                return;
            }
        }
        None => return,
    }

    while let Some(event) = inbound.recv().await {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Text(text) => {
                if !shared.is_current(generation) {
                    debug!(conn_id = %conn_id, "dropping message from superseded connection");
                    return;
                }
                shared.handle_text(&conn_id, &text);
            }
            TransportEvent::Closed { code, reason } => {
                shared.handle_close(generation, code, reason);
                return;
            }
        }
    }

    if let Some(shared) = weak.upgrade() {
        shared.handle_close(generation, ABNORMAL_CLOSURE, "transport dropped".to_string());
    }
}

fn spawn<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(e) => {
            error!(error = %e, "no tokio runtime, task not started");
            None
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
