//! End-to-end: the channel client against a real websocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use realtime_channel::client::events;
use realtime_channel::config::Settings;
use realtime_channel::{ChannelClient, ConnectionState};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tungstenite::protocol::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts websocket connections and hands each one to the test.
async fn start_server() -> (String, mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>) {
    let port = portpicker::pick_unused_port().expect("No free ports");
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await.expect("Can't bind");
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            match accept_async(stream).await {
                Ok(ws) => {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("WebSocket handshake error: {e}"),
            }
        }
    });

    (format!("ws://{addr}/ws"), rx)
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for client frame")
            .expect("socket ended")
            .expect("socket error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).expect("client sent invalid json");
        }
    }
}

fn settings(url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.server.url = url.to_string();
    settings.auth.token = Some("token-123".to_string());
    settings.auth.user_id = Some("42".to_string());
    settings.reconnect.base_interval_ms = 50;
    settings.reconnect.max_delay_ms = 200;
    settings.heartbeat.interval_ms = 60_000;
    settings
}

fn watch(client: &ChannelClient, names: &[&str]) -> mpsc::UnboundedReceiver<(String, Value)> {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in names {
        let tx = tx.clone();
        let event = name.to_string();
        client.on(name, move |payload| {
            let _ = tx.send((event.clone(), payload.clone()));
        });
    }
    rx
}

async fn expect_event(rx: &mut mpsc::UnboundedReceiver<(String, Value)>, name: &str) -> Value {
    let (got, payload) = timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed");
    assert_eq!(got, name);
    payload
}

#[tokio::test]
async fn channel_client_end_to_end() {
    let (url, mut connections) = start_server().await;
    let client = ChannelClient::with_websocket(&settings(&url));
    let mut lifecycle = watch(&client, &[events::CONNECTED, events::DISCONNECTED]);
    let mut channel_events = watch(&client, &["channel:payments"]);

    client.subscribe("payments");
    client.connect();

    let mut ws = timeout(WAIT, connections.recv()).await.unwrap().unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "auth", "data": {"token": "token-123", "userId": "42"}})
    );
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "subscribe", "data": {"channel": "payments"}})
    );
    expect_event(&mut lifecycle, events::CONNECTED).await;

    let push = json!({
        "type": "payment_status",
        "channel": "payments",
        "data": {"status": "completed", "amount": 300, "orderId": "ORD-9"}
    });
    ws.send(WsMessage::Text(push.to_string().into())).await.unwrap();
    let data = expect_event(&mut channel_events, "channel:payments").await;
    assert_eq!(data["orderId"], "ORD-9");
    assert_eq!(
        client.store().get("payments.ORD-9").unwrap()["status"],
        "completed"
    );

    // server heartbeat gets answered
    ws.send(WsMessage::Text(json!({"type": "heartbeat", "data": {}}).to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut ws).await["type"], "heartbeat");

    // drop without a close handshake: the client reconnects and resubscribes
    drop(ws);
    let closed = expect_event(&mut lifecycle, events::DISCONNECTED).await;
    assert_eq!(closed["code"], 1006);

    let mut ws = timeout(WAIT, connections.recv()).await.unwrap().unwrap();
    assert_eq!(next_json(&mut ws).await["type"], "auth");
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "subscribe", "data": {"channel": "payments"}})
    );
    expect_event(&mut lifecycle, events::CONNECTED).await;
    assert_eq!(client.connection_status().reconnect_attempts, 0);

    // intentional disconnect: normal close frame, no reconnect
    client.disconnect();
    let closed = expect_event(&mut lifecycle, events::DISCONNECTED).await;
    assert_eq!(closed["code"], 1000);
    match timeout(WAIT, ws.next()).await.unwrap() {
        Some(Ok(WsMessage::Close(Some(frame)))) => assert_eq!(u16::from(frame.code), 1000),
        other => panic!("Expected close frame, got {:?}", other),
    }
    assert!(
        timeout(Duration::from_millis(500), connections.recv())
            .await
            .is_err()
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn channel_client_gives_up_when_server_is_down() {
    let port = portpicker::pick_unused_port().expect("No free ports");
    let mut settings = settings(&format!("ws://127.0.0.1:{port}/ws"));
    settings.reconnect.base_interval_ms = 10;
    settings.reconnect.max_delay_ms = 20;
    settings.reconnect.max_attempts = 3;

    let client = ChannelClient::with_websocket(&settings);
    let mut terminal = watch(&client, &[events::MAX_RECONNECT_ATTEMPTS_REACHED]);
    client.connect();

    let payload = expect_event(&mut terminal, events::MAX_RECONNECT_ATTEMPTS_REACHED).await;
    assert_eq!(payload["attempts"], 4);
    assert!(
        timeout(Duration::from_millis(300), terminal.recv())
            .await
            .is_err()
    );
    assert!(!client.connection_status().connected);
}

#[tokio::test]
async fn channel_client_times_out_silent_handshake() {
    let port = portpicker::pick_unused_port().expect("No free ports");
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await.expect("Can't bind");
    // accept TCP and hold the sockets without ever answering the upgrade
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mut settings = settings(&format!("ws://{addr}/ws"));
    settings.server.connect_timeout_ms = 200;
    settings.reconnect.base_interval_ms = 10;
    settings.reconnect.max_delay_ms = 20;
    settings.reconnect.max_attempts = 1;

    let client = ChannelClient::with_websocket(&settings);
    let mut lifecycle = watch(
        &client,
        &[events::DISCONNECTED, events::MAX_RECONNECT_ATTEMPTS_REACHED],
    );
    client.connect();

    let closed = expect_event(&mut lifecycle, events::DISCONNECTED).await;
    assert_eq!(closed["code"], 1006);
    expect_event(&mut lifecycle, events::DISCONNECTED).await;
    let payload = expect_event(&mut lifecycle, events::MAX_RECONNECT_ATTEMPTS_REACHED).await;
    assert_eq!(payload["attempts"], 2);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
