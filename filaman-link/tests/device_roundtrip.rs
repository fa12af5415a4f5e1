//! WebSocket and HTTP transports against an in-process device
//!
//! The mock device greets every WebSocket client with an `amsData` frame,
//! answers heartbeats, records what it receives and serves `/api/ams` for
//! the polling fallback.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use filaman_common::config::LinkSettings;
use filaman_common::protocol::Subsystem;
use filaman_common::{DisconnectReason, EventBus, LinkEvent, SessionState};
use filaman_link::{AmsSource, HttpAmsSource, PollError, SessionManager, WsConnector};
use reqwest::Url;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

#[derive(Clone, Default)]
struct Device {
    received: Arc<Mutex<Vec<Value>>>,
    /// Close every socket right after the greeting
    hang_up: bool,
}

fn ams_payload() -> Value {
    json!([
        {
            "ams_id": 0,
            "tray": [
                {"id": 0, "tray_type": "PLA", "tray_color": "FF0000FF", "tag_uid": "A1B2C3D4"},
                {"id": 1, "tray_type": ""}
            ]
        }
    ])
}

async fn ws_handler(ws: WebSocketUpgrade, State(device): State<Device>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, device))
}

async fn handle_socket(mut socket: WebSocket, device: Device) {
    let greeting = json!({"type": "amsData", "payload": ams_payload()}).to_string();
    if socket.send(Message::Text(greeting)).await.is_err() {
        return;
    }
    if device.hang_up {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let is_heartbeat = value["type"] == "heartbeat";
        device.received.lock().unwrap().push(value);
        if is_heartbeat {
            let reply = json!({
                "type": "heartbeat",
                "freeHeap": 120,
                "bambu_connected": 1,
                "spoolman_connected": 1
            });
            if socket.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}

async fn serve(device: Device) -> SocketAddr {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/ams", get(|| async { Json(ams_payload()) }))
        .with_state(device);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fast_settings() -> LinkSettings {
    LinkSettings {
        reconnect_interval_ms: 200,
        probe_interval_ms: 100,
        liveness_timeout_ms: 1_000,
        poll_interval_ms: 100,
        connect_timeout_ms: 1_000,
        ..LinkSettings::default()
    }
}

async fn wait_for(
    events: &mut broadcast::Receiver<LinkEvent>,
    predicate: impl Fn(&LinkEvent) -> bool,
) -> LinkEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event bus closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for an event")
}

/// Open a live session, receive telemetry and talk to the device
#[tokio::test]
async fn test_websocket_session_roundtrip() {
    let device = Device::default();
    let addr = serve(device.clone()).await;
    let url = Url::parse(&format!("ws://{}/ws", addr)).unwrap();

    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let handle = SessionManager::spawn(
        fast_settings(),
        Arc::new(WsConnector::new(url)),
        None,
        bus,
    );
    handle.connect().await.unwrap();

    match wait_for(&mut events, |e| matches!(e, LinkEvent::AmsData { .. })).await {
        LinkEvent::AmsData { units, .. } => {
            assert_eq!(units.len(), 1);
            assert_eq!(units[0].tray[0].tag_uid.as_deref(), Some("A1B2C3D4"));
            assert!(units[0].tray[1].is_empty());
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(handle.is_connected());

    // first probe goes out after 100 ms and the device answers it
    match wait_for(&mut events, |e| matches!(e, LinkEvent::PeerStatus { .. })).await {
        LinkEvent::PeerStatus { status, .. } => {
            assert_eq!(status.free_heap_kb, Some(120));
            assert_eq!(status.spoolman_connected, Some(true));
        }
        other => panic!("unexpected event {:?}", other),
    }

    handle
        .request_peer_reconnect(Subsystem::Bambu)
        .await
        .unwrap();
    timeout(Duration::from_secs(5), async {
        loop {
            let seen = device
                .received
                .lock()
                .unwrap()
                .iter()
                .any(|v| v["type"] == "reconnect" && v["payload"] == "bambu");
            if seen {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("device never saw the reconnect request");

    handle.shutdown().await;
    assert_eq!(handle.state(), SessionState::Disconnected);
}

/// A device that closes the socket triggers a reconnect
#[tokio::test]
async fn test_peer_close_reconnects() {
    let device = Device {
        hang_up: true,
        ..Device::default()
    };
    let addr = serve(device).await;
    let url = Url::parse(&format!("ws://{}/ws", addr)).unwrap();

    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let handle = SessionManager::spawn(
        fast_settings(),
        Arc::new(WsConnector::new(url)),
        None,
        bus,
    );
    handle.connect().await.unwrap();

    let closed = wait_for(&mut events, |e| matches!(e, LinkEvent::Disconnected { .. })).await;
    assert!(matches!(
        closed,
        LinkEvent::Disconnected {
            reason: DisconnectReason::TransportLost(_),
            ..
        }
    ));
    wait_for(&mut events, |e| {
        matches!(e, LinkEvent::ReconnectScheduled { delay_ms: 200, .. })
    })
    .await;
    wait_for(&mut events, |e| {
        matches!(e, LinkEvent::StateChanged { to: SessionState::Open, .. })
    })
    .await;

    handle.shutdown().await;
}

/// With the live endpoint missing, AMS data still arrives by polling
#[tokio::test]
async fn test_polling_fallback_over_http() {
    let addr = serve(Device::default()).await;
    let missing = Url::parse(&format!("ws://{}/no-such-socket", addr)).unwrap();
    let ams = Url::parse(&format!("http://{}/api/ams", addr)).unwrap();

    let source = HttpAmsSource::new(ams, Duration::from_secs(1)).unwrap();
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let handle = SessionManager::spawn(
        fast_settings(),
        Arc::new(WsConnector::new(missing)),
        Some(Arc::new(source)),
        bus,
    );
    handle.connect().await.unwrap();

    wait_for(&mut events, |e| {
        matches!(
            e,
            LinkEvent::Disconnected {
                reason: DisconnectReason::TransportUnavailable(_),
                ..
            }
        )
    })
    .await;
    match wait_for(&mut events, |e| matches!(e, LinkEvent::AmsData { .. })).await {
        LinkEvent::AmsData { units, .. } => {
            assert_eq!(units[0].tray[0].tray_type.as_deref(), Some("PLA"))
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(handle.state(), SessionState::Disconnected);

    handle.shutdown().await;
}

/// Status and body errors from `/api/ams` surface as typed poll errors
#[tokio::test]
async fn test_http_source_errors() {
    let app = Router::new()
        .route("/api/ams", get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy") }))
        .route("/api/garbled", get(|| async { "not json" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let unavailable = HttpAmsSource::new(
        Url::parse(&format!("http://{}/api/ams", addr)).unwrap(),
        Duration::from_secs(1),
    )
    .unwrap();
    assert!(matches!(unavailable.fetch().await, Err(PollError::Status(503))));

    let garbled = HttpAmsSource::new(
        Url::parse(&format!("http://{}/api/garbled", addr)).unwrap(),
        Duration::from_secs(1),
    )
    .unwrap();
    assert!(matches!(garbled.fetch().await, Err(PollError::Parse(_))));
}
