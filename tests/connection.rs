use std::sync::Arc;
use std::time::Duration;

use livepulse::testing::{ConnectBehavior, MockTransport};
use livepulse::transport::{CloseFrame, Frame};
use livepulse::{
    ClientId, ClientSession, ConnectionEvent, ConnectionManager, ConnectionOptions,
    ConnectionState, DisconnectReason, Error, EventKind, WebsiteId,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use url::Url;

fn manager(transport: &MockTransport, options: ConnectionOptions) -> ConnectionManager {
    let session = ClientSession::new(
        ClientId::new("c-1"),
        WebsiteId::new("W1"),
        Url::parse("ws://collector.test/ws").expect("url"),
    );
    ConnectionManager::new(session, options, Arc::new(transport.clone()))
}

fn capture(connection: &ConnectionManager, kind: EventKind) -> mpsc::UnboundedReceiver<ConnectionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    connection.on(
        kind,
        Arc::new(move |event: &ConnectionEvent| {
            let _ = tx.send(event.clone());
        }),
    );
    rx
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_share_one_attempt() {
    let transport = MockTransport::new();
    transport.push_behavior(ConnectBehavior::Delay(Duration::from_secs(1)));
    let connection = manager(&transport, ConnectionOptions::default());

    let (first, second) = tokio::join!(connection.connect(), connection.connect());

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(connection.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_share_one_failure() {
    let transport = MockTransport::new();
    transport.push_behavior(ConnectBehavior::Refuse("collector down".into()));
    let connection = manager(&transport, ConnectionOptions::default());
    let mut errors = capture(&connection, EventKind::Error);

    let (first, second) = tokio::join!(connection.connect(), connection.connect());

    assert!(matches!(first, Err(Error::Connection { .. })));
    assert!(matches!(second, Err(Error::Connection { .. })));
    assert_eq!(transport.connect_count(), 1);

    let Some(ConnectionEvent::Error(message)) = errors.recv().await else {
        panic!("expected error event");
    };
    assert!(message.contains("collector down"));
}

#[tokio::test(start_paused = true)]
async fn test_stats_reach_subscribers_in_registration_order() {
    let transport = MockTransport::new();
    let connection = manager(&transport, ConnectionOptions::default());

    let log = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    for label in ["first", "second"] {
        let log = Arc::clone(&log);
        let done_tx = done_tx.clone();
        connection.on(
            EventKind::Stats,
            Arc::new(move |event: &ConnectionEvent| {
                if let ConnectionEvent::Stats(stats) = event {
                    log.lock().push(format!("{label}:{}:{}", stats.website_id, stats.active_users));
                    let _ = done_tx.send(());
                }
            }),
        );
    }

    connection.connect().await.expect("connect");
    let server = transport.next_server().await;
    server.send_text("not json");
    server.send_json(&json!({ "type": "notification", "body": "ignored" }));
    server.send_json(&json!({ "type": "stats", "websiteId": "W1", "activeUsers": 5 }));

    done_rx.recv().await;
    done_rx.recv().await;
    assert_eq!(*log.lock(), vec!["first:W1:5", "second:W1:5"]);
    assert!(connection.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_sends_leave_then_normal_close() {
    let transport = MockTransport::new();
    let connection = manager(&transport, ConnectionOptions::default());
    let mut disconnects = capture(&connection, EventKind::Disconnect);

    connection.connect().await.expect("connect");
    let mut server = transport.next_server().await;
    assert_eq!(server.recv_json().await.expect("join")["type"], "join");

    connection.disconnect().await;

    let Some(Frame::Text(leave)) = server.recv().await else {
        panic!("expected leave");
    };
    let leave: serde_json::Value = serde_json::from_str(&leave).expect("json");
    assert_eq!(leave, json!({ "type": "leave", "clientId": "c-1", "websiteId": "W1" }));
    assert_eq!(
        server.recv().await,
        Some(Frame::Close(Some(CloseFrame::normal("client disconnect"))))
    );

    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert_eq!(
        disconnects.recv().await,
        Some(ConnectionEvent::Disconnect(DisconnectReason {
            code: 1000,
            will_reconnect: false,
        }))
    );

    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects_after_fixed_delay() {
    let transport = MockTransport::new();
    let connection = manager(&transport, ConnectionOptions::default());
    let mut disconnects = capture(&connection, EventKind::Disconnect);
    let mut connects = capture(&connection, EventKind::Connect);

    connection.connect().await.expect("connect");
    assert!(connects.recv().await.is_some());
    let mut server = transport.next_server().await;

    let dropped_at = Instant::now();
    server.drop_socket();

    assert_eq!(
        disconnects.recv().await,
        Some(ConnectionEvent::Disconnect(DisconnectReason {
            code: 1006,
            will_reconnect: true,
        }))
    );
    assert_eq!(connection.state(), ConnectionState::Reconnecting);
    assert_eq!(connection.reconnect_attempts(), 1);

    let mut server = transport.next_server().await;
    assert_eq!(dropped_at.elapsed(), Duration::from_secs(20));
    assert_eq!(connection.state(), ConnectionState::Open);
    assert_eq!(connection.reconnect_attempts(), 0);
    assert!(connects.recv().await.is_some());
    assert_eq!(server.recv_json().await.expect("join")["type"], "join");
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_from_collector_does_not_reconnect() {
    let transport = MockTransport::new();
    let connection = manager(&transport, ConnectionOptions::default());
    let mut disconnects = capture(&connection, EventKind::Disconnect);

    connection.connect().await.expect("connect");
    let mut server = transport.next_server().await;
    server.close(Some(CloseFrame::normal("maintenance")));

    assert_eq!(
        disconnects.recv().await,
        Some(ConnectionEvent::Disconnect(DisconnectReason {
            code: 1000,
            will_reconnect: false,
        }))
    );

    sleep(Duration::from_secs(120)).await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_notifies_and_reconnects() {
    let transport = MockTransport::new();
    let connection = manager(&transport, ConnectionOptions::default());
    let mut errors = capture(&connection, EventKind::Error);

    connection.connect().await.expect("connect");
    let mut server = transport.next_server().await;
    server.fail("reset by peer");

    let Some(ConnectionEvent::Error(message)) = errors.recv().await else {
        panic!("expected error event");
    };
    assert!(message.contains("reset by peer"));

    let _server = transport.next_server().await;
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_are_capped() {
    let transport = MockTransport::new();
    for _ in 0..3 {
        transport.push_behavior(ConnectBehavior::Refuse("down".into()));
    }
    let options = ConnectionOptions::new()
        .with_reconnect_delay(Duration::from_secs(1))
        .with_reconnect_max_attempts(2);
    let connection = manager(&transport, options);

    assert!(connection.connect().await.is_err());
    assert_eq!(connection.state(), ConnectionState::Reconnecting);
    assert_eq!(connection.reconnect_attempts(), 1);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(connection.reconnect_attempts(), 2);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(transport.connect_count(), 3);
    assert_eq!(connection.reconnect_attempts(), 2);
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.connect_count(), 3);

    // A manual reconnect starts a fresh cycle
    connection.reconnect();
    assert_eq!(connection.state(), ConnectionState::Reconnecting);
    let _server = transport.next_server().await;
    assert_eq!(connection.state(), ConnectionState::Open);
    assert_eq!(connection.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_caller_connect_times_out_without_reconnecting() {
    let transport = MockTransport::new();
    transport.push_behavior(ConnectBehavior::Hang);
    let connection = manager(&transport, ConnectionOptions::default());

    let started = Instant::now();
    let err = connection.connect().await.unwrap_err();

    assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 10_000 }));
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempt_timeout_schedules_next_attempt() {
    let transport = MockTransport::new();
    transport.push_behavior(ConnectBehavior::Refuse("down".into()));
    transport.push_behavior(ConnectBehavior::Hang);
    let options = ConnectionOptions::new()
        .with_connect_timeout(Duration::from_secs(2))
        .with_reconnect_delay(Duration::from_secs(1));
    let connection = manager(&transport, options);

    assert!(connection.connect().await.is_err());

    let _server = transport.next_server().await;
    assert_eq!(transport.connect_count(), 3);
    assert_eq!(connection.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_connect() {
    let transport = MockTransport::new();
    transport.push_behavior(ConnectBehavior::Hang);
    let connection = manager(&transport, ConnectionOptions::default());

    let pending = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.connect().await })
    };
    sleep(Duration::from_secs(1)).await;
    assert_eq!(connection.state(), ConnectionState::Connecting);

    connection.disconnect().await;

    let result = pending.await.expect("join");
    assert!(matches!(result, Err(Error::ConnectionClosed)));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_activity_requires_open_connection() {
    let transport = MockTransport::new();
    let connection = manager(&transport, ConnectionOptions::default());
    let metrics = livepulse::ActivityMetrics {
        click_count: 2,
        scroll_percentage: 40.0,
        time_on_page_seconds: 12,
    };

    assert!(matches!(connection.send_activity(metrics), Err(Error::NotConnected)));

    connection.connect().await.expect("connect");
    let mut server = transport.next_server().await;
    connection.send_activity(metrics).expect("send");

    let _join = server.recv_json().await;
    assert_eq!(
        server.recv_json().await,
        Some(json!({
            "type": "activity",
            "clientId": "c-1",
            "websiteId": "W1",
            "metrics": { "clickCount": 2, "scrollPercentage": 40.0, "timeOnPageSeconds": 12 }
        }))
    );
}
