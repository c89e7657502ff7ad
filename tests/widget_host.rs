use std::sync::Arc;
use std::time::Duration;

use livepulse::testing::{ConnectBehavior, MockServer, MockTransport};
use livepulse::transport::Frame;
use livepulse::{
    ClientId, ConnectionState, ContainerRef, MemoryClientIdStore, MemoryContainer, PageSignal,
    PurchaseNotice, Result, Visibility, Widget, WidgetConfig, WidgetData, WidgetHost,
};
use serde_json::json;
use tokio::time::sleep;

fn host(transport: &MockTransport, container: &Arc<MemoryContainer>, widgets: Vec<WidgetConfig>) -> WidgetHost {
    WidgetHost::builder()
        .server_url("ws://collector.test/ws")
        .website_id("W1")
        .client_id_store(MemoryClientIdStore::with_id(ClientId::new("c-1")))
        .transport(transport.clone())
        .container(Arc::clone(container) as ContainerRef)
        .widgets(widgets)
        .build()
        .expect("build")
}

/// Polls `check` while letting background tasks run.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn joined_server(transport: &MockTransport) -> MockServer {
    let mut server = transport.next_server().await;
    assert_eq!(server.recv_json().await.expect("join")["type"], "join");
    server
}

#[tokio::test(start_paused = true)]
async fn test_stats_flow_from_collector_to_widgets() {
    let transport = MockTransport::new();
    let container = MemoryContainer::shared("sidebar");
    let host = host(
        &transport,
        &container,
        vec![
            WidgetConfig::new("viewers"),
            WidgetConfig::new("analytics"),
            WidgetConfig::new("missing"),
        ],
    );

    host.start().await;
    let server = joined_server(&transport).await;
    assert_eq!(host.with_registry(|r| r.active_types().len()), 2);

    server.send_json(&json!({
        "type": "stats",
        "websiteId": "W1",
        "activeUsers": 5,
        "totalClicks": 40,
        "avgScrollPercentage": 62.4,
        "avgTimeOnPage": 31.0
    }));

    assert!(eventually(|| container.content("viewers").is_some()).await);
    assert_eq!(
        container.content("viewers").as_deref(),
        Some("5 people are viewing this page")
    );
    assert_eq!(
        container.content("analytics").as_deref(),
        Some("Active users: 5 | Total clicks: 40 | Avg scroll: 62% | Avg time: 31s")
    );
    assert!(container.content("missing").is_none());

    host.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_hidden_page_flushes_activity() {
    let transport = MockTransport::new();
    let container = MemoryContainer::shared("sidebar");
    let host = host(&transport, &container, Vec::new());

    host.start().await;
    let mut server = joined_server(&transport).await;

    sleep(Duration::from_secs(5)).await;
    host.record(PageSignal::Click);
    host.record(PageSignal::Click);
    host.record(PageSignal::scroll(300.0, 1000.0));
    host.record(PageSignal::Visibility(Visibility::Hidden));

    assert_eq!(
        server.recv_json().await,
        Some(json!({
            "type": "activity",
            "clientId": "c-1",
            "websiteId": "W1",
            "metrics": { "clickCount": 2, "scrollPercentage": 30.0, "timeOnPageSeconds": 5 }
        }))
    );
    assert_eq!(host.tracker().metrics().click_count, 0);

    host.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_leaves_and_unmounts() {
    let transport = MockTransport::new();
    let container = MemoryContainer::shared("sidebar");
    let host = host(&transport, &container, vec![WidgetConfig::new("viewers")]);

    host.start().await;
    let mut server = joined_server(&transport).await;
    host.push(
        WidgetData::Stats(livepulse::StatsMessage {
            active_users: 3,
            ..Default::default()
        }),
        Some("viewers"),
    );
    assert!(!container.is_empty());

    host.record(PageSignal::Click);
    host.stop().await;

    let activity = server.recv_json().await.expect("final activity");
    assert_eq!(activity["type"], "activity");
    assert_eq!(activity["metrics"]["clickCount"], 1);
    assert_eq!(server.recv_json().await.expect("leave")["type"], "leave");
    assert!(matches!(server.recv().await, Some(Frame::Close(Some(_)))));

    assert!(container.is_empty());
    assert!(!host.is_started());
    assert!(!host.tracker().is_running());
    assert_eq!(host.connection().state(), ConnectionState::Disconnected);

    // Second stop is a no-op
    host.stop().await;
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_survives_unreachable_collector() {
    let transport = MockTransport::new();
    transport.push_behavior(ConnectBehavior::Refuse("down".into()));
    let container = MemoryContainer::shared("sidebar");
    let host = host(&transport, &container, vec![WidgetConfig::new("viewers")]);

    host.start().await;

    assert!(host.is_started());
    assert!(host.tracker().is_running());
    assert_eq!(host.connection().state(), ConnectionState::Reconnecting);

    // Signals while offline are kept for the next flush
    host.record(PageSignal::Click);
    assert!(!host.tracker().flush());
    assert_eq!(host.tracker().metrics().click_count, 1);

    let _server = joined_server(&transport).await;
    assert!(host.connection().is_open());
    assert!(host.tracker().flush());
    assert_eq!(host.tracker().metrics().click_count, 0);

    host.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let transport = MockTransport::new();
    let container = MemoryContainer::shared("sidebar");
    let host = host(&transport, &container, vec![WidgetConfig::new("viewers")]);

    host.start().await;
    host.start().await;

    assert_eq!(transport.connect_count(), 1);
    assert_eq!(host.with_registry(|r| r.active_types().len()), 1);
    host.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_purchase_toast_dismisses_itself() {
    let transport = MockTransport::new();
    let container = MemoryContainer::shared("sidebar");
    let host = host(
        &transport,
        &container,
        vec![WidgetConfig::new("purchases").with_options(json!({ "displayMs": 2000 }))],
    );
    host.start().await;

    host.push(
        PurchaseNotice::new("Walnut desk").with_location("Lisbon"),
        Some("purchases"),
    );
    assert_eq!(
        container.content("purchases").as_deref(),
        Some("Someone in Lisbon just bought Walnut desk")
    );

    sleep(Duration::from_millis(2100)).await;
    assert!(container.content("purchases").is_none());
    host.stop().await;
}

struct Banner {
    text: String,
    container: Option<ContainerRef>,
}

impl Widget for Banner {
    fn mount(&mut self, container: ContainerRef) -> Result<()> {
        container.render("banner", &self.text);
        self.container = Some(container);
        Ok(())
    }

    fn update(&mut self, _data: &WidgetData) {}

    fn unmount(&mut self) {
        if let Some(container) = self.container.take() {
            container.remove("banner");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_custom_widgets_and_container_moves() {
    let transport = MockTransport::new();
    let first = MemoryContainer::shared("sidebar");
    let second = MemoryContainer::shared("footer");

    let host = WidgetHost::builder()
        .server_url("ws://collector.test/ws")
        .website_id("W1")
        .transport(transport.clone())
        .container(Arc::clone(&first) as ContainerRef)
        .widget(WidgetConfig::new("banner").with_options(json!({ "text": "Free shipping" })))
        .register_widget("banner", |config: &WidgetConfig| {
            let text: String = config.option("text")?.unwrap_or_default();
            Ok(Box::new(Banner { text, container: None }) as Box<dyn Widget>)
        })
        .build()
        .expect("build");

    host.start().await;
    assert_eq!(first.content("banner").as_deref(), Some("Free shipping"));

    host.set_container(Arc::clone(&second) as ContainerRef);
    assert!(first.is_empty());
    assert_eq!(second.content("banner").as_deref(), Some("Free shipping"));

    host.stop().await;
    assert!(second.is_empty());
}
