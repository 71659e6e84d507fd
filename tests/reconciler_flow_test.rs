// End-to-end reconciler flow against a mock feed server.
//
// Drives a real poller task at a short interval and observes the sink:
// adds on the first snapshot, in-place updates and removals on the second,
// fallback to empty past the grace period, and silence after stop.

use mapfeed::feed::{Entity, VehicleFeed};
use mapfeed::reconcile::{PollOptions, Reconciler, RenderSink};
use mapfeed::transit::TransitDirectory;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test sink & fixtures ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum SinkOp {
    Add(String),
    Update(String),
    Remove(String),
}

/// Sink whose call log is shared with the test.
#[derive(Clone, Default)]
struct SharedSink {
    ops: Arc<Mutex<Vec<SinkOp>>>,
}

impl SharedSink {
    fn ops(&self) -> Vec<SinkOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl RenderSink for SharedSink {
    fn add_entity(&mut self, entity: &Entity) {
        self.ops.lock().unwrap().push(SinkOp::Add(entity.id.clone()));
    }
    fn update_entity(&mut self, entity: &Entity) {
        self.ops
            .lock()
            .unwrap()
            .push(SinkOp::Update(entity.id.clone()));
    }
    fn remove_entity(&mut self, id: &str) {
        self.ops.lock().unwrap().push(SinkOp::Remove(id.to_string()));
    }
}

fn vehicle_body(entries: &[(&str, f64, f64)]) -> String {
    let positions: Vec<String> = entries
        .iter()
        .map(|(id, lng, lat)| {
            format!(
                r#"{{"id": "{}", "vehicle": {{"id": "{}", "label": "{}"}}, "position": {{"latitude": {}, "longitude": {}}}, "timestamp": 1754650000}}"#,
                id, id, id, lat, lng
            )
        })
        .collect();
    format!(r#"{{"vehiclePositions": [{}]}}"#, positions.join(","))
}

fn feed_for(server: &mockito::ServerGuard) -> Arc<VehicleFeed> {
    Arc::new(VehicleFeed::new(
        format!("{}/gtfs-rt.json", server.url()),
        Arc::new(TransitDirectory::empty()),
        Duration::from_secs(2),
    ))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshots_reconcile_and_stop_silences_the_sink() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/gtfs-rt.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(vehicle_body(&[("a", 0.0, 0.1), ("b", 1.0, 1.1)]))
        .create_async()
        .await;

    let sink = SharedSink::default();
    let handle = Reconciler::new(
        feed_for(&server),
        Box::new(sink.clone()),
        PollOptions {
            interval: Duration::from_millis(50),
            grace_period: Duration::from_secs(60),
        },
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let ops = sink.ops();
    assert!(ops.contains(&SinkOp::Add("a".to_string())), "ops: {:?}", ops);
    assert!(ops.contains(&SinkOp::Add("b".to_string())), "ops: {:?}", ops);

    // Newer mocks take precedence: switch the feed to the second snapshot
    first.remove_async().await;
    let _second = server
        .mock("GET", "/gtfs-rt.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(vehicle_body(&[("b", 2.0, 2.1), ("c", 3.0, 3.1)]))
        .create_async()
        .await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let ops = sink.ops();
    assert!(
        ops.contains(&SinkOp::Update("b".to_string())),
        "\"b\" must be updated in place: {:?}",
        ops
    );
    assert!(
        !ops.contains(&SinkOp::Remove("b".to_string())),
        "\"b\" must never be recreated: {:?}",
        ops
    );
    assert!(ops.contains(&SinkOp::Add("c".to_string())), "ops: {:?}", ops);
    assert!(
        ops.contains(&SinkOp::Remove("a".to_string())),
        "ops: {:?}",
        ops
    );

    // State reads reflect the latest snapshot
    let ids: Vec<String> = handle.entities().iter().map(|e| e.id.clone()).collect();
    assert!(ids.contains(&"b".to_string()) && ids.contains(&"c".to_string()));
    assert!(!ids.contains(&"a".to_string()));

    // After stop, the sink hears nothing more
    handle.stop();
    let count = sink.ops().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.ops().len(), count, "sink called after stop");
}

#[tokio::test]
async fn sustained_failure_falls_back_to_empty() {
    let mut server = mockito::Server::new_async().await;
    let good = server
        .mock("GET", "/gtfs-rt.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(vehicle_body(&[("a", 0.0, 0.1)]))
        .create_async()
        .await;

    let sink = SharedSink::default();
    let handle = Reconciler::new(
        feed_for(&server),
        Box::new(sink.clone()),
        PollOptions {
            interval: Duration::from_millis(50),
            // Short grace so the fallback happens within the test
            grace_period: Duration::from_millis(200),
        },
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(sink.ops().contains(&SinkOp::Add("a".to_string())));

    // From here on every poll fails
    good.remove_async().await;
    let _broken = server
        .mock("GET", "/gtfs-rt.json")
        .with_status(500)
        .create_async()
        .await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(
        sink.ops().contains(&SinkOp::Remove("a".to_string())),
        "display must clear after the grace period: {:?}",
        sink.ops()
    );
    assert!(handle.entities().is_empty());

    handle.stop();
}

#[tokio::test]
async fn stop_with_fetch_in_flight_never_reaches_the_sink() {
    // Responder that never answers within the test's lifetime
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                let _ = socket.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
            });
        }
    });

    let feed = Arc::new(VehicleFeed::new(
        format!("http://{}/gtfs-rt.json", addr),
        Arc::new(TransitDirectory::empty()),
        Duration::from_secs(30),
    ));

    let sink = SharedSink::default();
    let handle = Reconciler::new(
        feed,
        Box::new(sink.clone()),
        PollOptions {
            interval: Duration::from_millis(50),
            grace_period: Duration::from_secs(60),
        },
    )
    .spawn();

    // Let the first fetch get in flight, then tear down
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.stop();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(
        sink.ops().is_empty(),
        "no sink calls may happen after teardown: {:?}",
        sink.ops()
    );
}
