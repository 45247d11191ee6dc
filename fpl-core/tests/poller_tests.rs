mod common;

use std::sync::Arc;
use std::time::Duration;

use fpl_core::{spawn_detector, ChangeDetector, ChangeType, MemoryStore, PollConfig};
use tokio::sync::mpsc;
use wiremock::MockServer;

use common::{catalog, client, element, mount_catalog};

#[tokio::test]
async fn spawn_detector_forwards_change_batches() {
    let server = MockServer::start().await;
    mount_catalog(&server, catalog(vec![element(1, "", None, None)])).await;
    let detector = Arc::new(ChangeDetector::new(
        Arc::new(MemoryStore::new()),
        client(&server),
    ));
    assert!(detector.run_cycle().await.is_initial_run);

    server.reset().await;
    mount_catalog(&server, catalog(vec![element(1, "Knock", Some("t1"), Some(75))])).await;

    let (tx, mut rx) = mpsc::channel(8);
    let cfg = PollConfig {
        interval: Duration::from_millis(50),
    };
    let handle = spawn_detector(detector.clone(), cfg, tx);

    let batch = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].player_id, 1);
    assert_eq!(batch[0].change_type, ChangeType::New);

    handle.stop().await.expect("stop poller");
    assert_eq!(detector.get_events(None).await.unwrap().len(), 1);
}
