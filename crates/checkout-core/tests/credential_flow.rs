use chrono::Utc;
use checkout_adapters::ScriptedVerifier;
use checkout_core::credential::{spawn_expiry_ticker, CredentialQueue, InMemorySessionStore, ManualClock, QueueError, SessionStore, VerificationDriver, VerificationItem, VerificationStatus};
use checkout_domain::{AssetSelection, ServiceRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

fn credentialed_items(n: usize) -> Vec<VerificationItem> {
    (0..n).map(|i| VerificationItem::from_selection(&AssetSelection::dataset(&format!("did:{i}"), "compute", "ds").with_credential(true)))
          .collect()
}

fn shared_queue(clock: &ManualClock, store: Arc<InMemorySessionStore>, n: usize) -> Arc<Mutex<CredentialQueue>> {
    let mut q = CredentialQueue::new(store, Arc::new(clock.clone()), Duration::from_secs(300));
    q.init_queue(credentialed_items(n));
    Arc::new(Mutex::new(q))
}

#[tokio::test(start_paused = true)]
async fn driver_auto_advances_and_stops_on_failure() {
    let clock = ManualClock::new(Utc::now());
    let queue = shared_queue(&clock, Arc::new(InMemorySessionStore::new()), 3);
    let verifier = Arc::new(ScriptedVerifier::new());
    verifier.fail(ServiceRef::new("did:1", "compute"));
    let driver = VerificationDriver::new(queue.clone(), verifier.clone(), Duration::from_millis(500));
    let cancel = CancellationToken::new();

    let report = driver.run_from(0, &cancel).await.unwrap();
    assert_eq!(report.verified, vec![0]);
    assert_eq!(report.failed, Some(1));
    {
        let q = queue.lock().await;
        assert_eq!(q.items()[1].status, VerificationStatus::Failed);
        assert_eq!(q.items()[2].status, VerificationStatus::Unverified);
    }

    // pedir el ítem 2 redirige primero al fallido
    verifier.succeed(&ServiceRef::new("did:1", "compute"));
    let report = driver.run_from(2, &cancel).await.unwrap();
    assert_eq!(report.verified, vec![1, 2]);
    assert!(queue.lock().await.all_verified());
    let calls: Vec<String> = verifier.calls().into_iter().map(|s| s.asset_id).collect();
    assert_eq!(calls, vec!["did:0", "did:1", "did:1", "did:2"]);
}

#[tokio::test(start_paused = true)]
async fn only_one_item_is_checking_at_a_time() {
    let clock = ManualClock::new(Utc::now());
    let queue = shared_queue(&clock, Arc::new(InMemorySessionStore::new()), 2);
    let verifier = Arc::new(ScriptedVerifier::new().with_delay(Duration::from_secs(1)));
    let driver = VerificationDriver::new(queue.clone(), verifier, Duration::from_millis(500));
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move { driver.run_from(0, &task_cancel).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    {
        let mut q = queue.lock().await;
        assert_eq!(q.checking_index(), Some(0));
        assert_eq!(q.start_verification(1), Err(QueueError::Busy(0)));
        assert_eq!(q.items().iter().filter(|i| i.status == VerificationStatus::Checking).count(), 1);
    }

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.verified, vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_verification_leaves_item_retryable() {
    let clock = ManualClock::new(Utc::now());
    let queue = shared_queue(&clock, Arc::new(InMemorySessionStore::new()), 1);
    let verifier = Arc::new(ScriptedVerifier::new().with_delay(Duration::from_secs(30)));
    let driver = VerificationDriver::new(queue.clone(), verifier, Duration::from_millis(500));
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move { driver.run_from(0, &task_cancel).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();
    assert!(report.cancelled);
    let q = queue.lock().await;
    assert_eq!(q.items()[0].status, VerificationStatus::Failed);
    assert_eq!(q.checking_index(), None);
}

#[tokio::test(start_paused = true)]
async fn expiry_ticker_expires_stale_credentials() {
    let clock = ManualClock::new(Utc::now());
    let store = Arc::new(InMemorySessionStore::new());
    let queue = shared_queue(&clock, store.clone(), 1);
    {
        let mut q = queue.lock().await;
        q.start_verification(0).unwrap();
        q.complete(0, None).unwrap();
    }
    assert_eq!(store.len(), 1);
    let cancel = CancellationToken::new();
    let ticker = spawn_expiry_ticker(queue.clone(), Duration::from_secs(10), cancel.clone());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(queue.lock().await.items()[0].status, VerificationStatus::Verified);

    clock.advance(chrono::Duration::seconds(301));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(queue.lock().await.items()[0].status, VerificationStatus::Expired);
    assert!(store.get("credential_did:0_compute").is_some());

    cancel.cancel();
    ticker.await.unwrap();
}
