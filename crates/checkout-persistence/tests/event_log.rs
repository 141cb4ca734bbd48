use checkout_adapters::{LedgerScript, Scenario, ScenarioRig};
use checkout_core::credential::{CredentialQueue, InMemorySessionStore, SharedQueue, SystemClock};
use checkout_core::{CheckoutConfig, CheckoutEngine, CheckoutEventKind, CheckoutPhase, CheckoutRepository, EventStore, InMemoryCheckoutRepository};
use checkout_domain::Tier;
use checkout_persistence::{JsonlEventStore, PersistenceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn scenario_path(name: &str) -> String {
    format!("{}/../checkout-cli/scenarios/{name}.json", env!("CARGO_MANIFEST_DIR"))
}

fn config() -> CheckoutConfig {
    CheckoutConfig { escrow_contract_address: "0xescrow".into(),
                     ..CheckoutConfig::default() }
}

fn rig(name: &str) -> ScenarioRig {
    Scenario::from_path(scenario_path(name)).expect("escenario").build(&config()).expect("rig")
}

fn queue(rig: &ScenarioRig) -> SharedQueue {
    let mut q = CredentialQueue::new(Arc::new(InMemorySessionStore::new()), Arc::new(SystemClock), Duration::from_secs(300));
    q.init_queue(rig.verification_items());
    Arc::new(Mutex::new(q))
}

#[test]
fn append_assigns_per_checkout_seq_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    {
        let mut store = JsonlEventStore::open(&path).unwrap();
        let init = |tier| CheckoutEventKind::CheckoutInitialized { tier,
                                                                   environment_id: "env-1".into(),
                                                                   chain_id: 8996 };
        assert_eq!(store.append_kind(a, init(Tier::Paid)).unwrap().seq, 0);
        assert_eq!(store.append_kind(b, init(Tier::Free)).unwrap().seq, 0);
        assert_eq!(store.append_kind(a, CheckoutEventKind::JobSubmitted { job_id: "job-1".into() }).unwrap().seq, 1);
    }
    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 3);

    let store = JsonlEventStore::open(&path).unwrap();
    assert_eq!(store.checkouts().unwrap(), vec![a, b]);
    let events = store.list(a).unwrap();
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(events[1].kind.name(), "JobSubmitted");
    assert!(store.list(Uuid::new_v4()).unwrap().is_empty());
    assert_eq!(JsonlEventStore::read_events(&path).unwrap().len(), 3);
}

#[test]
fn out_of_order_seq_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let id = Uuid::new_v4();
    {
        let mut store = JsonlEventStore::open(&path).unwrap();
        store.append_kind(id, CheckoutEventKind::JobSubmitted { job_id: "x".into() }).unwrap();
    }
    // duplicar la línea deja dos eventos con seq 0
    let line = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, format!("{line}{line}")).unwrap();
    match JsonlEventStore::open(&path) {
        Err(PersistenceError::Corrupt { line, .. }) => assert_eq!(line, 2),
        other => panic!("se esperaba Corrupt, llegó {other:?}"),
    }
}

#[tokio::test]
async fn failed_checkout_resumes_from_disk_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let rig = rig("dataset-revert");
    let queue = queue(&rig);
    let cancel = CancellationToken::new();

    let checkout_id = {
        let store = JsonlEventStore::open(&path).unwrap();
        let mut engine = CheckoutEngine::builder(store, InMemoryCheckoutRepository::new(), rig.ports()).config(config())
                                                                                                       .build();
        assert!(engine.start_job(&rig.request, &queue, &cancel).await.is_err());
        assert_eq!(engine.phase().unwrap(), CheckoutPhase::Failed);
        engine.checkout_id()
    };

    let store = JsonlEventStore::open(&path).unwrap();
    let mut engine = CheckoutEngine::builder(store, InMemoryCheckoutRepository::new(), rig.ports()).config(config())
                                                                                                   .checkout_id(checkout_id)
                                                                                                   .build();
    let failed = engine.instance().unwrap();
    assert_eq!(failed.phase, CheckoutPhase::Failed);
    assert_eq!(failed.failed_phase, Some(CheckoutPhase::AlgorithmOrdered));
    assert!(failed.receipts.is_empty());

    rig.ledger.set_script(LedgerScript::default());
    assert_eq!(engine.retry().unwrap(), 2);
    let submission = engine.start_job(&rig.request, &queue, &cancel).await.expect("reintento");
    assert_eq!(submission.receipts.len(), 3);

    // El replay del archivo coincide con el estado que ve el engine.
    let reread = JsonlEventStore::read_events(&path).unwrap();
    let replayed = InMemoryCheckoutRepository::new().load(checkout_id, &reread);
    assert_eq!(replayed, engine.instance().unwrap());
    assert_eq!(replayed.phase, CheckoutPhase::JobSubmitted);
    assert_eq!(replayed.attempt, 2);
}
