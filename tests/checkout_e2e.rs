//! Flujo completo sobre los backends en disco y los escenarios del CLI.
use c2d_checkout::adapters::{Scenario, ScenarioRig, SubmittedJob};
use c2d_checkout::core::credential::{CredentialQueue, SessionStore, SharedQueue, SystemClock};
use c2d_checkout::core::{CheckoutError, CheckoutPhase, VerificationDriver};
use c2d_checkout::domain::{ServiceRef, TokenAmount};
use c2d_checkout::persistence::{FileSessionStore, JsonlEventStore};
use c2d_checkout::{init_logging, open_engine, open_session_store, AppConfig};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn app(dir: &Path) -> AppConfig {
    let data_dir = dir.display().to_string();
    AppConfig::from_lookup(|k| match k {
        "CHECKOUT_DATA_DIR" => Some(data_dir.clone()),
        "CHECKOUT_ESCROW_ADDRESS" => Some("0xescrow".into()),
        "CHECKOUT_DEBOUNCE_MS" => Some("0".into()),
        _ => None,
    }).expect("config")
}

fn rig(name: &str, app: &AppConfig) -> ScenarioRig {
    let path = format!("{}/crates/checkout-cli/scenarios/{name}.json", env!("CARGO_MANIFEST_DIR"));
    Scenario::from_path(path).expect("escenario").build(&app.checkout).expect("rig")
}

fn queue(app: &AppConfig, rig: &ScenarioRig) -> SharedQueue {
    let store = open_session_store(app).expect("sesiones");
    let mut q = CredentialQueue::new(Arc::new(store), Arc::new(SystemClock), app.checkout.credential_ttl);
    q.init_queue(rig.verification_items());
    Arc::new(Mutex::new(q))
}

fn amt(s: &str) -> TokenAmount {
    TokenAmount::parse(s).unwrap()
}

#[tokio::test]
async fn paid_scenario_runs_end_to_end_on_disk() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let rig = rig("paid-single-token", &app);
    let mut engine = open_engine(&app, rig.ports(), None, None).unwrap();

    let quote = engine.quote(&rig.request, &CancellationToken::new()).await.unwrap();
    // (2.5 + 1 + 1.2) * 1.01
    assert_eq!(quote.summary.entry("OCEAN").unwrap().amount, amt("4.747"));

    let submission = assert_ok!(engine.start_job(&rig.request, &queue(&app, &rig), &CancellationToken::new()).await);
    assert_eq!(submission.job_id, "job-0001");

    let on_disk = JsonlEventStore::read_events(&app.store.event_log).unwrap();
    let names: Vec<&str> = on_disk.iter().map(|e| e.kind.name()).collect();
    assert_eq!(names,
               vec!["CheckoutInitialized", "PricingResolved", "EscrowReady", "AlgorithmOrdered", "DatasetOrdered", "DatasetsOrdered", "JobSubmitted"]);
    assert!(on_disk.iter().all(|e| e.checkout_id == submission.checkout_id));
}

#[tokio::test]
async fn mixed_tokens_quote_keeps_one_entry_per_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let rig = rig("mixed-tokens", &app);
    let engine = open_engine(&app, rig.ports(), None, None).unwrap();
    let quote = engine.quote(&rig.request, &CancellationToken::new()).await.unwrap();

    let symbols: Vec<&str> = quote.summary.entries.iter().map(|e| e.token_symbol.as_str()).collect();
    assert_eq!(symbols, vec!["OCEAN", "USDC"]);
    assert_eq!(quote.summary.entry("OCEAN").unwrap().amount, amt("2.222"));
    assert_eq!(quote.summary.entry("USDC").unwrap().amount, amt("10.1"));
}

#[tokio::test]
async fn failed_credential_blocks_until_reverified() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let rig = rig("credential-required", &app);
    let queue = queue(&app, &rig);
    let driver = VerificationDriver::new(queue.clone(), rig.verifier.clone(), app.checkout.auto_advance_debounce);
    let cancel = CancellationToken::new();
    let mut engine = open_engine(&app, rig.ports(), None, None).unwrap();

    let report = driver.run_from(0, &cancel).await.unwrap();
    assert_eq!(report.verified, vec![0]);
    assert_eq!(report.failed, Some(1));

    let err = assert_err!(engine.start_job(&rig.request, &queue, &cancel).await);
    assert!(matches!(err, CheckoutError::CredentialInvalid { ref asset_id, expired: false, .. } if asset_id == "did:d2"));
    assert_eq!(engine.phase().unwrap(), CheckoutPhase::Idle);

    let d2 = ServiceRef::new("did:d2", "compute");
    rig.verifier.succeed(&d2);
    let next = queue.lock().await.next_pending().expect("d2 pendiente");
    assert_eq!(driver.run_from(next, &cancel).await.unwrap().verified, vec![1]);

    assert_ok!(engine.start_job(&rig.request, &queue, &cancel).await);
    let jobs = rig.provider.jobs();
    let SubmittedJob::Paid(job) = &jobs[0] else { panic!("se esperaba un job de pago") };
    let sessions: Vec<&str> = job.policy_payloads.iter().map(|p| p.session_id.as_str()).collect();
    assert_eq!(sessions, vec!["session-did:d1-compute", "session-did:d2-compute"]);

    let sessions = FileSessionStore::open(&app.store.session_file).unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.get("credential_did:d2_compute").is_some());
}

#[tokio::test]
async fn free_tier_scenario_submits_without_payments() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let rig = rig("free-tier", &app);
    let mut engine = open_engine(&app, rig.ports(), None, None).unwrap();
    let submission = engine.start_job(&rig.request, &queue(&app, &rig), &CancellationToken::new()).await.unwrap();
    assert!(submission.funding.is_none());
    assert!(rig.ledger.writes().is_empty());
    assert!(matches!(rig.provider.jobs()[0], SubmittedJob::Free(_)));
}
