#![allow(dead_code)]

use checkout_adapters::{Scenario, ScenarioRig};
use checkout_core::credential::{CredentialQueue, InMemorySessionStore, SharedQueue, SystemClock};
use checkout_core::{CheckoutConfig, CheckoutEngine, InMemoryCheckoutRepository, InMemoryEventStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub type MemEngine = CheckoutEngine<InMemoryEventStore, InMemoryCheckoutRepository>;

/// Checkout de pago: un dataset (2.5 OCEAN) y un algoritmo (1 OCEAN) sobre
/// un entorno que cobra 0.015 OCEAN/min con la selección mínima (60 min ->
/// 0.90 OCEAN).
pub fn paid_scenario_json() -> serde_json::Value {
    json!({
        "name": "paid-single-token",
        "account": "0xuser",
        "wallet_chain_id": 8996,
        "fee_rate_percent": "1",
        "tier": "paid",
        "environment": {
            "id": "env-1",
            "chain_id": 8996,
            "consumer_address": "0xconsumer",
            "resources": [
                {"id": "cpu", "min": 1.0, "max": 8.0},
                {"id": "ram", "min": 1.0, "max": 16.0},
                {"id": "disk", "min": 10.0, "max": 100.0}
            ],
            "max_job_duration_secs": 3600,
            "fees": {
                "8996": [{
                    "fee_token_symbol": "OCEAN",
                    "fee_token_address": "0xocean",
                    "prices": [{"id": "cpu", "price": "0.01"}, {"id": "ram", "price": "0.005"}]
                }]
            },
            "free": {
                "resources": [{"id": "cpu", "min": 1.0, "max": 2.0}, {"id": "ram", "min": 1.0, "max": 4.0}],
                "max_job_duration_secs": 600
            }
        },
        "algorithm": {
            "selection": {"service": {"asset_id": "did:algo", "service_id": "compute"}, "kind": "algorithm", "display_name": "algo"},
            "access": {"price": "1", "token_symbol": "OCEAN", "token_address": "0xocean"}
        },
        "datasets": [{
            "selection": {"service": {"asset_id": "did:d1", "service_id": "compute"}, "kind": "dataset", "display_name": "dataset 1"},
            "access": {"price": "2.5", "token_symbol": "OCEAN", "token_address": "0xocean"}
        }],
        "provider": {"payee": "0xprovider", "payment_amount": "0.5", "min_lock_seconds": 3600}
    })
}

pub fn scenario(value: serde_json::Value) -> Scenario {
    serde_json::from_value(value).expect("escenario válido")
}

pub fn add_dataset(value: &mut serde_json::Value, asset_id: &str, price: &str) {
    value["datasets"].as_array_mut()
                     .expect("datasets")
                     .push(json!({
                         "selection": {"service": {"asset_id": asset_id, "service_id": "compute"}, "kind": "dataset", "display_name": asset_id},
                         "access": {"price": price, "token_symbol": "OCEAN", "token_address": "0xocean"}
                     }));
}

pub fn config() -> CheckoutConfig {
    CheckoutConfig { escrow_contract_address: "0xescrow".into(),
                     ..CheckoutConfig::default() }
}

pub fn rig(value: serde_json::Value) -> ScenarioRig {
    scenario(value).build(&config()).expect("rig")
}

pub fn engine(rig: &ScenarioRig) -> MemEngine {
    CheckoutEngine::in_memory(rig.ports()).config(config()).build()
}

/// Cola ya inicializada con los ítems del escenario.
pub fn queue(rig: &ScenarioRig) -> SharedQueue {
    let mut q = CredentialQueue::new(Arc::new(InMemorySessionStore::new()), Arc::new(SystemClock), Duration::from_secs(300));
    q.init_queue(rig.verification_items());
    Arc::new(Mutex::new(q))
}

pub fn event_names(engine: &MemEngine) -> Vec<&'static str> {
    engine.events().expect("events").iter().map(|e| e.kind.name()).collect()
}
