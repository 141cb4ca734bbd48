//! Tipos de evento del checkout y estructura `CheckoutEvent`.
//!
//! Cada transición del `CheckoutEngine` se emite a un `EventStore`
//! append-only; el `CheckoutRepository` reconstruye el estado por replay.
use chrono::{DateTime, Utc};
use checkout_domain::{PriceEntry, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CheckoutError;
use crate::order::OrderReceipt;
use crate::phase::CheckoutPhase;
use crate::ports::TxId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutEventKind {
    /// Primer evento de un `checkout_id`.
    CheckoutInitialized { tier: Tier, environment_id: String, chain_id: u64 },
    /// Precios revalidados para este intento.
    PricingResolved { quote_fingerprint: String, entries: Vec<PriceEntry> },
    EscrowReady { approve_tx: Option<TxId>, deposit_tx: Option<TxId> },
    AlgorithmOrdered { receipt: OrderReceipt },
    DatasetOrdered { receipt: OrderReceipt },
    DatasetsOrdered { count: usize },
    JobSubmitted { job_id: String },
    /// El intento termina; sus recibos dejan de ser válidos.
    CheckoutFailed { phase: CheckoutPhase, error: CheckoutError },
    /// Interrupción recuperable (firma rechazada, credencial expirada): vuelta
    /// a `Idle` dentro del mismo intento, conservando los recibos.
    AttemptInterrupted { phase: CheckoutPhase, error: CheckoutError },
    RetryScheduled { attempt: u32 },
}

impl CheckoutEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutEventKind::CheckoutInitialized { .. } => "CheckoutInitialized",
            CheckoutEventKind::PricingResolved { .. } => "PricingResolved",
            CheckoutEventKind::EscrowReady { .. } => "EscrowReady",
            CheckoutEventKind::AlgorithmOrdered { .. } => "AlgorithmOrdered",
            CheckoutEventKind::DatasetOrdered { .. } => "DatasetOrdered",
            CheckoutEventKind::DatasetsOrdered { .. } => "DatasetsOrdered",
            CheckoutEventKind::JobSubmitted { .. } => "JobSubmitted",
            CheckoutEventKind::CheckoutFailed { .. } => "CheckoutFailed",
            CheckoutEventKind::AttemptInterrupted { .. } => "AttemptInterrupted",
            CheckoutEventKind::RetryScheduled { .. } => "RetryScheduled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEvent {
    pub seq: u64,
    pub checkout_id: Uuid,
    pub kind: CheckoutEventKind,
    pub ts: DateTime<Utc>,
}
