//! Estado reconstruido de un checkout (`CheckoutInstance`).
//!
//! El repositorio aplica un replay lineal: consume los eventos en orden y
//! actualiza la instancia por evento. Los recibos de un intento fallido se
//! descartan en el propio replay, de modo que un reintento nunca los ve. Una
//! interrupción recuperable vuelve a `Idle` y conserva los recibos del
//! intento, que la siguiente ejecución reutiliza.
use checkout_domain::{ServiceRef, Tier};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::CheckoutError;
use crate::event::{CheckoutEvent, CheckoutEventKind};
use crate::order::OrderReceipt;
use crate::phase::CheckoutPhase;
use crate::ports::TxId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutInstance {
    pub id: Uuid,
    pub tier: Option<Tier>,
    pub phase: CheckoutPhase,
    /// Intento en curso, empezando en 1.
    pub attempt: u32,
    /// Recibos vivos del intento en curso.
    pub receipts: Vec<OrderReceipt>,
    pub approve_tx: Option<TxId>,
    pub deposit_tx: Option<TxId>,
    pub job_id: Option<String>,
    pub quote_fingerprint: Option<String>,
    /// Fingerprint del intento anterior, para detectar cambios de precio.
    pub previous_fingerprint: Option<String>,
    pub last_error: Option<CheckoutError>,
    pub failed_phase: Option<CheckoutPhase>,
    /// Fase en la que se interrumpió la última ejecución del intento.
    pub interrupted_phase: Option<CheckoutPhase>,
}

impl CheckoutInstance {
    fn new(id: Uuid) -> Self {
        Self { id,
               tier: None,
               phase: CheckoutPhase::Idle,
               attempt: 1,
               receipts: Vec::new(),
               approve_tx: None,
               deposit_tx: None,
               job_id: None,
               quote_fingerprint: None,
               previous_fingerprint: None,
               last_error: None,
               failed_phase: None,
               interrupted_phase: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.tier.is_some()
    }

    /// Recibo vivo de un servicio en el intento en curso.
    pub fn receipt_for(&self, service: &ServiceRef) -> Option<&OrderReceipt> {
        self.receipts.iter().find(|r| &r.service == service)
    }

    fn record_receipt(&mut self, receipt: &OrderReceipt) {
        match self.receipts.iter_mut().find(|r| r.service == receipt.service) {
            Some(existing) => *existing = receipt.clone(),
            None => self.receipts.push(receipt.clone()),
        }
    }

    fn discard_attempt(&mut self) {
        self.receipts.clear();
        self.approve_tx = None;
        self.deposit_tx = None;
    }
}

/// Trait para reconstruir (`replay`) el estado de un checkout a partir de eventos.
pub trait CheckoutRepository {
    fn load(&self, checkout_id: Uuid, events: &[CheckoutEvent]) -> CheckoutInstance;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryCheckoutRepository;

impl InMemoryCheckoutRepository {
    pub fn new() -> Self {
        Self
    }
}

impl CheckoutRepository for InMemoryCheckoutRepository {
    fn load(&self, checkout_id: Uuid, events: &[CheckoutEvent]) -> CheckoutInstance {
        let mut inst = CheckoutInstance::new(checkout_id);
        for ev in events {
            match &ev.kind {
                CheckoutEventKind::CheckoutInitialized { tier, .. } => inst.tier = Some(*tier),
                CheckoutEventKind::PricingResolved { quote_fingerprint, .. } => {
                    inst.quote_fingerprint = Some(quote_fingerprint.clone());
                    inst.last_error = None;
                    inst.interrupted_phase = None;
                    inst.phase = CheckoutPhase::PricingResolved;
                }
                CheckoutEventKind::EscrowReady { approve_tx, deposit_tx } => {
                    inst.approve_tx = approve_tx.clone();
                    inst.deposit_tx = deposit_tx.clone();
                    inst.phase = CheckoutPhase::EscrowReady;
                }
                CheckoutEventKind::AlgorithmOrdered { receipt } => {
                    inst.record_receipt(receipt);
                    inst.phase = CheckoutPhase::AlgorithmOrdered;
                }
                CheckoutEventKind::DatasetOrdered { receipt } => inst.record_receipt(receipt),
                CheckoutEventKind::DatasetsOrdered { .. } => inst.phase = CheckoutPhase::DatasetsOrdered,
                CheckoutEventKind::JobSubmitted { job_id } => {
                    inst.job_id = Some(job_id.clone());
                    inst.phase = CheckoutPhase::JobSubmitted;
                }
                CheckoutEventKind::CheckoutFailed { phase, error } => {
                    inst.discard_attempt();
                    inst.failed_phase = Some(*phase);
                    inst.last_error = Some(error.clone());
                    inst.phase = CheckoutPhase::Failed;
                }
                CheckoutEventKind::AttemptInterrupted { phase, error } => {
                    inst.interrupted_phase = Some(*phase);
                    inst.last_error = Some(error.clone());
                    inst.phase = CheckoutPhase::Idle;
                }
                CheckoutEventKind::RetryScheduled { attempt } => {
                    inst.discard_attempt();
                    inst.attempt = *attempt;
                    inst.previous_fingerprint = inst.quote_fingerprint.take();
                    inst.failed_phase = None;
                    inst.interrupted_phase = None;
                    inst.last_error = None;
                    inst.phase = CheckoutPhase::Idle;
                }
            }
        }
        inst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStore, InMemoryEventStore};
    use checkout_domain::AssetKind;

    fn receipt(asset: &str) -> OrderReceipt {
        OrderReceipt { service: ServiceRef::new(asset, "svc"),
                       kind: AssetKind::Dataset,
                       transaction_id: format!("0x{asset}"),
                       reused: false }
    }

    #[test]
    fn failed_attempt_receipts_are_not_replayed_after_retry() {
        let mut store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        let kinds = vec![CheckoutEventKind::CheckoutInitialized { tier: Tier::Paid, environment_id: "env".into(), chain_id: 1 },
                         CheckoutEventKind::PricingResolved { quote_fingerprint: "fp1".into(), entries: vec![] },
                         CheckoutEventKind::EscrowReady { approve_tx: Some("0xa".into()), deposit_tx: None },
                         CheckoutEventKind::AlgorithmOrdered { receipt: receipt("algo") },
                         CheckoutEventKind::DatasetOrdered { receipt: receipt("d1") },
                         CheckoutEventKind::CheckoutFailed { phase: CheckoutPhase::AlgorithmOrdered,
                                                             error: CheckoutError::TransactionFailed("revert".into()) }];
        for k in kinds {
            store.append_kind(id, k).unwrap();
        }
        let repo = InMemoryCheckoutRepository::new();
        let failed = repo.load(id, &store.list(id).unwrap());
        assert_eq!(failed.phase, CheckoutPhase::Failed);
        assert!(failed.receipts.is_empty());
        assert_eq!(failed.failed_phase, Some(CheckoutPhase::AlgorithmOrdered));

        store.append_kind(id, CheckoutEventKind::RetryScheduled { attempt: 2 }).unwrap();
        let retried = repo.load(id, &store.list(id).unwrap());
        assert_eq!(retried.phase, CheckoutPhase::Idle);
        assert_eq!(retried.attempt, 2);
        assert_eq!(retried.previous_fingerprint.as_deref(), Some("fp1"));
        assert!(retried.last_error.is_none());
    }

    #[test]
    fn interrupted_attempt_returns_to_idle_and_keeps_receipts() {
        let mut store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        let kinds = vec![CheckoutEventKind::CheckoutInitialized { tier: Tier::Paid, environment_id: "env".into(), chain_id: 1 },
                         CheckoutEventKind::PricingResolved { quote_fingerprint: "fp1".into(), entries: vec![] },
                         CheckoutEventKind::EscrowReady { approve_tx: None, deposit_tx: None },
                         CheckoutEventKind::AlgorithmOrdered { receipt: receipt("algo") },
                         CheckoutEventKind::AttemptInterrupted { phase: CheckoutPhase::AlgorithmOrdered,
                                                                 error: CheckoutError::UserCancelled("firma".into()) }];
        for k in kinds {
            store.append_kind(id, k).unwrap();
        }
        let repo = InMemoryCheckoutRepository::new();
        let inst = repo.load(id, &store.list(id).unwrap());
        assert_eq!(inst.phase, CheckoutPhase::Idle);
        assert_eq!(inst.attempt, 1);
        assert_eq!(inst.interrupted_phase, Some(CheckoutPhase::AlgorithmOrdered));
        assert!(inst.receipt_for(&ServiceRef::new("algo", "svc")).is_some());

        // la reanudación vuelve a registrar el mismo recibo sin duplicarlo
        store.append_kind(id, CheckoutEventKind::PricingResolved { quote_fingerprint: "fp1".into(), entries: vec![] }).unwrap();
        store.append_kind(id, CheckoutEventKind::AlgorithmOrdered { receipt: receipt("algo") }).unwrap();
        let resumed = repo.load(id, &store.list(id).unwrap());
        assert_eq!(resumed.receipts.len(), 1);
        assert!(resumed.last_error.is_none());
        assert!(resumed.interrupted_phase.is_none());
    }
}
