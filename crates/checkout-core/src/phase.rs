//! Fases del checkout y transiciones legales.
//!
//! `Idle -> PricingResolved -> EscrowReady -> AlgorithmOrdered ->
//! DatasetsOrdered -> JobSubmitted`. El tier gratuito salta de
//! `PricingResolved` a `JobSubmitted`. Cualquier fase no terminal puede ir a
//! `Failed`; `Failed` sólo vuelve a `Idle` mediante reintento. Una
//! interrupción recuperable devuelve una fase intermedia a `Idle`.
use checkout_domain::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckoutPhase {
    Idle,
    PricingResolved,
    EscrowReady,
    AlgorithmOrdered,
    DatasetsOrdered,
    JobSubmitted,
    Failed,
}

impl CheckoutPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckoutPhase::JobSubmitted)
    }

    pub fn can_transition(self, to: CheckoutPhase, tier: Tier) -> bool {
        use CheckoutPhase::*;
        match (self, to) {
            (JobSubmitted, _) => false,
            (Failed, Idle) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Idle, PricingResolved) => true,
            (PricingResolved, EscrowReady) => tier == Tier::Paid,
            (PricingResolved, JobSubmitted) => tier == Tier::Free,
            (EscrowReady, AlgorithmOrdered) => true,
            (AlgorithmOrdered, DatasetsOrdered) => true,
            (DatasetsOrdered, JobSubmitted) => true,
            (PricingResolved | EscrowReady | AlgorithmOrdered | DatasetsOrdered, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_skips_escrow_and_orders() {
        assert!(CheckoutPhase::PricingResolved.can_transition(CheckoutPhase::JobSubmitted, Tier::Free));
        assert!(!CheckoutPhase::PricingResolved.can_transition(CheckoutPhase::JobSubmitted, Tier::Paid));
        assert!(!CheckoutPhase::PricingResolved.can_transition(CheckoutPhase::EscrowReady, Tier::Free));
    }

    #[test]
    fn failed_only_returns_to_idle() {
        assert!(CheckoutPhase::AlgorithmOrdered.can_transition(CheckoutPhase::Failed, Tier::Paid));
        assert!(CheckoutPhase::Failed.can_transition(CheckoutPhase::Idle, Tier::Paid));
        assert!(!CheckoutPhase::Failed.can_transition(CheckoutPhase::PricingResolved, Tier::Paid));
        assert!(!CheckoutPhase::JobSubmitted.can_transition(CheckoutPhase::Failed, Tier::Paid));
    }

    #[test]
    fn interruptions_return_intermediate_phases_to_idle() {
        assert!(CheckoutPhase::DatasetsOrdered.can_transition(CheckoutPhase::Idle, Tier::Paid));
        assert!(CheckoutPhase::PricingResolved.can_transition(CheckoutPhase::Idle, Tier::Free));
        assert!(!CheckoutPhase::Idle.can_transition(CheckoutPhase::Idle, Tier::Paid));
        assert!(!CheckoutPhase::JobSubmitted.can_transition(CheckoutPhase::Idle, Tier::Paid));
    }
}
