//! Ledger en memoria: allowances, escrow y órdenes de una sola cuenta.
//!
//! Las escrituras (`approve`, `deposit`, `order`) quedan registradas en
//! orden para que los tests puedan afirmar cuántas transacciones se
//! enviaron. `LedgerScript` permite forzar rechazos, reverts y checks
//! negativos.
use async_trait::async_trait;
use checkout_core::ports::{EscrowFunds, EscrowLedger, EscrowPaymentCheck, LedgerError, OrderRequest, OrderService, TxId};
use checkout_domain::{ServiceRef, TokenAmount};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Fallos programados. Los conjuntos se indexan por `asset_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerScript {
    pub reject_approve: bool,
    pub revert_deposit: bool,
    /// `verifyFundsForEscrowPayment` devuelve `false` siempre.
    pub escrow_check_fails: bool,
    pub not_orderable: HashSet<String>,
    pub reject_order: HashSet<String>,
    pub revert_order: HashSet<String>,
    /// La orden se confirma pero sin id de transacción.
    pub order_without_tx: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerWrite {
    Approve { token: String, spender: String, amount: TokenAmount },
    Deposit { token: String, amount: TokenAmount },
    Order { service: ServiceRef, tx: Option<TxId> },
}

#[derive(Debug, Default)]
struct LedgerState {
    allowances: HashMap<(String, String), TokenAmount>,
    funds: HashMap<String, EscrowFunds>,
    writes: Vec<LedgerWrite>,
    next_tx: u64,
    script: LedgerScript,
}

impl LedgerState {
    fn tx(&mut self) -> TxId {
        self.next_tx += 1;
        format!("0x{:064x}", self.next_tx)
    }
}

/// Ledger de la cuenta `account`: `approve` y `deposit` firman como ella.
#[derive(Debug)]
pub struct InMemoryLedger {
    account: String,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(account: impl Into<String>) -> Self {
        Self { account: account.into(),
               state: Mutex::new(LedgerState::default()) }
    }

    pub fn with_script(self, script: LedgerScript) -> Self {
        self.state().script = script;
        self
    }

    pub fn set_script(&self, script: LedgerScript) {
        self.state().script = script;
    }

    pub fn set_allowance(&self, token: &str, spender: &str, amount: TokenAmount) {
        self.state().allowances.insert((token.to_string(), spender.to_string()), amount);
    }

    pub fn set_funds(&self, token: &str, funds: EscrowFunds) {
        self.state().funds.insert(token.to_string(), funds);
    }

    pub fn funds(&self, token: &str) -> EscrowFunds {
        self.state().funds.get(token).copied().unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<LedgerWrite> {
        self.state().writes.clone()
    }

    pub fn order_writes(&self) -> Vec<LedgerWrite> {
        self.writes().into_iter().filter(|w| matches!(w, LedgerWrite::Order { .. })).collect()
    }

    pub fn escrow_writes(&self) -> usize {
        self.state()
            .writes
            .iter()
            .filter(|w| matches!(w, LedgerWrite::Approve { .. } | LedgerWrite::Deposit { .. }))
            .count()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_owner(&self, owner: &str) -> Result<(), LedgerError> {
        if owner == self.account {
            Ok(())
        } else {
            Err(LedgerError::Rpc(format!("cuenta desconocida {owner}")))
        }
    }
}

#[async_trait]
impl EscrowLedger for InMemoryLedger {
    async fn allowance(&self, token: &str, owner: &str, spender: &str) -> Result<TokenAmount, LedgerError> {
        self.check_owner(owner)?;
        Ok(self.state()
               .allowances
               .get(&(token.to_string(), spender.to_string()))
               .copied()
               .unwrap_or_default())
    }

    async fn approve(&self, token: &str, spender: &str, amount: TokenAmount) -> Result<TxId, LedgerError> {
        let mut st = self.state();
        if st.script.reject_approve {
            return Err(LedgerError::Rejected("approve rechazado en la wallet".into()));
        }
        st.allowances.insert((token.to_string(), spender.to_string()), amount);
        st.writes.push(LedgerWrite::Approve { token: token.to_string(),
                                              spender: spender.to_string(),
                                              amount });
        debug!("approve {amount} de {token} para {spender}");
        Ok(st.tx())
    }

    async fn get_user_funds(&self, owner: &str, token: &str) -> Result<EscrowFunds, LedgerError> {
        self.check_owner(owner)?;
        Ok(self.funds(token))
    }

    async fn deposit(&self, token: &str, amount: TokenAmount) -> Result<TxId, LedgerError> {
        let mut st = self.state();
        if st.script.revert_deposit {
            return Err(LedgerError::Reverted("deposit revertido".into()));
        }
        let funds = st.funds.entry(token.to_string()).or_default();
        funds.deposited = funds.deposited
                               .checked_add(amount)
                               .map_err(|e| LedgerError::Reverted(e.to_string()))?;
        st.writes.push(LedgerWrite::Deposit { token: token.to_string(),
                                              amount });
        debug!("deposit {amount} de {token}");
        Ok(st.tx())
    }

    /// Disponible >= pago del proveedor más el margen de seguridad.
    async fn verify_funds_for_escrow_payment(&self, owner: &str, check: &EscrowPaymentCheck) -> Result<bool, LedgerError> {
        self.check_owner(owner)?;
        if self.state().script.escrow_check_fails {
            return Ok(false);
        }
        let margin = check.payment_amount
                          .percent(TokenAmount::from_whole(u64::from(check.safety_margin_percent)))
                          .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        let needed = check.payment_amount
                          .checked_add(margin)
                          .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(self.funds(&check.token_address).available() >= needed)
    }
}

#[async_trait]
impl OrderService for InMemoryLedger {
    async fn is_orderable(&self, dataset: &ServiceRef, _algorithm: &ServiceRef) -> Result<bool, LedgerError> {
        Ok(!self.state().script.not_orderable.contains(&dataset.asset_id))
    }

    async fn order(&self, request: &OrderRequest) -> Result<Option<TxId>, LedgerError> {
        self.check_owner(&request.payer)?;
        let mut st = self.state();
        let asset = &request.service.asset_id;
        if st.script.reject_order.contains(asset) {
            return Err(LedgerError::Rejected(format!("orden de {asset} rechazada en la wallet")));
        }
        if st.script.revert_order.contains(asset) {
            return Err(LedgerError::Reverted(format!("orden de {asset} revertida")));
        }
        let tx = if st.script.order_without_tx.contains(asset) { None } else { Some(st.tx()) };
        st.writes.push(LedgerWrite::Order { service: request.service.clone(),
                                            tx: tx.clone() });
        debug!("orden de {} -> {:?}", request.service, tx);
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> TokenAmount {
        TokenAmount::parse(s).unwrap()
    }

    #[tokio::test]
    async fn deposit_accumulates_and_is_recorded() {
        let ledger = InMemoryLedger::new("0xme");
        ledger.set_funds("0xtoken", EscrowFunds { deposited: amt("1"), locked: amt("0.5") });
        ledger.deposit("0xtoken", amt("2")).await.unwrap();
        let funds = ledger.get_user_funds("0xme", "0xtoken").await.unwrap();
        assert_eq!(funds.deposited, amt("3"));
        assert_eq!(funds.available(), amt("2.5"));
        assert_eq!(ledger.escrow_writes(), 1);
    }

    #[tokio::test]
    async fn escrow_check_includes_safety_margin() {
        let ledger = InMemoryLedger::new("0xme");
        ledger.set_funds("0xtoken", EscrowFunds { deposited: amt("1.05"), locked: TokenAmount::ZERO });
        let mut check = EscrowPaymentCheck { token_address: "0xtoken".into(),
                                             payee: "0xprov".into(),
                                             required_amount: amt("1"),
                                             payment_amount: amt("1"),
                                             min_lock_seconds: 60,
                                             safety_margin_percent: 10 };
        assert!(!ledger.verify_funds_for_escrow_payment("0xme", &check).await.unwrap());
        check.safety_margin_percent = 5;
        assert!(ledger.verify_funds_for_escrow_payment("0xme", &check).await.unwrap());
    }
}
