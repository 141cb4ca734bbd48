//! Precondición de fondos en escrow para jobs de pago.
//!
//! El objetivo de fondos cubre el precio de los recursos y el pago del
//! proveedor con su margen. Secuencia: allowance -> approve (si falta),
//! fondos disponibles -> deposit (si falta), y por último
//! `verifyFundsForEscrowPayment`. Como máximo dos
//! escrituras; con fondos suficientes, ninguna. El manager nunca resta
//! localmente: cada decisión parte de lo que devuelve el ledger.
use checkout_domain::TokenAmount;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::CheckoutError;
use crate::ports::{EscrowLedger, EscrowPaymentCheck, TxId};

/// Lo que el escrow debe cubrir antes de un job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRequirement {
    pub token_address: String,
    pub owner: String,
    pub payee: String,
    /// Precio de los recursos seleccionados.
    pub required_amount: TokenAmount,
    /// Pago anunciado por el proveedor.
    pub payment_amount: TokenAmount,
    pub min_lock_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingReport {
    pub approve_tx: Option<TxId>,
    pub deposit_tx: Option<TxId>,
}

impl FundingReport {
    pub fn writes(&self) -> usize {
        usize::from(self.approve_tx.is_some()) + usize::from(self.deposit_tx.is_some())
    }
}

pub struct EscrowFundingManager {
    ledger: Arc<dyn EscrowLedger>,
    escrow_address: String,
    safety_margin_percent: u32,
}

impl EscrowFundingManager {
    pub fn new(ledger: Arc<dyn EscrowLedger>, escrow_address: impl Into<String>, safety_margin_percent: u32) -> Self {
        Self { ledger,
               escrow_address: escrow_address.into(),
               safety_margin_percent }
    }

    /// Monto que el escrow debe cubrir: el precio de los recursos o el pago
    /// del proveedor más el margen de seguridad, el mayor de ambos.
    pub fn funding_target(&self, req: &EscrowRequirement) -> Result<TokenAmount, CheckoutError> {
        let margin = TokenAmount::from_whole(u64::from(self.safety_margin_percent));
        let payment = req.payment_amount.checked_add(req.payment_amount.percent(margin)?)?;
        Ok(payment.max(req.required_amount))
    }

    pub async fn ensure_funds(&self, req: &EscrowRequirement) -> Result<FundingReport, CheckoutError> {
        let mut report = FundingReport::default();
        let target = self.funding_target(req)?;

        let allowance = self.ledger.allowance(&req.token_address, &req.owner, &self.escrow_address).await?;
        if allowance < target {
            debug!("allowance {allowance} < {target}; approve");
            let tx = self.ledger.approve(&req.token_address, &self.escrow_address, target).await?;
            info!("approve confirmado: {tx}");
            report.approve_tx = Some(tx);
        }

        let funds = self.ledger.get_user_funds(&req.owner, &req.token_address).await?;
        let available = funds.available();
        if available < target {
            let shortfall = target.saturating_sub(available);
            debug!("fondos disponibles {available} < {target}; depósito de {shortfall}");
            let tx = self.ledger.deposit(&req.token_address, shortfall).await?;
            info!("depósito confirmado: {tx}");
            report.deposit_tx = Some(tx);
        }

        let check = EscrowPaymentCheck { token_address: req.token_address.clone(),
                                         payee: req.payee.clone(),
                                         required_amount: req.required_amount,
                                         payment_amount: req.payment_amount,
                                         min_lock_seconds: req.min_lock_seconds,
                                         safety_margin_percent: self.safety_margin_percent };
        if !self.ledger.verify_funds_for_escrow_payment(&req.owner, &check).await? {
            return Err(CheckoutError::FundingInsufficient(format!("el escrow no cubre {} + margen {}% para {}",
                                                                  req.payment_amount, self.safety_margin_percent, req.payee)));
        }
        Ok(report)
    }
}
