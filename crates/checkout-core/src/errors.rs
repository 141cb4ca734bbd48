//! Errores del checkout.
//!
//! Taxonomía y propagación:
//! - `UserCancelled` y `CredentialInvalid` se recuperan localmente: el
//!   intento vuelve a `Idle` sin descartar recibos.
//! - `TransactionFailed` y `PricingUnavailable` deshacen el intento completo
//!   (vuelta a `Idle`, recibos descartados).
//! - `PreconditionFailed`, `NotOrderable` y `FundingInsufficient` bloquean
//!   antes de enviar cualquier transacción.

use checkout_domain::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    UserCancelled,
    PreconditionFailed,
    FundingInsufficient,
    TransactionFailed,
    CredentialInvalid,
    PricingUnavailable,
    Cancelled,
    Internal,
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CheckoutError {
    #[error("operación cancelada por el usuario: {0}")] UserCancelled(String),
    #[error("precondición no satisfecha: {0}")] PreconditionFailed(String),
    #[error("el dataset {asset_id}/{service_id} no permite este algoritmo")] NotOrderable { asset_id: String, service_id: String },
    #[error("fondos insuficientes: {0}")] FundingInsufficient(String),
    #[error("transacción fallida: {0}")] TransactionFailed(String),
    #[error("credencial {} para {asset_id}/{service_id}", credential_state(.expired))]
    CredentialInvalid { asset_id: String, service_id: String, expired: bool },
    #[error("precio no disponible: {0}")] PricingUnavailable(String),
    #[error("solicitud obsoleta descartada")] Cancelled,
    #[error("fase inválida: se esperaba {expected}, actual {found}")] InvalidPhase { expected: String, found: String },
    #[error("interno: {0}")] Internal(String),
}

fn credential_state(expired: &bool) -> &'static str {
    if *expired { "expirada" } else { "no verificada" }
}

impl CheckoutError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckoutError::UserCancelled(_) => ErrorCategory::UserCancelled,
            CheckoutError::PreconditionFailed(_) | CheckoutError::NotOrderable { .. } | CheckoutError::InvalidPhase { .. } => ErrorCategory::PreconditionFailed,
            CheckoutError::FundingInsufficient(_) => ErrorCategory::FundingInsufficient,
            CheckoutError::TransactionFailed(_) => ErrorCategory::TransactionFailed,
            CheckoutError::CredentialInvalid { .. } => ErrorCategory::CredentialInvalid,
            CheckoutError::PricingUnavailable(_) => ErrorCategory::PricingUnavailable,
            CheckoutError::Cancelled => ErrorCategory::Cancelled,
            CheckoutError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// La UI puede reintentar sin resetear estado no relacionado.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Internal)
    }

    /// El intento se marca `Failed` y sus recibos se descartan. Las firmas
    /// rechazadas, los errores de credencial y las solicitudes obsoletas no
    /// deshacen nada.
    pub fn unwinds_checkout(&self) -> bool {
        !matches!(self.category(),
                  ErrorCategory::UserCancelled | ErrorCategory::CredentialInvalid | ErrorCategory::Cancelled)
    }

    /// Mensaje único legible para el usuario.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::UserCancelled => format!("La firma fue rechazada en la wallet. Puedes reintentar. ({self})"),
            _ => self.to_string(),
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::MissingPrice(m) => CheckoutError::PricingUnavailable(m),
            other @ (DomainError::NoEnvironment | DomainError::TierUnavailable { .. }) => CheckoutError::PreconditionFailed(other.to_string()),
            other => CheckoutError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_do_not_unwind() {
        let e = CheckoutError::CredentialInvalid { asset_id: "a".into(), service_id: "s".into(), expired: true };
        assert!(!e.unwinds_checkout());
        assert_eq!(e.to_string(), "credencial expirada para a/s");
    }

    #[test]
    fn wallet_rejection_does_not_unwind() {
        let e: CheckoutError = crate::ports::LedgerError::Rejected("firma".into()).into();
        assert_eq!(e.category(), ErrorCategory::UserCancelled);
        assert!(!e.unwinds_checkout());
        assert!(e.is_retryable());
    }

    #[test]
    fn transaction_failures_unwind_and_are_retryable() {
        let e = CheckoutError::TransactionFailed("revert".into());
        assert!(e.unwinds_checkout());
        assert!(e.is_retryable());
        assert_eq!(e.category(), ErrorCategory::TransactionFailed);
    }

    #[test]
    fn missing_price_maps_to_pricing_unavailable() {
        let e: CheckoutError = DomainError::MissingPrice("x".into()).into();
        assert_eq!(e.category(), ErrorCategory::PricingUnavailable);
    }
}
