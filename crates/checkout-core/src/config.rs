//! Parámetros del orquestador. Datos planos: la carga desde entorno vive en
//! el crate raíz.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub credential_ttl: Duration,
    pub expiry_tick: Duration,
    pub auto_advance_debounce: Duration,
    pub escrow_safety_margin_percent: u32,
    pub price_precision: u32,
    /// Spender de `approve` y destino de `deposit`.
    pub escrow_contract_address: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self { credential_ttl: Duration::from_secs(DEFAULT_CREDENTIAL_TTL_SECS),
               expiry_tick: Duration::from_secs(DEFAULT_EXPIRY_TICK_SECS),
               auto_advance_debounce: Duration::from_millis(DEFAULT_AUTO_ADVANCE_DEBOUNCE_MS),
               escrow_safety_margin_percent: DEFAULT_ESCROW_SAFETY_MARGIN_PERCENT,
               price_precision: DEFAULT_PRICE_PRECISION,
               escrow_contract_address: "0x0000000000000000000000000000000000000000".to_string() }
    }
}
