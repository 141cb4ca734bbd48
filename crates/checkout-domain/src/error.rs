// error.rs
use thiserror::Error;

use crate::resources::{ResourceId, Tier};

/// Errores del dominio de checkout (validación de montos, recursos y precios).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("monto inválido: {0}")]
    InvalidAmount(String),

    #[error("desbordamiento aritmético en {0}")]
    Overflow(&'static str),

    #[error("valor inválido para {resource}: se esperaba un número")]
    InvalidInput { resource: ResourceId },

    #[error("{resource} fuera de rango: {value} no está en [{min}, {max}]")]
    OutOfRange {
        resource: ResourceId,
        value: String,
        min: String,
        max: String,
    },

    #[error("no hay entorno de cómputo seleccionado")]
    NoEnvironment,

    #[error("el entorno {env_id} no ofrece el tier {tier:?}")]
    TierUnavailable { env_id: String, tier: Tier },

    #[error("precio no disponible: {0}")]
    MissingPrice(String),
}
