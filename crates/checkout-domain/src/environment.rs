//! Entorno de cómputo anunciado por un proveedor: límites de recursos,
//! duración máxima de jobs y tabla de precios por cadena.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::TokenAmount;

/// Límite anunciado de un recurso (`cpu`, `ram`, `disk`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBound {
    pub id: String,
    #[serde(default)]
    pub min: f64,
    pub max: f64,
    /// Capacidad ya ocupada por otros jobs.
    #[serde(default)]
    pub in_use: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUnitPrice {
    pub id: String,
    pub price: TokenAmount,
}

/// Precios de recursos denominados en un token de pago.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fee_token_symbol: String,
    pub fee_token_address: String,
    pub prices: Vec<ResourceUnitPrice>,
}

impl FeeSchedule {
    pub fn unit_price(&self, resource_id: &str) -> Option<TokenAmount> {
        self.prices.iter().find(|p| p.id == resource_id).map(|p| p.price)
    }
}

/// Capacidad gratuita de un entorno.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeTier {
    pub resources: Vec<ResourceBound>,
    pub max_job_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeEnvironment {
    pub id: String,
    pub chain_id: u64,
    /// Dirección que consume las órdenes de este entorno.
    pub consumer_address: String,
    pub resources: Vec<ResourceBound>,
    pub max_job_duration_secs: u64,
    /// Precios por `chain_id`.
    #[serde(default)]
    pub fees: HashMap<u64, Vec<FeeSchedule>>,
    #[serde(default)]
    pub free: Option<FreeTier>,
}

impl ComputeEnvironment {
    pub fn resource(&self, id: &str) -> Option<&ResourceBound> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn free_resource(&self, id: &str) -> Option<&ResourceBound> {
        self.free.as_ref().and_then(|f| f.resources.iter().find(|r| r.id == id))
    }

    /// Primera tabla de precios publicada para la cadena.
    pub fn fee_schedule(&self, chain_id: u64) -> Option<&FeeSchedule> {
        self.fees.get(&chain_id).and_then(|v| v.first())
    }
}
