//! Activos que participan en un checkout: datasets y algoritmo.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TokenAmount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Dataset,
    Algorithm,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Dataset => f.write_str("dataset"),
            AssetKind::Algorithm => f.write_str("algorithm"),
        }
    }
}

/// Referencia estable a un servicio concreto de un activo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRef {
    pub asset_id: String,
    pub service_id: String,
}

impl ServiceRef {
    pub fn new(asset_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self { asset_id: asset_id.into(),
               service_id: service_id.into() }
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_id, self.service_id)
    }
}

/// Detalles de acceso resueltos para un servicio (precio, token y estado de
/// órdenes previas del usuario).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDetails {
    /// `None` si el activo no expone precio (no se puede agregar).
    pub price: Option<TokenAmount>,
    pub token_symbol: Option<String>,
    pub token_address: Option<String>,
    /// Transacción de una orden previa todavía válida.
    #[serde(default)]
    pub valid_order_tx: Option<String>,
    /// El usuario ya tiene saldo del token de acceso.
    #[serde(default)]
    pub owns_datatoken: bool,
}

impl AccessDetails {
    /// Un activo ya pagado (orden válida o token en cartera) no se vuelve a
    /// cobrar.
    pub fn is_already_paid(&self) -> bool {
        self.valid_order_tx.is_some() || self.owns_datatoken
    }
}

/// Un activo seleccionado para el checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSelection {
    pub service: ServiceRef,
    pub kind: AssetKind,
    pub display_name: String,
    /// La política del servicio exige credencial SSI.
    #[serde(default)]
    pub requires_credential: bool,
    /// Duración del acceso que otorga una orden.
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub user_params: serde_json::Value,
    /// Sólo aplica al algoritmo.
    #[serde(default)]
    pub algo_params: serde_json::Value,
}

impl AssetSelection {
    pub fn dataset(asset_id: &str, service_id: &str, display_name: &str) -> Self {
        Self::new(AssetKind::Dataset, asset_id, service_id, display_name)
    }

    pub fn algorithm(asset_id: &str, service_id: &str, display_name: &str) -> Self {
        Self::new(AssetKind::Algorithm, asset_id, service_id, display_name)
    }

    fn new(kind: AssetKind, asset_id: &str, service_id: &str, display_name: &str) -> Self {
        Self { service: ServiceRef::new(asset_id, service_id),
               kind,
               display_name: display_name.to_string(),
               requires_credential: false,
               duration_seconds: 0,
               user_params: serde_json::Value::Null,
               algo_params: serde_json::Value::Null }
    }

    pub fn with_credential(mut self, required: bool) -> Self {
        self.requires_credential = required;
        self
    }
}
