//! Contratos con los colaboradores externos del checkout.
//!
//! El core nunca implementa RPC, HTTP ni el intercambio de credenciales: sólo
//! consume estos traits. Cada llamada es `async` y suspende al orquestador en
//! el punto de llamada.
use async_trait::async_trait;
use checkout_domain::{AccessDetails, AssetKind, ServiceRef, TokenAmount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::CheckoutError;

pub type TxId = String;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// El usuario rechazó la firma en la wallet.
    #[error("firma rechazada: {0}")]
    Rejected(String),
    #[error("revert: {0}")]
    Reverted(String),
    #[error("rpc: {0}")]
    Rpc(String),
}

impl From<LedgerError> for CheckoutError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Rejected(m) => CheckoutError::UserCancelled(m),
            other => CheckoutError::TransactionFailed(other.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("http: {0}")]
    Http(String),
    #[error("rechazado por el proveedor: {0}")]
    Rejected(String),
    #[error("no encontrado: {0}")]
    NotFound(String),
}

// ---------------------------------------------------------------- escrow

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowFunds {
    pub deposited: TokenAmount,
    pub locked: TokenAmount,
}

impl EscrowFunds {
    /// Fondos depositados que no están bloqueados por otros jobs.
    pub fn available(&self) -> TokenAmount {
        self.deposited.saturating_sub(self.locked)
    }
}

/// Argumentos de `verifyFundsForEscrowPayment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowPaymentCheck {
    pub token_address: String,
    pub payee: String,
    pub required_amount: TokenAmount,
    pub payment_amount: TokenAmount,
    pub min_lock_seconds: u64,
    pub safety_margin_percent: u32,
}

#[async_trait]
pub trait EscrowLedger: Send + Sync {
    async fn allowance(&self, token: &str, owner: &str, spender: &str) -> Result<TokenAmount, LedgerError>;
    /// Espera la confirmación antes de devolver.
    async fn approve(&self, token: &str, spender: &str, amount: TokenAmount) -> Result<TxId, LedgerError>;
    async fn get_user_funds(&self, owner: &str, token: &str) -> Result<EscrowFunds, LedgerError>;
    /// Espera la confirmación antes de devolver.
    async fn deposit(&self, token: &str, amount: TokenAmount) -> Result<TxId, LedgerError>;
    async fn verify_funds_for_escrow_payment(&self, owner: &str, check: &EscrowPaymentCheck) -> Result<bool, LedgerError>;
}

// ---------------------------------------------------------------- órdenes

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuote {
    pub price: TokenAmount,
    pub market_fee: TokenAmount,
    pub token_symbol: String,
    pub token_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub service: ServiceRef,
    pub kind: AssetKind,
    pub quote: OrderQuote,
    pub payer: String,
    pub consumer_address: String,
    pub session_id: Option<String>,
}

#[async_trait]
pub trait OrderService: Send + Sync {
    /// ¿La política de confianza del publicador del dataset admite este
    /// algoritmo/servicio?
    async fn is_orderable(&self, dataset: &ServiceRef, algorithm: &ServiceRef) -> Result<bool, LedgerError>;
    /// `None` si la transacción no devolvió id.
    async fn order(&self, request: &OrderRequest) -> Result<Option<TxId>, LedgerError>;
}

// ---------------------------------------------------------------- proveedor

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFee {
    pub service: ServiceRef,
    pub amount: TokenAmount,
    pub token_symbol: String,
}

/// Respuesta de inicialización del proveedor para un job de pago.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuote {
    pub payee: String,
    pub payment_amount: TokenAmount,
    pub min_lock_seconds: u64,
    #[serde(default)]
    pub provider_fees: Vec<ProviderFee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub environment_id: String,
    pub datasets: Vec<ServiceRef>,
    pub algorithm: ServiceRef,
    pub payment_token: String,
    pub job_duration_minutes: f64,
    pub resources: Vec<ResourceRequest>,
    pub chain_id: u64,
    pub consumer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInput {
    pub document_id: String,
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_tx_id: Option<TxId>,
    pub user_params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmInput {
    pub document_id: String,
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_tx_id: Option<TxId>,
    pub algo_params: serde_json::Value,
    pub user_params: serde_json::Value,
}

/// Prueba de credencial adjunta al job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPayload {
    pub service: ServiceRef,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaidJobRequest {
    pub environment_id: String,
    pub datasets: Vec<DatasetInput>,
    pub algorithm: AlgorithmInput,
    pub job_duration_minutes: f64,
    pub payment_token: String,
    pub resources: Vec<ResourceRequest>,
    pub chain_id: u64,
    pub consumer: String,
    pub policy_payloads: Vec<PolicyPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeJobRequest {
    pub environment_id: String,
    pub datasets: Vec<DatasetInput>,
    pub algorithm: AlgorithmInput,
    pub resources: Vec<ResourceRequest>,
    pub chain_id: u64,
    pub consumer: String,
    pub policy_payloads: Vec<PolicyPayload>,
}

#[async_trait]
pub trait ComputeProvider: Send + Sync {
    async fn initialize_compute(&self, request: &InitializeRequest) -> Result<ProviderQuote, ProviderError>;
    async fn start_paid_job(&self, request: &PaidJobRequest) -> Result<String, ProviderError>;
    async fn start_free_job(&self, request: &FreeJobRequest) -> Result<String, ProviderError>;
}

/// Lecturas de precio y estado de órdenes por servicio (sólo lectura).
#[async_trait]
pub trait AccessDetailsSource: Send + Sync {
    async fn access_details(&self, service: &ServiceRef, account: &str) -> Result<AccessDetails, ProviderError>;
}

// ---------------------------------------------------------------- credenciales

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub success: bool,
    pub session_id: Option<String>,
}

/// Verificador opaco de credenciales SSI.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, service: &ServiceRef) -> VerificationOutcome;
}
