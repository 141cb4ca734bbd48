//! Entrada y salida del pipeline de checkout.
use checkout_domain::{AccessDetails, AssetSelection, ComputeEnvironment, PriceSummary, ResourceId, ResourceSelection, ServiceRef, Tier, TokenAmount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::escrow::FundingReport;
use crate::order::OrderReceipt;
use crate::ports::{AccessDetailsSource, ComputeProvider, EscrowLedger, OrderService, ProviderQuote, ResourceRequest};

/// Colaboradores externos que consume el engine.
#[derive(Clone)]
pub struct CheckoutPorts {
    pub ledger: Arc<dyn EscrowLedger>,
    pub orders: Arc<dyn OrderService>,
    pub provider: Arc<dyn ComputeProvider>,
    pub access: Arc<dyn AccessDetailsSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Cuenta de la wallet: paga las órdenes y es el consumidor del job.
    pub account: String,
    /// Cadena a la que está conectada la wallet.
    pub wallet_chain_id: u64,
    pub environment: ComputeEnvironment,
    pub selection: ResourceSelection,
    pub algorithm: AssetSelection,
    pub datasets: Vec<AssetSelection>,
    /// Comisión de mercado (`1` = 1%).
    pub fee_rate_percent: TokenAmount,
}

impl CheckoutRequest {
    pub fn tier(&self) -> Tier {
        self.selection.tier
    }

    pub fn dataset_services(&self) -> Vec<ServiceRef> {
        self.datasets.iter().map(|d| d.service.clone()).collect()
    }

    /// Servicios en orden de cola: datasets y luego el algoritmo.
    pub fn services(&self) -> Vec<ServiceRef> {
        let mut services = self.dataset_services();
        services.push(self.algorithm.service.clone());
        services
    }

    pub fn resource_requests(&self) -> Vec<ResourceRequest> {
        ResourceId::REQUESTABLE.iter()
                               .map(|r| ResourceRequest { id: r.as_str().to_string(),
                                                          amount: self.selection.get(*r) })
                               .collect()
    }
}

/// Precios revalidados para un intento.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResolution {
    pub datasets: Vec<AccessDetails>,
    pub algorithm: AccessDetails,
    pub provider_quote: Option<ProviderQuote>,
    pub resource_price: TokenAmount,
    pub summary: PriceSummary,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSubmission {
    pub checkout_id: Uuid,
    pub job_id: String,
    pub receipts: Vec<OrderReceipt>,
    pub funding: Option<FundingReport>,
}
