//! Escenarios de checkout descritos en JSON.
//!
//! Un escenario fija el entorno, los activos con sus detalles de acceso, el
//! estado inicial del escrow y los fallos programados. `build` lo convierte
//! en un `CheckoutRequest` más los colaboradores en memoria listos para el
//! engine.
use checkout_core::credential::{items_for, VerificationItem};
use checkout_core::ports::{EscrowFunds, ProviderQuote};
use checkout_core::{CheckoutConfig, CheckoutPorts, CheckoutRequest};
use checkout_domain::{AccessDetails, AssetSelection, ComputeEnvironment, DomainError, ResourceConfigurator, ResourceId, ServiceRef, Tier, TokenAmount};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::ledger::{InMemoryLedger, LedgerScript};
use crate::provider::{InMemoryComputeProvider, ProviderScript};
use crate::verifier::ScriptedVerifier;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("escenario inválido: {0}")]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAsset {
    pub selection: AssetSelection,
    pub access: AccessDetails,
}

/// Valores tal como los teclearía el usuario; pasan por la validación del
/// configurador.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceInput {
    pub cpu: Option<String>,
    pub ram: Option<String>,
    pub disk: Option<String>,
    pub job_duration_minutes: Option<String>,
}

impl ResourceInput {
    fn entries(&self) -> [(ResourceId, Option<&String>); 4] {
        [(ResourceId::Cpu, self.cpu.as_ref()),
         (ResourceId::Ram, self.ram.as_ref()),
         (ResourceId::Disk, self.disk.as_ref()),
         (ResourceId::JobDuration, self.job_duration_minutes.as_ref())]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowSeed {
    pub allowance: TokenAmount,
    pub deposited: TokenAmount,
    pub locked: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub account: String,
    pub wallet_chain_id: u64,
    pub fee_rate_percent: TokenAmount,
    pub tier: Tier,
    pub environment: ComputeEnvironment,
    #[serde(default)]
    pub resources: ResourceInput,
    pub algorithm: ScenarioAsset,
    pub datasets: Vec<ScenarioAsset>,
    pub provider: ProviderQuote,
    #[serde(default)]
    pub escrow: EscrowSeed,
    #[serde(default)]
    pub ledger_script: LedgerScript,
    #[serde(default)]
    pub provider_script: ProviderScript,
    #[serde(default)]
    pub failing_credentials: Vec<ServiceRef>,
}

/// Escenario materializado.
pub struct ScenarioRig {
    pub request: CheckoutRequest,
    pub configurator: ResourceConfigurator,
    pub ledger: Arc<InMemoryLedger>,
    pub provider: Arc<InMemoryComputeProvider>,
    pub verifier: Arc<ScriptedVerifier>,
}

impl ScenarioRig {
    pub fn ports(&self) -> CheckoutPorts {
        CheckoutPorts { ledger: self.ledger.clone(),
                        orders: self.ledger.clone(),
                        provider: self.provider.clone(),
                        access: self.provider.clone() }
    }

    pub fn verification_items(&self) -> Vec<VerificationItem> {
        items_for(&self.request.algorithm, &self.request.datasets)
    }
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn build(&self, config: &CheckoutConfig) -> Result<ScenarioRig, ScenarioError> {
        let mut configurator = ResourceConfigurator::new(self.wallet_chain_id);
        configurator.select_environment(self.environment.clone());
        for (resource, raw) in self.resources.entries() {
            if let Some(raw) = raw {
                configurator.update_resource(resource, raw, self.tier)?;
            }
        }
        let selection = configurator.require_selection(self.tier)?.clone();

        let ledger = InMemoryLedger::new(self.account.clone()).with_script(self.ledger_script.clone());
        if let Some(schedule) = self.environment.fee_schedule(self.environment.chain_id) {
            ledger.set_allowance(&schedule.fee_token_address, &config.escrow_contract_address, self.escrow.allowance);
            ledger.set_funds(&schedule.fee_token_address,
                             EscrowFunds { deposited: self.escrow.deposited,
                                           locked: self.escrow.locked });
        }

        let provider = self.datasets
                           .iter()
                           .chain(std::iter::once(&self.algorithm))
                           .fold(InMemoryComputeProvider::new(self.provider.clone()), |p, a| {
                               p.with_access(a.selection.service.clone(), a.access.clone())
                           })
                           .with_script(self.provider_script.clone());

        let verifier = ScriptedVerifier::new();
        for service in &self.failing_credentials {
            verifier.fail(service.clone());
        }

        let request = CheckoutRequest { account: self.account.clone(),
                                        wallet_chain_id: self.wallet_chain_id,
                                        environment: self.environment.clone(),
                                        selection,
                                        algorithm: self.algorithm.selection.clone(),
                                        datasets: self.datasets.iter().map(|d| d.selection.clone()).collect(),
                                        fee_rate_percent: self.fee_rate_percent };
        Ok(ScenarioRig { request,
                         configurator,
                         ledger: Arc::new(ledger),
                         provider: Arc::new(provider),
                         verifier: Arc::new(verifier) })
    }
}
