//! checkout-adapters: colaboradores en memoria para el orquestador.
//!
//! - `InMemoryLedger`: escrow y contrato de órdenes con fallos programables.
//! - `InMemoryComputeProvider`: detalles de acceso, cotización e inicio de jobs.
//! - `ScriptedVerifier`: verificador de credenciales determinista.
//! - `Scenario`: descripción JSON de un checkout completo (la usa la CLI).
//!
//! Ninguno hace IO de red; sirven para tests y para ejecutar escenarios.

pub mod ledger;
pub mod provider;
pub mod scenario;
pub mod verifier;

pub use ledger::{InMemoryLedger, LedgerScript, LedgerWrite};
pub use provider::{InMemoryComputeProvider, ProviderScript, SubmittedJob};
pub use scenario::{Scenario, ScenarioError, ScenarioRig};
pub use verifier::ScriptedVerifier;
