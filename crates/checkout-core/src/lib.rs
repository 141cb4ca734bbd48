//! checkout-core: orquestador de checkout C2D (credenciales, escrow,
//! órdenes y envío del job) dirigido por eventos.
pub mod access;
pub mod config;
pub mod constants;
pub mod credential;
pub mod engine;
pub mod errors;
pub mod escrow;
pub mod event;
pub mod hashing;
pub mod order;
pub mod phase;
pub mod ports;
pub mod repo;

pub use config::CheckoutConfig;
pub use credential::{CredentialQueue, SessionStore, SharedQueue, VerificationDriver, VerificationItem, VerificationStatus};
pub use engine::{CheckoutEngine, CheckoutPorts, CheckoutRequest, JobSubmission, QuoteResolution};
pub use errors::{CheckoutError, ErrorCategory};
pub use escrow::{EscrowFundingManager, EscrowRequirement, FundingReport};
pub use event::{CheckoutEvent, CheckoutEventKind, EventStore, InMemoryEventStore};
pub use order::{OrderOrchestrator, OrderReceipt, OrderTarget};
pub use phase::CheckoutPhase;
pub use repo::{CheckoutInstance, CheckoutRepository, InMemoryCheckoutRepository};
