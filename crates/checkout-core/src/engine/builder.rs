//! Builder para `CheckoutEngine`.
//!
//! ```ignore
//! let engine = CheckoutEngine::in_memory(ports)
//!     .config(CheckoutConfig::default())
//!     .build();
//! ```
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::engine::request::CheckoutPorts;
use crate::engine::CheckoutEngine;
use crate::event::EventStore;
use crate::repo::CheckoutRepository;

pub struct EngineBuilder<E: EventStore, R: CheckoutRepository> {
    pub(crate) event_store: E,
    pub(crate) repository: R,
    pub(crate) ports: CheckoutPorts,
    pub(crate) config: CheckoutConfig,
    pub(crate) checkout_id: Option<Uuid>,
}

impl<E: EventStore, R: CheckoutRepository> EngineBuilder<E, R> {
    pub fn config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Reanuda un checkout existente en vez de crear uno nuevo.
    pub fn checkout_id(mut self, checkout_id: Uuid) -> Self {
        self.checkout_id = Some(checkout_id);
        self
    }

    pub fn build(self) -> CheckoutEngine<E, R> {
        CheckoutEngine::new_with_stores(self.event_store,
                                        self.repository,
                                        self.ports,
                                        self.config,
                                        self.checkout_id.unwrap_or_else(Uuid::new_v4))
    }
}
