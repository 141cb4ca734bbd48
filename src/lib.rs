//! C2D Checkout
//!
//! Fachada del workspace:
//! - `config` carga `AppConfig` desde el entorno / `.env`.
//! - `errors` define `CoreError`.
//! - `logging` inicializa `env_logger` una sola vez.
//! - `open_engine` y `open_session_store` conectan el engine con los
//!   backends en disco según la configuración.
//!
//! Los crates del workspace se re-exportan para que binarios y tests
//! dependan sólo de este crate.

pub mod config;
pub mod errors;
pub mod logging;

pub use checkout_adapters as adapters;
pub use checkout_core as core;
pub use checkout_domain as domain;
pub use checkout_persistence as persistence;

pub use config::AppConfig;
pub use errors::core_error::CoreError;
pub use logging::init_logging;

use checkout_core::{CheckoutEngine, CheckoutPorts, InMemoryCheckoutRepository};
use checkout_persistence::{FileSessionStore, JsonlEventStore};
use std::path::Path;
use uuid::Uuid;

/// Engine con log de eventos JSON lines.
pub type FileEngine = CheckoutEngine<JsonlEventStore, InMemoryCheckoutRepository>;

/// Abre el engine sobre `event_log` (o el log configurado). Con `checkout_id`
/// reanuda un checkout existente.
pub fn open_engine(app: &AppConfig, ports: CheckoutPorts, event_log: Option<&Path>, checkout_id: Option<Uuid>) -> Result<FileEngine, CoreError> {
    let path = event_log.unwrap_or(&app.store.event_log);
    let store = JsonlEventStore::open(path)?;
    log::info!("event log en {}", path.display());
    let builder = CheckoutEngine::builder(store, InMemoryCheckoutRepository::new(), ports).config(app.checkout.clone());
    Ok(match checkout_id {
        Some(id) => builder.checkout_id(id).build(),
        None => builder.build(),
    })
}

pub fn open_session_store(app: &AppConfig) -> Result<FileSessionStore, CoreError> {
    Ok(FileSessionStore::open(&app.store.session_file)?)
}

#[cfg(test)]
mod tests {
    use super::errors::core_error::CoreError;

    #[test]
    fn core_error_display() {
        let i = CoreError::Internal("fallo".into()).to_string();
        assert_eq!(i, "Error interno: fallo");
    }
}
