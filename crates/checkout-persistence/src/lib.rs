//! checkout-persistence
//!
//! Backends en disco para el orquestador:
//! - `session`: `FileSessionStore`, sesiones de credencial en un JSON con
//!   escritura atómica (temporal + rename).
//! - `jsonl`: `JsonlEventStore`, log de eventos append-only en JSON lines.
//!   El replay se delega a `InMemoryCheckoutRepository` para mantener
//!   paridad exacta con el backend en memoria.
//! - `config`: rutas desde variables de entorno / `.env`.

pub mod config;
pub mod error;
pub mod jsonl;
pub mod session;

pub use config::{init_dotenv, StoreConfig};
pub use error::PersistenceError;
pub use jsonl::JsonlEventStore;
pub use session::FileSessionStore;
