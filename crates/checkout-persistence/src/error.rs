//! Errores de persistencia y su traducción a los errores del core.

use checkout_core::credential::SessionStoreError;
use checkout_core::CheckoutError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{path}:{line}: línea corrupta: {msg}")]
    Corrupt { path: String, line: usize, msg: String },
}

impl From<PersistenceError> for CheckoutError {
    fn from(e: PersistenceError) -> Self {
        CheckoutError::Internal(format!("persistencia: {e}"))
    }
}

impl From<PersistenceError> for SessionStoreError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::Io(e) => SessionStoreError::Io(e.to_string()),
            other => SessionStoreError::Corrupt(other.to_string()),
        }
    }
}
