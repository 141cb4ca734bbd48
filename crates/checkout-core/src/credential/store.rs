//! Almacén de sesiones de credenciales.
//!
//! Guarda, por `credential_{assetId}_{serviceId}`, la marca de tiempo de la
//! última verificación exitosa. El almacén no expira nada por sí mismo: la
//! cola calcula la expiración con su TTL y su reloj.
use chrono::{DateTime, Utc};
use checkout_domain::ServiceRef;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::constants::CREDENTIAL_KEY_PREFIX;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("io: {0}")]
    Io(String),
    #[error("contenido inválido: {0}")]
    Corrupt(String),
}

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<DateTime<Utc>>;
    fn set(&self, key: &str, verified_at: DateTime<Utc>) -> Result<(), SessionStoreError>;
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Clave de la sesión de credencial de un servicio.
pub fn credential_key(service: &ServiceRef) -> String {
    format!("{CREDENTIAL_KEY_PREFIX}_{}_{}", service.asset_id, service.service_id)
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).get(key).copied()
    }

    fn set(&self, key: &str, verified_at: DateTime<Utc>) -> Result<(), SessionStoreError> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_string(), verified_at);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_client_store() {
        let key = credential_key(&ServiceRef::new("did:op:123", "svc-1"));
        assert_eq!(key, "credential_did:op:123_svc-1");
    }

    #[test]
    fn in_memory_store_set_get_clear() {
        let store = InMemorySessionStore::new();
        let ts = Utc::now();
        store.set("k", ts).unwrap();
        assert_eq!(store.get("k"), Some(ts));
        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
