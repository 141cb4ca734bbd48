//! `SessionStore` respaldado por un archivo JSON.
//!
//! El archivo es un mapa `clave -> RFC 3339`. Cada escritura reescribe el
//! mapa completo en un temporal y lo renombra sobre el destino, de modo que
//! un lector nunca ve un archivo a medio escribir.
use chrono::{DateTime, Utc};
use checkout_core::credential::{SessionStore, SessionStoreError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

type SessionMap = BTreeMap<String, DateTime<Utc>>;

#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cache: Mutex<SessionMap>,
}

impl FileSessionStore {
    /// Abre (o crea al primer `set`) el archivo de sesiones.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                SessionMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| PersistenceError::Corrupt { path: path.display().to_string(),
                                                                                   line: e.line(),
                                                                                   msg: e.to_string() })?
            }
        } else {
            SessionMap::new()
        };
        log::debug!("sesiones cargadas desde {}: {}", path.display(), cache.len());
        Ok(Self { path,
                  cache: Mutex::new(cache) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionMap> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, map: &SessionMap) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Aplica `f` sobre una copia del mapa y solo la publica si el flush fue bien.
    fn mutate(&self, f: impl FnOnce(&mut SessionMap)) -> Result<(), SessionStoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        f(&mut next);
        self.flush(&next)?;
        *guard = next;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.lock().get(key).copied()
    }

    fn set(&self, key: &str, verified_at: DateTime<Utc>) -> Result<(), SessionStoreError> {
        self.mutate(|m| {
                m.insert(key.to_string(), verified_at);
            })
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.mutate(|m| {
                m.remove(key);
            })
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        self.mutate(|m| m.clear())
    }
}
