//! Rutas de almacenamiento desde variables de entorno.
//! `CHECKOUT_DATA_DIR` fija el directorio base; `CHECKOUT_SESSION_FILE` y
//! `CHECKOUT_EVENT_LOG` permiten sobreescribir cada archivo.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_DATA_DIR: &str = ".c2d-checkout";
const SESSION_FILE_NAME: &str = "sessions.json";
const EVENT_LOG_NAME: &str = "events.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub session_file: PathBuf,
    pub event_log: PathBuf,
}

impl StoreConfig {
    /// Archivos por defecto dentro de `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self { session_file: data_dir.join(SESSION_FILE_NAME),
               event_log: data_dir.join(EVENT_LOG_NAME),
               data_dir }
    }

    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let data_dir = env::var("CHECKOUT_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        let mut cfg = Self::in_dir(data_dir);
        if let Ok(p) = env::var("CHECKOUT_SESSION_FILE") {
            cfg.session_file = PathBuf::from(p);
        }
        if let Ok(p) = env::var("CHECKOUT_EVENT_LOG") {
            cfg.event_log = PathBuf::from(p);
        }
        cfg
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_data_dir() {
        let cfg = StoreConfig::in_dir("/tmp/x");
        assert_eq!(cfg.session_file, PathBuf::from("/tmp/x/sessions.json"));
        assert_eq!(cfg.event_log, PathBuf::from("/tmp/x/events.jsonl"));
    }
}
