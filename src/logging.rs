//! Inicialización de logging para binarios y tests.
use std::sync::Once;

static INIT: Once = Once::new();

/// Instala `env_logger` respetando `RUST_LOG` (por defecto `info`).
/// Llamadas repetidas no tienen efecto.
pub fn init_logging() {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();
    });
}
