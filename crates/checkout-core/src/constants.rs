//! Constantes del orquestador.
//!
//! `FINGERPRINT_VERSION` forma parte del input del fingerprint de
//! cotización: cambiarla invalida la comparación entre intentos.

pub const FINGERPRINT_VERSION: &str = "Q1";

/// Prefijo de las claves del almacén de sesiones.
pub const CREDENTIAL_KEY_PREFIX: &str = "credential";

pub const DEFAULT_CREDENTIAL_TTL_SECS: u64 = 300;
pub const DEFAULT_EXPIRY_TICK_SECS: u64 = 10;
pub const DEFAULT_AUTO_ADVANCE_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_ESCROW_SAFETY_MARGIN_PERCENT: u32 = 10;
/// Decimales del total presentado.
pub const DEFAULT_PRICE_PRECISION: u32 = 18;
