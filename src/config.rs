//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y construye `AppConfig`: los parámetros
//! del engine (`CheckoutConfig`) más las rutas de almacenamiento.
//! Variables ausentes usan los valores por defecto; valores mal formados
//! son `CoreError::Config`.
use checkout_core::CheckoutConfig;
use checkout_persistence::StoreConfig;
use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::core_error::CoreError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub checkout: CheckoutConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Lazy::force(&DOTENV_LOADED);
        let mut cfg = Self::from_lookup(|k| env::var(k).ok())?;
        cfg.store = StoreConfig::from_env();
        Ok(cfg)
    }

    /// Construye la configuración leyendo cada variable con `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let defaults = CheckoutConfig::default();
        let secs = |key: &str, default: Duration| -> Result<Duration, CoreError> {
            Ok(parse_var::<u64>(&lookup, key)?.map(Duration::from_secs).unwrap_or(default))
        };
        let checkout = CheckoutConfig { credential_ttl: secs("CHECKOUT_CREDENTIAL_TTL_SECS", defaults.credential_ttl)?,
                                        expiry_tick: secs("CHECKOUT_EXPIRY_TICK_SECS", defaults.expiry_tick)?,
                                        auto_advance_debounce: parse_var::<u64>(&lookup, "CHECKOUT_DEBOUNCE_MS")?.map(Duration::from_millis)
                                                                                                                  .unwrap_or(defaults.auto_advance_debounce),
                                        escrow_safety_margin_percent: parse_var(&lookup, "CHECKOUT_ESCROW_SAFETY_MARGIN")?.unwrap_or(defaults.escrow_safety_margin_percent),
                                        price_precision: parse_var(&lookup, "CHECKOUT_PRICE_PRECISION")?.unwrap_or(defaults.price_precision),
                                        escrow_contract_address: lookup("CHECKOUT_ESCROW_ADDRESS").unwrap_or(defaults.escrow_contract_address) };
        if checkout.credential_ttl.is_zero() || checkout.expiry_tick.is_zero() {
            return Err(CoreError::Config("el TTL y el tick de expiración deben ser mayores que 0".into()));
        }
        if checkout.price_precision > 18 {
            return Err(CoreError::Config(format!("CHECKOUT_PRICE_PRECISION={} excede 18 decimales", checkout.price_precision)));
        }
        let store = match lookup("CHECKOUT_DATA_DIR") {
            Some(dir) => StoreConfig::in_dir(dir),
            None => StoreConfig::in_dir(checkout_persistence::config::DEFAULT_DATA_DIR),
        };
        Ok(Self { checkout, store })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, CoreError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim()
                        .parse::<T>()
                        .map(Some)
                        .map_err(|_| CoreError::Config(format!("{key}={raw} no es un valor válido"))),
    }
}
