use checkout_adapters::ScenarioError;
use checkout_core::CheckoutError;
use checkout_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error interno: {0}")]
    Internal(String),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Escenario inválido: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("{}", .0.user_message())]
    Checkout(#[from] CheckoutError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_variant_from() {
        let io_err = std::io::Error::other("falló IO");
        let err: CoreError = io_err.into();
        assert_eq!(err.to_string(), "Error en IO: falló IO");
    }

    #[test]
    fn test_config_variant_format() {
        let err = CoreError::Config("CHECKOUT_DEBOUNCE_MS=abc".into());
        assert_eq!(err.to_string(), "Error de configuración: CHECKOUT_DEBOUNCE_MS=abc");
    }

    #[test]
    fn checkout_errors_show_the_user_message() {
        let inner = CheckoutError::Cancelled;
        let expected = inner.user_message();
        assert_eq!(CoreError::from(inner).to_string(), expected);
    }
}
