//! Lectura concurrente de detalles de acceso (precio, token, orden previa).
use checkout_domain::{AccessDetails, ServiceRef};
use futures::future::join_all;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::errors::CheckoutError;
use crate::ports::{AccessDetailsSource, ProviderError};

/// Resuelve los detalles de todos los servicios en paralelo, en el mismo
/// orden de entrada. Si el token se cancela antes de terminar, el resultado
/// se descarta con `CheckoutError::Cancelled`.
pub async fn fetch_access_details(source: &dyn AccessDetailsSource,
                                  services: &[ServiceRef],
                                  account: &str,
                                  cancel: &CancellationToken)
                                  -> Result<Vec<AccessDetails>, CheckoutError> {
    debug!("resolviendo detalles de acceso de {} servicios", services.len());
    let fetches = join_all(services.iter().map(|s| source.access_details(s, account)));
    let results = tokio::select! {
        _ = cancel.cancelled() => return Err(CheckoutError::Cancelled),
        results = fetches => results,
    };
    services.iter()
            .zip(results)
            .map(|(service, result)| result.map_err(|e| pricing_error(service, e)))
            .collect()
}

fn pricing_error(service: &ServiceRef, e: ProviderError) -> CheckoutError {
    CheckoutError::PricingUnavailable(format!("{service}: {e}"))
}
