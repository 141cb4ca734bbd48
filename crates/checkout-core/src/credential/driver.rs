//! Ejecución asíncrona de la cola: llamadas al verificador con auto-avance
//! (debounce) y tick periódico de expiración.
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::queue::{CredentialQueue, QueueError};
use crate::ports::CredentialVerifier;

pub type SharedQueue = Arc<Mutex<CredentialQueue>>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DriverReport {
    pub verified: Vec<usize>,
    /// Ítem en el que se detuvo el auto-avance.
    pub failed: Option<usize>,
    pub cancelled: bool,
}

pub struct VerificationDriver {
    queue: SharedQueue,
    verifier: Arc<dyn CredentialVerifier>,
    debounce: Duration,
}

impl VerificationDriver {
    pub fn new(queue: SharedQueue, verifier: Arc<dyn CredentialVerifier>, debounce: Duration) -> Self {
        Self { queue, verifier, debounce }
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// Verifica a partir de `index` y avanza por la cola hasta que todo esté
    /// verificado, falle un ítem o se cancele el token. El lock de la cola no
    /// se mantiene durante la llamada al verificador.
    pub async fn run_from(&self, index: usize, cancel: &CancellationToken) -> Result<DriverReport, QueueError> {
        let mut report = DriverReport::default();
        let mut next = Some(index);
        while let Some(requested) = next {
            let (target, service) = {
                let mut queue = self.queue.lock().await;
                let target = queue.start_verification(requested)?;
                let service = queue.item(target).map(|i| i.service.clone()).ok_or(QueueError::OutOfRange(target))?;
                (target, service)
            };
            debug!("verificando credencial de {service} (ítem {target})");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = self.verifier.verify(&service) => Some(outcome),
            };

            let mut queue = self.queue.lock().await;
            match outcome {
                None => {
                    queue.abort(target)?;
                    report.cancelled = true;
                    return Ok(report);
                }
                Some(o) if o.success => {
                    next = queue.complete(target, o.session_id)?;
                    report.verified.push(target);
                    info!("credencial verificada para {service}");
                }
                Some(_) => {
                    queue.abort(target)?;
                    warn!("verificación fallida para {service}; auto-avance detenido");
                    report.failed = Some(target);
                    return Ok(report);
                }
            }
            drop(queue);

            if next.is_some() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        return Ok(report);
                    }
                    _ = tokio::time::sleep(self.debounce) => {}
                }
            }
        }
        Ok(report)
    }
}

/// Lanza el tick de expiración. Termina al cancelar el token.
pub fn spawn_expiry_ticker(queue: SharedQueue, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let mut q = queue.lock().await;
                    for index in q.tick() {
                        if let Some(item) = q.item(index) {
                            warn!("credencial expirada para {}", item.service);
                        }
                    }
                }
            }
        }
        debug!("tick de expiración detenido");
    })
}
