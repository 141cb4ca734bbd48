//! Verificador de credenciales con resultados programados por servicio.
use async_trait::async_trait;
use checkout_core::ports::{CredentialVerifier, VerificationOutcome};
use checkout_domain::ServiceRef;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    failing: Mutex<HashSet<ServiceRef>>,
    calls: Mutex<Vec<ServiceRef>>,
    delay: Duration,
}

impl ScriptedVerifier {
    /// Todas las verificaciones tienen éxito salvo las marcadas con `fail`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail(&self, service: ServiceRef) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).insert(service);
    }

    pub fn succeed(&self, service: &ServiceRef) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).remove(service);
    }

    pub fn calls(&self) -> Vec<ServiceRef> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CredentialVerifier for ScriptedVerifier {
    async fn verify(&self, service: &ServiceRef) -> VerificationOutcome {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(service.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner()).contains(service);
        if failing {
            VerificationOutcome { success: false,
                                  session_id: None }
        } else {
            VerificationOutcome { success: true,
                                  session_id: Some(format!("session-{}-{}", service.asset_id, service.service_id)) }
        }
    }
}
