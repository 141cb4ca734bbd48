//! Proveedor de cómputo en memoria: sirve detalles de acceso, cotiza el
//! entorno y registra los jobs enviados.
use async_trait::async_trait;
use checkout_core::ports::{AccessDetailsSource, ComputeProvider, FreeJobRequest, InitializeRequest, PaidJobRequest, ProviderError, ProviderQuote};
use checkout_domain::{AccessDetails, ServiceRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderScript {
    pub reject_initialize: bool,
    pub reject_job: bool,
    /// Latencia simulada de cada lectura de detalles de acceso (ms).
    pub access_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedJob {
    Paid(PaidJobRequest),
    Free(FreeJobRequest),
}

#[derive(Debug, Default)]
struct ProviderState {
    access: HashMap<ServiceRef, AccessDetails>,
    access_reads: usize,
    jobs: Vec<SubmittedJob>,
    script: ProviderScript,
}

#[derive(Debug)]
pub struct InMemoryComputeProvider {
    quote: ProviderQuote,
    state: Mutex<ProviderState>,
}

impl InMemoryComputeProvider {
    pub fn new(quote: ProviderQuote) -> Self {
        Self { quote,
               state: Mutex::new(ProviderState::default()) }
    }

    pub fn with_access(self, service: ServiceRef, details: AccessDetails) -> Self {
        self.set_access(service, details);
        self
    }

    pub fn with_script(self, script: ProviderScript) -> Self {
        self.state().script = script;
        self
    }

    pub fn set_access(&self, service: ServiceRef, details: AccessDetails) {
        self.state().access.insert(service, details);
    }

    pub fn set_script(&self, script: ProviderScript) {
        self.state().script = script;
    }

    pub fn jobs(&self) -> Vec<SubmittedJob> {
        self.state().jobs.clone()
    }

    pub fn access_reads(&self) -> usize {
        self.state().access_reads
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn job_id(&self, n: usize) -> String {
        format!("job-{n:04}")
    }
}

#[async_trait]
impl AccessDetailsSource for InMemoryComputeProvider {
    async fn access_details(&self, service: &ServiceRef, _account: &str) -> Result<AccessDetails, ProviderError> {
        let delay = {
            let mut st = self.state();
            st.access_reads += 1;
            st.script.access_delay_ms
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.state()
            .access
            .get(service)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(service.to_string()))
    }
}

#[async_trait]
impl ComputeProvider for InMemoryComputeProvider {
    async fn initialize_compute(&self, request: &InitializeRequest) -> Result<ProviderQuote, ProviderError> {
        if self.state().script.reject_initialize {
            return Err(ProviderError::Rejected(format!("entorno {} no disponible", request.environment_id)));
        }
        Ok(self.quote.clone())
    }

    async fn start_paid_job(&self, request: &PaidJobRequest) -> Result<String, ProviderError> {
        let mut st = self.state();
        if st.script.reject_job {
            return Err(ProviderError::Rejected("job rechazado".into()));
        }
        st.jobs.push(SubmittedJob::Paid(request.clone()));
        Ok(self.job_id(st.jobs.len()))
    }

    async fn start_free_job(&self, request: &FreeJobRequest) -> Result<String, ProviderError> {
        let mut st = self.state();
        if st.script.reject_job {
            return Err(ProviderError::Rejected("job rechazado".into()));
        }
        st.jobs.push(SubmittedJob::Free(request.clone()));
        Ok(self.job_id(st.jobs.len()))
    }
}
