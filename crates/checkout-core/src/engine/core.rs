//! Core CheckoutEngine implementation

use checkout_domain::{aggregate, calculate_price, AccessDetails, AssetSelection, FeeItem, PriceInput, PricedItem, ServiceRef, Tier, TokenAmount};
use log::{info, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::access::fetch_access_details;
use crate::config::CheckoutConfig;
use crate::constants::FINGERPRINT_VERSION;
use crate::credential::{SharedQueue, VerificationStatus};
use crate::engine::builder::EngineBuilder;
use crate::engine::request::{CheckoutPorts, CheckoutRequest, JobSubmission, QuoteResolution};
use crate::errors::CheckoutError;
use crate::escrow::{EscrowFundingManager, EscrowRequirement};
use crate::event::{CheckoutEvent, CheckoutEventKind, EventStore, InMemoryEventStore};
use crate::hashing::hash_value;
use crate::order::{OrderOrchestrator, OrderReceipt, OrderTarget};
use crate::phase::CheckoutPhase;
use crate::ports::{AlgorithmInput, DatasetInput, FreeJobRequest, InitializeRequest, OrderQuote, PaidJobRequest, PolicyPayload};
use crate::repo::{CheckoutInstance, CheckoutRepository, InMemoryCheckoutRepository};

/// Sesiones de credencial por servicio, en orden de cola.
type Sessions = Vec<(ServiceRef, String)>;

/// Orquestador del checkout.
///
/// Cada transición se registra como evento; el estado (fase, intento,
/// recibos) se obtiene siempre por replay desde el `EventStore`.
pub struct CheckoutEngine<E, R>
    where E: EventStore,
          R: CheckoutRepository
{
    event_store: E,
    repository: R,
    ports: CheckoutPorts,
    config: CheckoutConfig,
    checkout_id: Uuid,
}

impl CheckoutEngine<InMemoryEventStore, InMemoryCheckoutRepository> {
    /// Builder con stores en memoria.
    pub fn in_memory(ports: CheckoutPorts) -> EngineBuilder<InMemoryEventStore, InMemoryCheckoutRepository> {
        Self::builder(InMemoryEventStore::new(), InMemoryCheckoutRepository::new(), ports)
    }
}

impl<E, R> CheckoutEngine<E, R>
    where E: EventStore,
          R: CheckoutRepository
{
    pub fn builder(event_store: E, repository: R, ports: CheckoutPorts) -> EngineBuilder<E, R> {
        EngineBuilder { event_store,
                        repository,
                        ports,
                        config: CheckoutConfig::default(),
                        checkout_id: None }
    }

    pub fn new_with_stores(event_store: E, repository: R, ports: CheckoutPorts, config: CheckoutConfig, checkout_id: Uuid) -> Self {
        Self { event_store,
               repository,
               ports,
               config,
               checkout_id }
    }

    pub fn checkout_id(&self) -> Uuid {
        self.checkout_id
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn event_store(&self) -> &E {
        &self.event_store
    }

    pub fn events(&self) -> Result<Vec<CheckoutEvent>, CheckoutError> {
        self.event_store.list(self.checkout_id)
    }

    pub fn instance(&self) -> Result<CheckoutInstance, CheckoutError> {
        let events = self.events()?;
        Ok(self.repository.load(self.checkout_id, &events))
    }

    pub fn phase(&self) -> Result<CheckoutPhase, CheckoutError> {
        Ok(self.instance()?.phase)
    }

    /// Vuelve de `Failed` a `Idle` abriendo un intento nuevo. Los recibos
    /// del intento anterior no se reutilizan.
    pub fn retry(&mut self) -> Result<u32, CheckoutError> {
        let inst = self.instance()?;
        if inst.phase != CheckoutPhase::Failed {
            return Err(CheckoutError::InvalidPhase { expected: CheckoutPhase::Failed.to_string(),
                                                     found: inst.phase.to_string() });
        }
        let attempt = inst.attempt + 1;
        self.event_store.append_kind(self.checkout_id, CheckoutEventKind::RetryScheduled { attempt })?;
        info!("checkout {}: reintento {attempt}", self.checkout_id);
        Ok(attempt)
    }

    /// Revalida precios: detalles de acceso en paralelo, cotización del
    /// proveedor (tier de pago) y agregación. No altera el estado.
    pub async fn quote(&self, request: &CheckoutRequest, cancel: &CancellationToken) -> Result<QuoteResolution, CheckoutError> {
        let tier = request.tier();
        let env = &request.environment;
        let mut details = fetch_access_details(self.ports.access.as_ref(), &request.services(), &request.account, cancel).await?;
        let algorithm = details.pop().ok_or_else(|| CheckoutError::Internal("sin detalles del algoritmo".into()))?;
        let datasets = details;

        let schedule = env.fee_schedule(env.chain_id);
        let resource_price = calculate_price(tier, &request.selection, schedule)?;

        let provider_quote = match tier {
            Tier::Free => None,
            Tier::Paid => {
                let init = InitializeRequest { environment_id: env.id.clone(),
                                               datasets: request.dataset_services(),
                                               algorithm: request.algorithm.service.clone(),
                                               payment_token: schedule.map(|s| s.fee_token_address.clone()).unwrap_or_default(),
                                               job_duration_minutes: request.selection.job_duration_minutes,
                                               resources: request.resource_requests(),
                                               chain_id: env.chain_id,
                                               consumer: request.account.clone() };
                let quote = tokio::select! {
                    _ = cancel.cancelled() => return Err(CheckoutError::Cancelled),
                    quote = self.ports.provider.initialize_compute(&init) => quote,
                };
                Some(quote.map_err(|e| CheckoutError::PricingUnavailable(format!("inicialización del proveedor: {e}")))?)
            }
        };

        let algorithm_item = priced_item(&request.algorithm, &algorithm)?;
        let resource_symbol = schedule.map(|s| s.fee_token_symbol.clone())
                                      .unwrap_or_else(|| algorithm_item.token_symbol.clone());
        let input = PriceInput { datasets: request.datasets
                                                  .iter()
                                                  .zip(&datasets)
                                                  .map(|(sel, access)| priced_item(sel, access))
                                                  .collect::<Result<_, _>>()?,
                                 algorithm: algorithm_item,
                                 resource: PricedItem::new("resources", resource_price, resource_symbol),
                                 fee_rate_percent: request.fee_rate_percent,
                                 extra_fees: provider_quote.iter()
                                                           .flat_map(|q| &q.provider_fees)
                                                           .map(|f| FeeItem { label: format!("provider fee {}", f.service),
                                                                              amount: f.amount,
                                                                              token_symbol: f.token_symbol.clone() })
                                                           .collect() };
        let summary = aggregate(&input)?;
        let fingerprint = hash_value(&json!({
                              "version": FINGERPRINT_VERSION,
                              "lines": summary.lines,
                              "entries": summary.entries,
                          })).map_err(|e| CheckoutError::Internal(e.to_string()))?;
        Ok(QuoteResolution { datasets,
                             algorithm,
                             provider_quote,
                             resource_price,
                             summary,
                             fingerprint })
    }

    /// Ejecuta el pipeline completo desde `Idle` hasta `JobSubmitted`.
    ///
    /// - Credencial sin verificar o expirada al empezar: `CredentialInvalid`,
    ///   sin cambio de fase. La cola se vuelve a comprobar justo antes de
    ///   enviar el job.
    /// - Cancelación de la lectura de precios: `Cancelled`, sin cambio de fase.
    /// - Firma rechazada o credencial expirada a mitad del pipeline: el intento
    ///   vuelve a `Idle` conservando sus recibos; el siguiente `start_job`
    ///   los reutiliza.
    /// - Cualquier otro error marca el intento como `Failed` y descarta sus recibos.
    pub async fn start_job(&mut self,
                           request: &CheckoutRequest,
                           queue: &SharedQueue,
                           cancel: &CancellationToken)
                           -> Result<JobSubmission, CheckoutError> {
        let inst = self.ensure_initialized(request)?;
        if inst.phase != CheckoutPhase::Idle {
            return Err(CheckoutError::InvalidPhase { expected: CheckoutPhase::Idle.to_string(),
                                                     found: inst.phase.to_string() });
        }
        let sessions = credential_gate(request, queue).await?;

        let mut phase = CheckoutPhase::Idle;
        match self.run_pipeline(request, &inst, queue, &sessions, cancel, &mut phase).await {
            Ok(submission) => Ok(submission),
            Err(e) if e.unwinds_checkout() => {
                warn!("checkout {} falló en {phase}: {e}", self.checkout_id);
                self.event_store.append_kind(self.checkout_id,
                                             CheckoutEventKind::CheckoutFailed { phase,
                                                                                 error: e.clone() })?;
                Err(e)
            }
            Err(e) if phase.can_transition(CheckoutPhase::Idle, request.tier()) => {
                warn!("checkout {} interrumpido en {phase}: {e}", self.checkout_id);
                self.event_store.append_kind(self.checkout_id,
                                             CheckoutEventKind::AttemptInterrupted { phase,
                                                                                     error: e.clone() })?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn ensure_initialized(&mut self, request: &CheckoutRequest) -> Result<CheckoutInstance, CheckoutError> {
        let inst = self.instance()?;
        match inst.tier {
            Some(tier) if tier != request.tier() => {
                Err(CheckoutError::PreconditionFailed(format!("el checkout {} es de tier {tier:?}", self.checkout_id)))
            }
            Some(_) => Ok(inst),
            None => {
                self.event_store.append_kind(self.checkout_id,
                                             CheckoutEventKind::CheckoutInitialized { tier: request.tier(),
                                                                                      environment_id: request.environment.id.clone(),
                                                                                      chain_id: request.environment.chain_id })?;
                self.instance()
            }
        }
    }

    fn transition(&mut self, phase: &mut CheckoutPhase, to: CheckoutPhase, tier: Tier, kind: CheckoutEventKind) -> Result<(), CheckoutError> {
        if !phase.can_transition(to, tier) {
            return Err(CheckoutError::InvalidPhase { expected: to.to_string(),
                                                     found: phase.to_string() });
        }
        self.event_store.append_kind(self.checkout_id, kind)?;
        info!("checkout {}: {phase} -> {to}", self.checkout_id);
        *phase = to;
        Ok(())
    }

    async fn run_pipeline(&mut self,
                          request: &CheckoutRequest,
                          inst: &CheckoutInstance,
                          queue: &SharedQueue,
                          sessions: &Sessions,
                          cancel: &CancellationToken,
                          phase: &mut CheckoutPhase)
                          -> Result<JobSubmission, CheckoutError> {
        let tier = request.tier();
        check_network(request)?;

        let resolution = self.quote(request, cancel).await?;
        if let Some(previous) = &inst.previous_fingerprint {
            if previous != &resolution.fingerprint {
                info!("checkout {}: los precios cambiaron desde el intento anterior", self.checkout_id);
            }
        }
        self.transition(phase,
                        CheckoutPhase::PricingResolved,
                        tier,
                        CheckoutEventKind::PricingResolved { quote_fingerprint: resolution.fingerprint.clone(),
                                                             entries: resolution.summary.entries.clone() })?;

        let orchestrator = OrderOrchestrator::new(self.ports.orders.clone(), &request.account, &request.environment.consumer_address);
        orchestrator.precheck(&request.algorithm.service, &request.dataset_services()).await?;

        if tier == Tier::Free {
            let sessions = credential_gate(request, queue).await?;
            let job_id = self.submit_free(request, &sessions).await?;
            self.transition(phase, CheckoutPhase::JobSubmitted, tier, CheckoutEventKind::JobSubmitted { job_id: job_id.clone() })?;
            return Ok(JobSubmission { checkout_id: self.checkout_id,
                                      job_id,
                                      receipts: Vec::new(),
                                      funding: None });
        }

        let env = &request.environment;
        let schedule = env.fee_schedule(env.chain_id)
                          .ok_or_else(|| CheckoutError::PreconditionFailed(format!("sin precios para la cadena {}", env.chain_id)))?;
        let provider_quote = resolution.provider_quote
                                       .as_ref()
                                       .ok_or_else(|| CheckoutError::Internal("cotización del proveedor ausente".into()))?;
        let manager = EscrowFundingManager::new(self.ports.ledger.clone(),
                                                self.config.escrow_contract_address.clone(),
                                                self.config.escrow_safety_margin_percent);
        let funding = manager.ensure_funds(&EscrowRequirement { token_address: schedule.fee_token_address.clone(),
                                                                owner: request.account.clone(),
                                                                payee: provider_quote.payee.clone(),
                                                                required_amount: resolution.resource_price,
                                                                payment_amount: provider_quote.payment_amount,
                                                                min_lock_seconds: provider_quote.min_lock_seconds })
                             .await?;
        self.transition(phase,
                        CheckoutPhase::EscrowReady,
                        tier,
                        CheckoutEventKind::EscrowReady { approve_tx: funding.approve_tx.clone(),
                                                         deposit_tx: funding.deposit_tx.clone() })?;

        let algorithm_target = order_target(&request.algorithm, &resolution.algorithm, request.fee_rate_percent, sessions)?
                                   .resume_from(inst.receipt_for(&request.algorithm.service));
        let algorithm_receipt = orchestrator.order_algorithm(&algorithm_target).await?;
        self.transition(phase,
                        CheckoutPhase::AlgorithmOrdered,
                        tier,
                        CheckoutEventKind::AlgorithmOrdered { receipt: algorithm_receipt.clone() })?;

        let targets = request.datasets
                             .iter()
                             .zip(&resolution.datasets)
                             .map(|(sel, access)| {
                                 order_target(sel, access, request.fee_rate_percent, sessions).map(|t| t.resume_from(inst.receipt_for(&sel.service)))
                             })
                             .collect::<Result<Vec<_>, _>>()?;
        let checkout_id = self.checkout_id;
        let store = &mut self.event_store;
        let dataset_receipts = orchestrator.order_datasets(&targets, |receipt| {
                                               store.append_kind(checkout_id, CheckoutEventKind::DatasetOrdered { receipt: receipt.clone() })
                                                    .map(|_| ())
                                           })
                                           .await?;
        self.transition(phase,
                        CheckoutPhase::DatasetsOrdered,
                        tier,
                        CheckoutEventKind::DatasetsOrdered { count: dataset_receipts.len() })?;

        // las credenciales pueden expirar mientras se confirman las órdenes
        let sessions = credential_gate(request, queue).await?;
        let job_id = self.submit_paid(request, &algorithm_receipt, &dataset_receipts, &sessions).await?;
        self.transition(phase, CheckoutPhase::JobSubmitted, tier, CheckoutEventKind::JobSubmitted { job_id: job_id.clone() })?;

        let mut receipts = vec![algorithm_receipt];
        receipts.extend(dataset_receipts);
        Ok(JobSubmission { checkout_id: self.checkout_id,
                           job_id,
                           receipts,
                           funding: Some(funding) })
    }

    async fn submit_paid(&self,
                         request: &CheckoutRequest,
                         algorithm: &OrderReceipt,
                         datasets: &[OrderReceipt],
                         sessions: &Sessions)
                         -> Result<String, CheckoutError> {
        if datasets.len() != request.datasets.len() || algorithm.service != request.algorithm.service {
            return Err(CheckoutError::Internal("faltan recibos de orden para enviar el job".into()));
        }
        let env = &request.environment;
        let job = PaidJobRequest { environment_id: env.id.clone(),
                                   datasets: request.datasets
                                                    .iter()
                                                    .zip(datasets)
                                                    .map(|(sel, r)| dataset_input(sel, Some(r.transaction_id.clone())))
                                                    .collect(),
                                   algorithm: algorithm_input(&request.algorithm, Some(algorithm.transaction_id.clone())),
                                   job_duration_minutes: request.selection.job_duration_minutes,
                                   payment_token: env.fee_schedule(env.chain_id)
                                                     .map(|s| s.fee_token_address.clone())
                                                     .unwrap_or_default(),
                                   resources: request.resource_requests(),
                                   chain_id: env.chain_id,
                                   consumer: request.account.clone(),
                                   policy_payloads: policy_payloads(sessions) };
        self.ports
            .provider
            .start_paid_job(&job)
            .await
            .map_err(|e| CheckoutError::TransactionFailed(format!("inicio del job rechazado: {e}")))
    }

    async fn submit_free(&self, request: &CheckoutRequest, sessions: &Sessions) -> Result<String, CheckoutError> {
        let job = FreeJobRequest { environment_id: request.environment.id.clone(),
                                   datasets: request.datasets.iter().map(|sel| dataset_input(sel, None)).collect(),
                                   algorithm: algorithm_input(&request.algorithm, None),
                                   resources: request.resource_requests(),
                                   chain_id: request.environment.chain_id,
                                   consumer: request.account.clone(),
                                   policy_payloads: policy_payloads(sessions) };
        self.ports
            .provider
            .start_free_job(&job)
            .await
            .map_err(|e| CheckoutError::TransactionFailed(format!("inicio del job gratuito rechazado: {e}")))
    }
}

/// Toda credencial de la cola debe estar verificada. Devuelve las sesiones
/// a adjuntar al job.
async fn credential_gate(request: &CheckoutRequest, queue: &SharedQueue) -> Result<Sessions, CheckoutError> {
    let queue = queue.lock().await;
    let queued: Vec<&ServiceRef> = queue.items().iter().map(|i| &i.service).collect();
    let expected = request.services();
    if queued.len() != expected.len() || queued.iter().zip(&expected).any(|(q, e)| *q != e) {
        return Err(CheckoutError::PreconditionFailed("la cola de credenciales no corresponde a los activos del checkout".into()));
    }
    if let Some(item) = queue.first_blocking() {
        return Err(CheckoutError::CredentialInvalid { asset_id: item.service.asset_id.clone(),
                                                      service_id: item.service.service_id.clone(),
                                                      expired: item.status == VerificationStatus::Expired });
    }
    Ok(queue.items()
            .iter()
            .filter_map(|i| i.session_id.clone().map(|s| (i.service.clone(), s)))
            .collect())
}

fn check_network(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    let env = &request.environment;
    if request.wallet_chain_id != env.chain_id {
        return Err(CheckoutError::PreconditionFailed(format!("la wallet está en la cadena {} y el entorno {} en la {}",
                                                             request.wallet_chain_id, env.id, env.chain_id)));
    }
    if request.tier() == Tier::Paid && env.fee_schedule(env.chain_id).is_none() {
        return Err(CheckoutError::PreconditionFailed(format!("el entorno {} no publica precios para la cadena {}", env.id, env.chain_id)));
    }
    Ok(())
}

fn priced_item(selection: &AssetSelection, access: &AccessDetails) -> Result<PricedItem, CheckoutError> {
    let price = access.price
                      .ok_or_else(|| CheckoutError::PricingUnavailable(format!("{} no expone precio", selection.service)))?;
    let symbol = access.token_symbol
                       .clone()
                       .ok_or_else(|| CheckoutError::PricingUnavailable(format!("{} sin token de pago", selection.service)))?;
    Ok(PricedItem::new(selection.display_name.clone(), price, symbol).already_paid(access.is_already_paid()))
}

fn order_target(selection: &AssetSelection, access: &AccessDetails, fee_rate_percent: TokenAmount, sessions: &Sessions) -> Result<OrderTarget, CheckoutError> {
    let price = if access.owns_datatoken {
        TokenAmount::ZERO
    } else {
        access.price
              .ok_or_else(|| CheckoutError::PricingUnavailable(format!("{} no expone precio", selection.service)))?
    };
    let quote = OrderQuote { price,
                             market_fee: price.percent(fee_rate_percent)?,
                             token_symbol: access.token_symbol.clone().unwrap_or_default(),
                             token_address: access.token_address.clone() };
    Ok(OrderTarget { service: selection.service.clone(),
                     kind: selection.kind,
                     access: access.clone(),
                     quote,
                     session_id: session_for(sessions, &selection.service) })
}

fn session_for(sessions: &Sessions, service: &ServiceRef) -> Option<String> {
    sessions.iter().find(|(s, _)| s == service).map(|(_, id)| id.clone())
}

fn policy_payloads(sessions: &Sessions) -> Vec<PolicyPayload> {
    sessions.iter()
            .map(|(service, session_id)| PolicyPayload { service: service.clone(),
                                                         session_id: session_id.clone() })
            .collect()
}

fn dataset_input(selection: &AssetSelection, transfer_tx_id: Option<String>) -> DatasetInput {
    DatasetInput { document_id: selection.service.asset_id.clone(),
                   service_id: selection.service.service_id.clone(),
                   transfer_tx_id,
                   user_params: selection.user_params.clone() }
}

fn algorithm_input(selection: &AssetSelection, transfer_tx_id: Option<String>) -> AlgorithmInput {
    AlgorithmInput { document_id: selection.service.asset_id.clone(),
                     service_id: selection.service.service_id.clone(),
                     transfer_tx_id,
                     algo_params: selection.algo_params.clone(),
                     user_params: selection.user_params.clone() }
}
