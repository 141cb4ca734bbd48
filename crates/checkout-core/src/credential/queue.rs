//! Cola de verificación de credenciales.
//!
//! Una entrada por servicio de dataset más una por el servicio del
//! algoritmo. Cada entrada es una máquina de estados:
//!
//! - `Unverified` -> `Checking`
//! - `Checking` -> `Verified` | `Failed`
//! - `Verified` -> `Expired` (tick de expiración)
//! - `Failed` | `Expired` -> `Checking` (reintento)
//!
//! `Checking` es un flag de exclusión mutua: nunca hay dos entradas en
//! verificación. Si existe alguna entrada `Failed`/`Expired`, cualquier
//! inicio se redirige a la primera de ellas (prioridad de fallos).
use chrono::Duration as ChronoDuration;
use checkout_domain::{AssetKind, AssetSelection, ServiceRef};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

use super::clock::Clock;
use super::store::{credential_key, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Unverified,
    Checking,
    Verified,
    Failed,
    Expired,
}

impl VerificationStatus {
    /// Estados que tienen prioridad al elegir el siguiente ítem.
    pub fn needs_attention(self) -> bool {
        matches!(self, VerificationStatus::Failed | VerificationStatus::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationItem {
    pub service: ServiceRef,
    pub kind: AssetKind,
    pub status: VerificationStatus,
    pub duration_seconds: u64,
    pub display_name: String,
    pub requires_credential: bool,
    /// Sesión devuelta por el verificador en el último éxito.
    pub session_id: Option<String>,
}

impl VerificationItem {
    pub fn from_selection(selection: &AssetSelection) -> Self {
        Self { service: selection.service.clone(),
               kind: selection.kind,
               status: VerificationStatus::Unverified,
               duration_seconds: selection.duration_seconds,
               display_name: selection.display_name.clone(),
               requires_credential: selection.requires_credential,
               session_id: None }
    }
}

/// Ítems de un checkout: un servicio por dataset y luego el algoritmo.
pub fn items_for(algorithm: &AssetSelection, datasets: &[AssetSelection]) -> Vec<VerificationItem> {
    datasets.iter()
            .chain(std::iter::once(algorithm))
            .map(VerificationItem::from_selection)
            .collect()
}

/// Notificación "credencial actualizada".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub index: usize,
    pub service: ServiceRef,
    pub status: VerificationStatus,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("ya hay una verificación en curso (ítem {0})")]
    Busy(usize),
    #[error("índice fuera de la cola: {0}")]
    OutOfRange(usize),
    #[error("el ítem {0} no está en verificación")]
    NotChecking(usize),
}

pub struct CredentialQueue {
    items: Vec<VerificationItem>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: ChronoDuration,
    updates: broadcast::Sender<CredentialUpdate>,
}

impl CredentialQueue {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let (updates, _) = broadcast::channel(64);
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        Self { items: Vec::new(),
               store,
               clock,
               ttl,
               updates }
    }

    /// Reconstruye la cola. Los servicios sin credencial exigida quedan
    /// `Verified` de forma permanente.
    pub fn init_queue(&mut self, items: Vec<VerificationItem>) {
        self.items = items.into_iter()
                          .map(|mut item| {
                              item.status = if item.requires_credential {
                                  VerificationStatus::Unverified
                              } else {
                                  VerificationStatus::Verified
                              };
                              item.session_id = None;
                              item
                          })
                          .collect();
        debug!("cola de credenciales inicializada con {} ítems", self.items.len());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CredentialUpdate> {
        self.updates.subscribe()
    }

    pub fn items(&self) -> &[VerificationItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&VerificationItem> {
        self.items.get(index)
    }

    pub fn checking_index(&self) -> Option<usize> {
        self.items.iter().position(|i| i.status == VerificationStatus::Checking)
    }

    fn first_attention_index(&self) -> Option<usize> {
        self.items.iter().position(|i| i.status.needs_attention())
    }

    /// Siguiente ítem a verificar: el primer `Failed`/`Expired`, o si no hay,
    /// el primer `Unverified`.
    pub fn next_pending(&self) -> Option<usize> {
        self.first_attention_index()
            .or_else(|| self.items.iter().position(|i| i.status == VerificationStatus::Unverified))
    }

    pub fn all_verified(&self) -> bool {
        self.items.iter().all(|i| i.status == VerificationStatus::Verified)
    }

    /// Primer ítem que impide enviar el job.
    pub fn first_blocking(&self) -> Option<&VerificationItem> {
        self.items.iter().find(|i| i.status != VerificationStatus::Verified)
    }

    pub fn session_id(&self, service: &ServiceRef) -> Option<&str> {
        self.items
            .iter()
            .find(|i| &i.service == service)
            .and_then(|i| i.session_id.as_deref())
    }

    /// Inicia la verificación. Devuelve el índice realmente iniciado, que
    /// puede diferir del pedido por la regla de prioridad de fallos.
    pub fn start_verification(&mut self, index: usize) -> Result<usize, QueueError> {
        if index >= self.items.len() {
            return Err(QueueError::OutOfRange(index));
        }
        if let Some(current) = self.checking_index() {
            return Err(QueueError::Busy(current));
        }
        let target = self.first_attention_index().unwrap_or(index);
        if target != index {
            debug!("verificación redirigida de {index} a {target} (ítem fallido/expirado)");
        }
        self.transition(target, VerificationStatus::Checking);
        Ok(target)
    }

    /// Marca el ítem como verificado, persiste la marca de tiempo y devuelve
    /// el siguiente ítem para el auto-avance.
    pub fn complete(&mut self, index: usize, session_id: Option<String>) -> Result<Option<usize>, QueueError> {
        let item = self.items.get(index).ok_or(QueueError::OutOfRange(index))?;
        if item.status != VerificationStatus::Checking {
            return Err(QueueError::NotChecking(index));
        }
        let key = credential_key(&item.service);
        if let Err(e) = self.store.set(&key, self.clock.now()) {
            warn!("no se pudo persistir la sesión {key}: {e}");
        }
        self.items[index].session_id = session_id;
        self.transition(index, VerificationStatus::Verified);
        Ok(self.next_pending())
    }

    /// Devuelve el ítem a `Failed` y borra su sesión persistida.
    pub fn abort(&mut self, index: usize) -> Result<(), QueueError> {
        let item = self.items.get(index).ok_or(QueueError::OutOfRange(index))?;
        let key = credential_key(&item.service);
        if let Err(e) = self.store.remove(&key) {
            warn!("no se pudo borrar la sesión {key}: {e}");
        }
        self.items[index].session_id = None;
        self.transition(index, VerificationStatus::Failed);
        Ok(())
    }

    /// Recalcula expiraciones. Sólo afecta a ítems `Verified` que exigen
    /// credencial; devuelve los índices que pasaron a `Expired`.
    pub fn tick(&mut self) -> Vec<usize> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for index in 0..self.items.len() {
            let item = &self.items[index];
            if item.status != VerificationStatus::Verified || !item.requires_credential {
                continue;
            }
            let fresh = match self.store.get(&credential_key(&item.service)) {
                Some(verified_at) => now.signed_duration_since(verified_at) <= self.ttl,
                None => false,
            };
            if !fresh {
                self.items[index].session_id = None;
                self.transition(index, VerificationStatus::Expired);
                expired.push(index);
            }
        }
        expired
    }

    fn transition(&mut self, index: usize, status: VerificationStatus) {
        let item = &mut self.items[index];
        item.status = status;
        let _ = self.updates.send(CredentialUpdate { index,
                                                     service: item.service.clone(),
                                                     status });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::clock::ManualClock;
    use crate::credential::store::InMemorySessionStore;
    use chrono::Utc;

    fn queue_with(flags: &[bool]) -> (CredentialQueue, ManualClock, Arc<InMemorySessionStore>) {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemorySessionStore::new());
        let mut q = CredentialQueue::new(store.clone(), Arc::new(clock.clone()), Duration::from_secs(300));
        let items = flags.iter()
                         .enumerate()
                         .map(|(i, required)| {
                             VerificationItem::from_selection(&AssetSelection::dataset(&format!("did:{i}"), "svc", "ds").with_credential(*required))
                         })
                         .collect();
        q.init_queue(items);
        (q, clock, store)
    }

    #[test]
    fn items_without_credential_start_verified() {
        let (q, _, _) = queue_with(&[false, true]);
        assert_eq!(q.items()[0].status, VerificationStatus::Verified);
        assert_eq!(q.items()[1].status, VerificationStatus::Unverified);
    }

    #[test]
    fn second_start_is_rejected_while_checking() {
        let (mut q, _, _) = queue_with(&[true, true]);
        assert_eq!(q.start_verification(0), Ok(0));
        assert_eq!(q.start_verification(1), Err(QueueError::Busy(0)));
    }

    #[test]
    fn start_redirects_to_first_failed_item() {
        let (mut q, _, _) = queue_with(&[true, true, true]);
        q.start_verification(1).unwrap();
        q.abort(1).unwrap();
        assert_eq!(q.start_verification(2), Ok(1));
    }

    #[test]
    fn expired_item_comes_before_lower_unverified_after_complete() {
        let (mut q, clock, _) = queue_with(&[true, true, true]);
        q.start_verification(2).unwrap();
        assert_eq!(q.complete(2, Some("sess-2".into())).unwrap(), Some(0));
        clock.advance(ChronoDuration::seconds(200));
        q.start_verification(1).unwrap();
        clock.advance(ChronoDuration::seconds(200));
        assert_eq!(q.tick(), vec![2]);
        // el 0 sigue sin verificar pero el 2 expirado tiene prioridad
        assert_eq!(q.items()[0].status, VerificationStatus::Unverified);
        assert_eq!(q.complete(1, None).unwrap(), Some(2));
    }

    #[test]
    fn complete_persists_timestamp_and_returns_next() {
        let (mut q, _, store) = queue_with(&[true, true]);
        q.start_verification(0).unwrap();
        let next = q.complete(0, Some("sess-0".into())).unwrap();
        assert_eq!(next, Some(1));
        assert!(store.get("credential_did:0_svc").is_some());
        assert_eq!(q.session_id(&ServiceRef::new("did:0", "svc")), Some("sess-0"));
    }

    #[test]
    fn tick_expires_only_credentialed_items() {
        let (mut q, clock, _) = queue_with(&[false, true]);
        q.start_verification(1).unwrap();
        q.complete(1, None).unwrap();
        clock.advance(ChronoDuration::seconds(299));
        assert!(q.tick().is_empty());
        clock.advance(ChronoDuration::seconds(2));
        assert_eq!(q.tick(), vec![1]);
        assert_eq!(q.items()[0].status, VerificationStatus::Verified);
        assert_eq!(q.items()[1].status, VerificationStatus::Expired);
    }

    #[test]
    fn updates_are_broadcast() {
        let (mut q, _, _) = queue_with(&[true]);
        let mut rx = q.subscribe();
        q.start_verification(0).unwrap();
        let update = rx.try_recv().unwrap();
        assert_eq!(update.status, VerificationStatus::Checking);
    }
}
