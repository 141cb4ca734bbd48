use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::{CheckoutEvent, CheckoutEventKind};
use crate::errors::CheckoutError;

/// Almacenamiento de eventos append-only.
pub trait EventStore {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, checkout_id: Uuid, kind: CheckoutEventKind) -> Result<CheckoutEvent, CheckoutError>;
    /// Eventos de un checkout en orden ascendente de seq.
    fn list(&self, checkout_id: Uuid) -> Result<Vec<CheckoutEvent>, CheckoutError>;
    /// Checkouts con al menos un evento, en orden de primera aparición.
    fn checkouts(&self) -> Result<Vec<Uuid>, CheckoutError>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: HashMap<Uuid, Vec<CheckoutEvent>>,
    order: Vec<Uuid>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, checkout_id: Uuid, kind: CheckoutEventKind) -> Result<CheckoutEvent, CheckoutError> {
        let events = self.inner.entry(checkout_id).or_default();
        if events.is_empty() {
            self.order.push(checkout_id);
        }
        let ev = CheckoutEvent { seq: events.len() as u64,
                                 checkout_id,
                                 kind,
                                 ts: Utc::now() };
        events.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, checkout_id: Uuid) -> Result<Vec<CheckoutEvent>, CheckoutError> {
        Ok(self.inner.get(&checkout_id).cloned().unwrap_or_default())
    }

    fn checkouts(&self) -> Result<Vec<Uuid>, CheckoutError> {
        Ok(self.order.clone())
    }
}
