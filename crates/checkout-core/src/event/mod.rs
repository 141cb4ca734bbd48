//! Eventos del checkout y trait EventStore.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{CheckoutEvent, CheckoutEventKind};
