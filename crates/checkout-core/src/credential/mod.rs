//! Verificación de credenciales SSI por servicio.

pub mod clock;
pub mod driver;
pub mod queue;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{spawn_expiry_ticker, DriverReport, SharedQueue, VerificationDriver};
pub use queue::{items_for, CredentialQueue, CredentialUpdate, QueueError, VerificationItem, VerificationStatus};
pub use store::{credential_key, InMemorySessionStore, SessionStore, SessionStoreError};
