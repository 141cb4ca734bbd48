pub mod types;
pub use types::{CheckoutInstance, CheckoutRepository, InMemoryCheckoutRepository};
