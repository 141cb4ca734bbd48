//! Engine del checkout: pipeline, builder y tipos de request.

pub mod builder;
pub mod core;
pub mod request;

pub use builder::EngineBuilder;
pub use core::CheckoutEngine;
pub use request::{CheckoutPorts, CheckoutRequest, JobSubmission, QuoteResolution};
