// checkout-domain library entry point
pub mod amount;
pub mod asset;
pub mod environment;
pub mod error;
pub mod pricing;
pub mod resources;
pub use amount::TokenAmount;
pub use asset::{AccessDetails, AssetKind, AssetSelection, ServiceRef};
pub use environment::{ComputeEnvironment, FeeSchedule, FreeTier, ResourceBound, ResourceUnitPrice};
pub use error::DomainError;
pub use pricing::{aggregate, FeeItem, PriceEntry, PriceInput, PriceLine, PriceSummary, PricedItem, SymbolGrouping};
pub use resources::{calculate_price, ResourceConfigurator, ResourceId, ResourceLimits, ResourceSelection, Tier};
