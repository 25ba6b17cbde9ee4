pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notifications;
pub mod pricing;
pub mod sanitize;
pub mod signature;

pub use domain::catalog::{
    BillingCadence, CatalogListing, ComplexityLevel, ComplexityLevelId, DesignOption,
    DesignOptionId, OptionId, ProjectType, ProjectTypeId, SupplementaryOption,
};
pub use domain::quote::{
    ClientDetails, OptionSelection, Quote, QuoteConfiguration, QuoteId, QuoteNumber, QuoteStatus,
    SignatureToken,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{
    LifecycleAction, LifecycleEngine, LifecycleError, QuoteEvent, TransitionContext,
    TransitionOutcome,
};
pub use notifications::EmailEvent;
pub use pricing::{Discount, DiscountKind, InstallmentPlan, PriceBreakdown, PricingTrace};
pub use signature::SignaturePayload;
