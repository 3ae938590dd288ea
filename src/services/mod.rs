//! Service layer module
//!
//! Contains alias resolution, provider routing, budget tracking, request
//! transformation, response normalization and the streaming relay

pub mod aliases;
pub mod budget;
pub mod normalizer;
pub mod relay;
pub mod router;
pub mod transformer;

pub use aliases::{AliasRegistry, ModelAlias};
pub use budget::{BudgetGuard, Clock, SystemClock};
pub use normalizer::ResponseNormalizer;
pub use relay::{RelayOutcome, StreamRelay};
pub use router::{Credential, ModelRouter, ProviderEndpoint, ProviderRegistry, ProviderTarget, Route};
pub use transformer::RequestTransformer;
