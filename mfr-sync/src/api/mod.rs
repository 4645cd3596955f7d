//! Registry and destination API clients
//!
//! Both sides sit behind a trait ([`SourceRegistry`], [`OrgUnitStore`]) and
//! share the retry and monitoring settings in [`resilience`].

pub mod destination;
pub mod registry;
pub mod resilience;

pub use destination::{Dhis2Client, OrgUnit, OrgUnitStore};
pub use registry::{RegistryClient, SourceRegistry};
pub use resilience::{ResilienceConfig, RetryConfig, RetryPolicy};
