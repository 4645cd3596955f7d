// Business logic services layer
//
// Services shared by the reconciler and the facility sync engine.

pub mod resolver;

pub use resolver::{DestinationResolver, ResolverStats};
