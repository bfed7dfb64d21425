//! Resource lifecycle interface for weave providers
//!
//! Every provider crate in this workspace exposes resources behind the same
//! contract: a typed `Config` goes in, a lifecycle hook runs one or a few
//! outbound API calls, and a typed `Outputs` comes back. The reactive runtime
//! that dispatches lifecycle calls, resolves `$ref` placeholders, and wires
//! dependencies between resources lives outside this repository; this crate
//! only defines the seam it calls through.

mod dependency;
mod error;
mod field;
mod health;
mod resource;

pub use dependency::{Dependency, Resolved};
pub use error::{ResourceError, ResourceResult};
pub use field::{FieldRef, FieldValue};
pub use health::{Health, HealthStatus, LogEntry, LogLevel};
pub use resource::Resource;
