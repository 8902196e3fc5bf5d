pub mod outcome;
pub mod request;

pub use outcome::{FailureReason, RerankOutcome};
pub use request::{is_truthy, Candidate, Context, RerankRequest};

pub mod telemetry;
