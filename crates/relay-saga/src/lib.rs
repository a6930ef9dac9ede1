//! Resumable sagas for operations that span several documents.
//!
//! A saga's progress lives in a persisted [`relay_core::Transaction`]. Each
//! call to [`SagaExecutor::advance`] performs exactly one step: it decodes the
//! transaction's model for its registered type, runs the step for the current
//! state, and moves the transaction forward or records a terminal failure.
//! Because the state only changes after the step's write succeeds, any step
//! may be re-run after a crash.

mod audit;
mod erased;
mod error;
mod executor;
mod step;

pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use error::{SagaError, error_chain};
pub use executor::{SagaExecutor, Transition};
pub use step::{SagaStep, StepOutcome};
