use async_trait::async_trait;
use relay_core::TransactionState;
use serde::de::DeserializeOwned;

/// What a step decided after running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's write is durable; move to this state.
    Advance(TransactionState),
    /// The saga cannot complete; record the reason and stop.
    Fail(String),
}

impl StepOutcome {
    #[must_use]
    pub fn advance(state: &str) -> Self {
        Self::Advance(TransactionState::named(state))
    }
}

/// One saga type: its state sequence and the write performed in each state.
///
/// # Type Parameters
///
/// - `Payload`: Working data decoded from the transaction's model
/// - `Context`: Shared dependencies (injected, not stored in the transaction)
/// - `Error`: Failures worth retrying later
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Decoded form of the transaction's model.
    type Payload: DeserializeOwned + Send + Sync;

    /// Shared context providing dependencies.
    type Context: Send + Sync;

    /// Transient failure type. Retrying the same state must be able to
    /// succeed; anything else is reported as [`StepOutcome::Fail`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Transaction type this saga handles.
    fn kind(&self) -> &'static str;

    /// Every state in order, starting with `new` and ending with `done`.
    fn states(&self) -> &'static [&'static str];

    /// Perform the write belonging to `state` and name the next state.
    ///
    /// Never called with `done`.
    ///
    /// # Errors
    ///
    /// Returns an error if the step hit a transient failure and should be
    /// retried from the same state.
    async fn step(
        &self,
        ctx: &Self::Context,
        state: &TransactionState,
        payload: &Self::Payload,
    ) -> Result<StepOutcome, Self::Error>;
}
