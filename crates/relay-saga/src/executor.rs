use std::collections::HashMap;

use relay_core::{Transaction, TransactionState};

use crate::erased::{ErasedStep, StepWrapper};
use crate::error::{SagaError, error_chain};
use crate::step::{SagaStep, StepOutcome};

/// The effect of one [`SagaExecutor::advance`] call on a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: TransactionState,
    pub to: TransactionState,
    /// Set when the step recorded a terminal failure.
    pub error: Option<String>,
}

/// Registry of saga types, keyed by transaction type.
///
/// Adding a saga means registering another [`SagaStep`]; the executor and
/// the loops driving it never branch on the type themselves.
pub struct SagaExecutor<Ctx> {
    steps: HashMap<&'static str, Box<dyn ErasedStep<Ctx>>>,
}

impl<Ctx> Default for SagaExecutor<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> SagaExecutor<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register a saga type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is already registered or its state
    /// sequence does not run from `new` to `done` without repeats.
    pub fn register<S>(&mut self, step: S) -> Result<(), SagaError>
    where
        S: SagaStep<Context = Ctx> + 'static,
    {
        let kind = step.kind();
        validate_states(kind, step.states())?;
        if self.steps.contains_key(kind) {
            return Err(SagaError::DuplicateKind(kind));
        }
        self.steps.insert(kind, Box::new(StepWrapper::new(step)));
        Ok(())
    }

    /// Register a saga type, consuming and returning the executor.
    ///
    /// # Errors
    ///
    /// See [`SagaExecutor::register`].
    pub fn with_step<S>(mut self, step: S) -> Result<Self, SagaError>
    where
        S: SagaStep<Context = Ctx> + 'static,
    {
        self.register(step)?;
        Ok(self)
    }

    #[must_use]
    pub fn handles(&self, kind: &str) -> bool {
        self.steps.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.keys().copied()
    }

    /// Run the step for the transaction's current state and update the
    /// transaction in place.
    ///
    /// On success the transaction has moved one state forward or is `done`
    /// with its error recorded. Payload decode failures and transitions that
    /// do not move forward are recorded the same way.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Step` for transient failures, leaving the
    /// transaction untouched so the same state can be retried.
    /// Returns `SagaError::AlreadyDone` or `SagaError::UnknownKind` if the
    /// transaction should never have been handed to the executor.
    pub async fn advance(
        &self,
        ctx: &Ctx,
        transaction: &mut Transaction,
    ) -> Result<Transition, SagaError> {
        if transaction.is_done() {
            return Err(SagaError::AlreadyDone {
                id: transaction.id.clone(),
            });
        }
        let Some(step) = self.steps.get(transaction.kind.as_str()) else {
            return Err(SagaError::UnknownKind(transaction.kind.clone()));
        };

        let from = transaction.state.clone();
        let states = step.states();
        let Some(current) = position(states, &from) else {
            transaction.fail(format!(
                "saga '{}' has no state '{from}'",
                transaction.kind
            ));
            return Ok(transition(from, transaction));
        };

        let outcome = match step.step_erased(ctx, &from, &transaction.model).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_transient() => return Err(err),
            Err(err) => StepOutcome::Fail(error_chain(&err)),
        };

        match outcome {
            StepOutcome::Advance(next) => match position(states, &next) {
                Some(index) if index > current => transaction.state = next,
                _ => transaction.fail(format!("invalid transition from '{from}' to '{next}'")),
            },
            StepOutcome::Fail(reason) => transaction.fail(reason),
        }
        Ok(transition(from, transaction))
    }
}

fn position(states: &[&str], state: &TransactionState) -> Option<usize> {
    states.iter().position(|name| *name == state.as_str())
}

fn transition(from: TransactionState, transaction: &Transaction) -> Transition {
    Transition {
        from,
        to: transaction.state.clone(),
        error: transaction.error().map(str::to_string),
    }
}

fn validate_states(kind: &'static str, states: &[&str]) -> Result<(), SagaError> {
    let invalid = |reason| SagaError::InvalidDefinition { kind, reason };
    if states.first() != Some(&TransactionState::NEW) {
        return Err(invalid("must start with 'new'"));
    }
    if states.last() != Some(&TransactionState::DONE) || states.len() < 2 {
        return Err(invalid("must end with 'done'"));
    }
    for (index, state) in states.iter().enumerate() {
        if states[..index].contains(state) {
            return Err(invalid("states must be unique"));
        }
    }
    Ok(())
}
