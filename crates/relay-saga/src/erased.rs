use async_trait::async_trait;
use relay_core::TransactionState;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SagaError;
use crate::step::{SagaStep, StepOutcome};

/// A saga step with its payload type hidden behind the transaction model.
#[async_trait]
pub(crate) trait ErasedStep<Ctx>: Send + Sync {
    fn kind(&self) -> &'static str;

    fn states(&self) -> &'static [&'static str];

    async fn step_erased(
        &self,
        ctx: &Ctx,
        state: &TransactionState,
        model: &Value,
    ) -> Result<StepOutcome, SagaError>;
}

pub(crate) struct StepWrapper<S> {
    step: S,
}

impl<S> StepWrapper<S> {
    pub(crate) fn new(step: S) -> Self {
        Self { step }
    }
}

#[async_trait]
impl<S> ErasedStep<S::Context> for StepWrapper<S>
where
    S: SagaStep,
{
    fn kind(&self) -> &'static str {
        self.step.kind()
    }

    fn states(&self) -> &'static [&'static str] {
        self.step.states()
    }

    async fn step_erased(
        &self,
        ctx: &S::Context,
        state: &TransactionState,
        model: &Value,
    ) -> Result<StepOutcome, SagaError> {
        let kind = self.step.kind();
        let payload = <S::Payload as Deserialize>::deserialize(model)
            .map_err(|source| SagaError::Decode { kind, source })?;
        self.step
            .step(ctx, state, &payload)
            .await
            .map_err(|source| SagaError::Step {
                kind,
                state: state.to_string(),
                source: Box::new(source),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct TestContext {
        fail: bool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("transient")]
    struct TestError;

    #[derive(Deserialize)]
    struct Payload {
        next: String,
    }

    struct EchoStep;

    #[async_trait]
    impl SagaStep for EchoStep {
        type Payload = Payload;
        type Context = TestContext;
        type Error = TestError;

        fn kind(&self) -> &'static str {
            "Echo"
        }

        fn states(&self) -> &'static [&'static str] {
            &["new", "done"]
        }

        async fn step(
            &self,
            ctx: &Self::Context,
            _state: &TransactionState,
            payload: &Self::Payload,
        ) -> Result<StepOutcome, Self::Error> {
            if ctx.fail {
                return Err(TestError);
            }
            Ok(StepOutcome::advance(&payload.next))
        }
    }

    #[test]
    fn wrapper_delegates_kind_and_states() {
        let wrapper = StepWrapper::new(EchoStep);

        assert_eq!(wrapper.kind(), "Echo");
        assert_eq!(wrapper.states(), &["new", "done"]);
    }

    #[tokio::test]
    async fn wrapper_decodes_payload() -> anyhow::Result<()> {
        let wrapper = StepWrapper::new(EchoStep);
        let ctx = TestContext { fail: false };

        let outcome = wrapper
            .step_erased(&ctx, &TransactionState::initial(), &json!({"next": "done"}))
            .await?;

        assert_eq!(outcome, StepOutcome::advance("done"));
        Ok(())
    }

    #[tokio::test]
    async fn wrapper_reports_decode_errors() {
        let wrapper = StepWrapper::new(EchoStep);
        let ctx = TestContext { fail: false };

        let err = wrapper
            .step_erased(&ctx, &TransactionState::initial(), &json!({"other": 1}))
            .await
            .expect_err("payload has no 'next'");

        assert!(matches!(err, SagaError::Decode { kind: "Echo", .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn wrapper_wraps_step_errors() {
        let wrapper = StepWrapper::new(EchoStep);
        let ctx = TestContext { fail: true };

        let err = wrapper
            .step_erased(&ctx, &TransactionState::initial(), &json!({"next": "done"}))
            .await
            .expect_err("context forces failure");

        assert!(matches!(err, SagaError::Step { ref state, .. } if state == "new"));
        assert!(err.is_transient());
    }
}
