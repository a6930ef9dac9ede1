use async_trait::async_trait;
use relay_core::{Conversation, Membership, TransactionState};
use relay_saga::{SagaStep, StepOutcome, error_chain};
use relay_store::{CreateOutcome, SharedStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Transaction type of the direct conversation saga.
pub const DIRECT_CHANNEL: &str = "DirectChannel";

const NEW: &str = TransactionState::NEW;
const MEMBER1: &str = "member1";
const MEMBER2: &str = "member2";
const DONE: &str = TransactionState::DONE;

/// Model of a `DirectChannel` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectChannelPayload {
    #[serde(rename = "Channel")]
    pub conversation: Conversation,
    pub members: [Membership; 2],
}

/// Creates a direct conversation and both of its memberships.
///
/// `new` creates the conversation, `member1` and `member2` create one
/// membership each. A row that already exists from an earlier attempt at the
/// same transaction counts as written, so every state can be re-run.
pub struct DirectChannelSaga;

#[async_trait]
impl SagaStep for DirectChannelSaga {
    type Payload = DirectChannelPayload;
    type Context = SharedStore;
    type Error = StoreError;

    fn kind(&self) -> &'static str {
        DIRECT_CHANNEL
    }

    fn states(&self) -> &'static [&'static str] {
        &[NEW, MEMBER1, MEMBER2, DONE]
    }

    async fn step(
        &self,
        store: &SharedStore,
        state: &TransactionState,
        payload: &DirectChannelPayload,
    ) -> Result<StepOutcome, StoreError> {
        match state.as_str() {
            NEW => create_conversation(store, &payload.conversation).await,
            MEMBER1 => add_member(store, &payload.members[0], MEMBER2).await,
            MEMBER2 => add_member(store, &payload.members[1], DONE).await,
            other => Ok(StepOutcome::Fail(format!("no step for state '{other}'"))),
        }
    }
}

async fn create_conversation(
    store: &SharedStore,
    conversation: &Conversation,
) -> Result<StepOutcome, StoreError> {
    match store.conversations().create_if_absent(conversation).await {
        Ok(CreateOutcome::Created) => Ok(StepOutcome::advance(MEMBER1)),
        Ok(CreateOutcome::AlreadyExists { existing_id }) if existing_id == conversation.id => {
            debug!(conversation = %existing_id, "conversation written by an earlier attempt");
            Ok(StepOutcome::advance(MEMBER1))
        }
        Ok(CreateOutcome::AlreadyExists { existing_id }) => Ok(StepOutcome::Fail(format!(
            "conversation already exists: '{}' is '{existing_id}'",
            conversation.name
        ))),
        Err(err) => classify(err),
    }
}

async fn add_member(
    store: &SharedStore,
    membership: &Membership,
    next: &str,
) -> Result<StepOutcome, StoreError> {
    match store.memberships().create_member(membership).await {
        Ok(CreateOutcome::Created | CreateOutcome::AlreadyExists { .. }) => {
            Ok(StepOutcome::advance(next))
        }
        Err(err) => classify(err),
    }
}

fn classify(err: StoreError) -> Result<StepOutcome, StoreError> {
    if err.is_transient() {
        return Err(err);
    }
    Ok(StepOutcome::Fail(error_chain(&err)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_uses_column_names() {
        let mut conversation = Conversation::direct("bob", "alice");
        conversation.id = "c".repeat(32);
        let payload = DirectChannelPayload {
            members: [
                Membership::new(&conversation.id, "alice"),
                Membership::new(&conversation.id, "bob"),
            ],
            conversation,
        };

        let value = serde_json::to_value(&payload).expect("serializes");

        assert_eq!(value["Channel"]["Name"], json!("alice__bob"));
        assert_eq!(value["Members"][1]["UserId"], json!("bob"));
    }

    #[test]
    fn payload_requires_two_members() {
        let value = json!({
            "Channel": { "Type": "D", "Name": "alice__bob" },
            "Members": [{ "UserId": "alice" }],
        });

        assert!(serde_json::from_value::<DirectChannelPayload>(value).is_err());
    }

    #[test]
    fn states_run_through_both_members() {
        assert_eq!(
            DirectChannelSaga.states(),
            &["new", "member1", "member2", "done"]
        );
    }
}
