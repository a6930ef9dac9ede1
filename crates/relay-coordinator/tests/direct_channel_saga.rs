//! The `DirectChannel` saga, one step at a time against the in-memory store.

use std::sync::Arc;

use relay_core::{Conversation, Membership, Transaction, TransactionState};
use relay_coordinator::{DIRECT_CHANNEL, DirectChannelPayload, default_executor};
use relay_store::{CreateOutcome, MemoryStore, SharedStore};

fn stores() -> (Arc<MemoryStore>, SharedStore) {
    let memory = Arc::new(MemoryStore::new());
    let shared: SharedStore = memory.clone();
    (memory, shared)
}

fn direct_payload(a: &str, b: &str) -> DirectChannelPayload {
    let mut conversation = Conversation::direct(a, b);
    conversation.pre_save();
    DirectChannelPayload {
        members: [
            Membership::new(&conversation.id, a),
            Membership::new(&conversation.id, b),
        ],
        conversation,
    }
}

fn transaction(payload: &DirectChannelPayload) -> anyhow::Result<Transaction> {
    let mut tx = Transaction::with_payload(DIRECT_CHANNEL, payload)?;
    tx.pre_save();
    Ok(tx)
}

#[tokio::test]
async fn completed_saga_writes_conversation_and_both_members() -> anyhow::Result<()> {
    let (memory, store) = stores();
    let executor = default_executor()?;
    let payload = direct_payload("alice", "bob");
    let mut tx = transaction(&payload)?;

    let mut visited = vec![tx.state.to_string()];
    while !tx.is_done() {
        let transition = executor.advance(&store, &mut tx).await?;
        visited.push(transition.to.to_string());
    }

    assert_eq!(visited, ["new", "member1", "member2", "done"]);
    assert!(tx.error().is_none());
    assert_eq!(memory.conversation_count(), 1);
    assert_eq!(memory.membership_count(), 2);
    let members = store
        .memberships()
        .members_of(&payload.conversation.id)
        .await?;
    assert_eq!(members.len(), 2);
    Ok(())
}

#[tokio::test]
async fn existing_conversation_with_other_id_fails_the_saga() -> anyhow::Result<()> {
    let (memory, store) = stores();
    let executor = default_executor()?;
    let mut earlier = Conversation::direct("alice", "bob");
    earlier.pre_save();
    store.conversations().create_if_absent(&earlier).await?;
    let mut tx = transaction(&direct_payload("bob", "alice"))?;

    let transition = executor.advance(&store, &mut tx).await?;

    assert!(tx.is_done());
    let reason = transition.error.expect("conflict is recorded");
    assert!(reason.contains("already exists"), "{reason}");
    assert!(reason.contains(&earlier.id));
    assert_eq!(memory.membership_count(), 0);
    Ok(())
}

#[tokio::test]
async fn rerun_of_new_after_its_write_continues() -> anyhow::Result<()> {
    let (_memory, store) = stores();
    let executor = default_executor()?;
    let payload = direct_payload("alice", "bob");
    let outcome = store
        .conversations()
        .create_if_absent(&payload.conversation)
        .await?;
    assert_eq!(outcome, CreateOutcome::Created);
    let mut tx = transaction(&payload)?;

    executor.advance(&store, &mut tx).await?;

    assert_eq!(tx.state.as_str(), "member1");
    assert!(tx.error().is_none());
    Ok(())
}

#[tokio::test]
async fn resume_at_member2_writes_only_the_second_membership() -> anyhow::Result<()> {
    let (memory, store) = stores();
    let executor = default_executor()?;
    let payload = direct_payload("alice", "bob");
    let mut tx = transaction(&payload)?;
    tx.state = TransactionState::named("member2");

    executor.advance(&store, &mut tx).await?;

    assert!(tx.is_done());
    assert_eq!(memory.conversation_write_attempts(), 0);
    assert_eq!(memory.membership_write_attempts(), 1);
    let members = store
        .memberships()
        .members_of(&payload.conversation.id)
        .await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, "bob");
    Ok(())
}

#[tokio::test]
async fn existing_membership_counts_as_written() -> anyhow::Result<()> {
    let (memory, store) = stores();
    let executor = default_executor()?;
    let payload = direct_payload("alice", "bob");
    store.memberships().create_member(&payload.members[0]).await?;
    let mut tx = transaction(&payload)?;
    tx.state = TransactionState::named("member1");

    executor.advance(&store, &mut tx).await?;

    assert_eq!(tx.state.as_str(), "member2");
    assert_eq!(memory.membership_count(), 1);
    Ok(())
}

#[tokio::test]
async fn unavailable_store_leaves_state_for_retry() -> anyhow::Result<()> {
    let (memory, store) = stores();
    let executor = default_executor()?;
    let mut tx = transaction(&direct_payload("alice", "bob"))?;
    tx.state = TransactionState::named("member1");
    memory.fail_next_membership_writes(1);

    let err = executor
        .advance(&store, &mut tx)
        .await
        .expect_err("store is unavailable");

    assert!(err.is_transient());
    assert_eq!(tx.state.as_str(), "member1");
    assert!(tx.error().is_none());

    executor.advance(&store, &mut tx).await?;
    assert_eq!(tx.state.as_str(), "member2");
    Ok(())
}

#[tokio::test]
async fn invalid_membership_is_recorded_not_retried() -> anyhow::Result<()> {
    let (memory, store) = stores();
    let executor = default_executor()?;
    let mut payload = direct_payload("alice", "bob");
    payload.members[1].user_id.clear();
    let mut tx = transaction(&payload)?;
    tx.state = TransactionState::named("member2");

    executor.advance(&store, &mut tx).await?;

    assert!(tx.is_done());
    assert!(tx.error_str.contains("user id must not be empty"), "{}", tx.error_str);
    assert_eq!(memory.membership_count(), 0);
    Ok(())
}
