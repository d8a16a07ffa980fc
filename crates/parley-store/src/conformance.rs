//! Behavioural suite every [`MessageStore`] backend must pass.

use std::future::Future;

use chrono::{Duration, Utc};
use parley_shared::{ContentType, MessageId, NewMessage, Role, UserId, ValidationError};
use serde_json::json;

use crate::error::StoreError;
use crate::store::MessageStore;

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);

/// Run every check against a fresh store from `make`.
pub async fn run_all<F, Fut, S>(make: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
    S: MessageStore,
{
    create_sets_defaults(&make().await).await;
    edits_archive_prior_content(&make().await).await;
    rejected_edit_changes_nothing(&make().await).await;
    missing_ids_are_not_found(&make().await).await;
    soft_delete_is_idempotent_and_hides(&make().await).await;
    deleted_messages_reject_changes(&make().await).await;
    pairs_are_all_or_nothing(&make().await).await;
    reactions_are_idempotent(&make().await).await;
    favorites_toggle(&make().await).await;
    queries_are_scoped_and_ordered(&make().await).await;
    invalid_queries_are_rejected(&make().await).await;
}

async fn create_sets_defaults(store: &dyn MessageStore) {
    let mut metadata = serde_json::Map::new();
    metadata.insert("source".into(), json!("web"));

    let msg = store
        .create(
            NewMessage::new(ALICE, Role::User, "hi")
                .with_content_type(ContentType::Code)
                .with_tags(["greeting"])
                .with_metadata(metadata.clone()),
        )
        .await
        .unwrap();

    assert_eq!(msg.id, MessageId(1));
    assert_eq!(msg.user_id, ALICE);
    assert_eq!(msg.content, "hi");
    assert_eq!(msg.content_type, ContentType::Code);
    assert_eq!(msg.metadata, metadata);
    assert!(!msg.edited && !msg.deleted && !msg.favorite);
    assert_eq!(msg.reactions.count(), 0);
    assert!(msg.edit_history.is_empty());

    assert_eq!(store.get(msg.id).await.unwrap(), msg);

    let next = store
        .create(NewMessage::new(BOB, Role::Assistant, "hello"))
        .await
        .unwrap();
    assert!(next.id > msg.id);

    let err = store
        .create(NewMessage::new(ALICE, Role::User, " \n "))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(ValidationError::EmptyContent)));
}

async fn edits_archive_prior_content(store: &dyn MessageStore) {
    let msg = store
        .create(NewMessage::new(ALICE, Role::User, "hi"))
        .await
        .unwrap();

    let first = store.edit(msg.id, "hello".into()).await.unwrap();
    assert_eq!(first.content, "hello");
    assert!(first.edited);
    assert_eq!(first.edit_history.len(), 1);
    assert_eq!(first.edit_history[0].content, "hi");
    assert!(first.edit_history[0].timestamp >= msg.timestamp);

    let contents = ["c2", "c3", "c4"];
    let mut last = first;
    for c in contents {
        last = store.edit(msg.id, c.to_string()).await.unwrap();
    }

    let history: Vec<&str> = last.edit_history.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(history, vec!["hi", "hello", "c2", "c3"]);
    assert_eq!(last.content, "c4");
    assert_eq!(last.timestamp, msg.timestamp);
    assert_eq!(last.user_id, msg.user_id);
}

async fn rejected_edit_changes_nothing(store: &dyn MessageStore) {
    let msg = store
        .create(NewMessage::new(ALICE, Role::User, "hi"))
        .await
        .unwrap();

    let err = store.edit(msg.id, "".into()).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(store.get(msg.id).await.unwrap(), msg);
}

async fn missing_ids_are_not_found(store: &dyn MessageStore) {
    let ghost = MessageId(999);
    assert!(matches!(store.get(ghost).await, Err(StoreError::NotFound(id)) if id == ghost));
    assert!(matches!(store.edit(ghost, "x".into()).await, Err(StoreError::NotFound(_))));
    assert!(matches!(store.soft_delete(ghost).await, Err(StoreError::NotFound(_))));
    assert!(matches!(store.toggle_favorite(ghost).await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        store.add_reaction(ghost, ALICE, "+1").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.remove_reaction(ghost, ALICE, "+1").await,
        Err(StoreError::NotFound(_))
    ));
}

async fn soft_delete_is_idempotent_and_hides(store: &dyn MessageStore) {
    let msg = store
        .create(NewMessage::new(ALICE, Role::User, "secret plan").with_tags(["plan"]))
        .await
        .unwrap();
    store.toggle_favorite(msg.id).await.unwrap();

    assert!(store.soft_delete(msg.id).await.unwrap().deleted);
    assert!(store.soft_delete(msg.id).await.unwrap().deleted);

    // Still stored.
    assert!(store.get(msg.id).await.unwrap().deleted);

    let now = Utc::now();
    assert!(store.list_for_user(ALICE).await.unwrap().is_empty());
    assert!(store.search(ALICE, "secret").await.unwrap().is_empty());
    assert!(store
        .by_date_range(ALICE, now - Duration::hours(1), now + Duration::hours(1))
        .await
        .unwrap()
        .is_empty());
    assert!(store.by_tags(ALICE, &["plan".into()]).await.unwrap().is_empty());
    assert!(store.favorites_of(ALICE).await.unwrap().is_empty());
}

async fn deleted_messages_reject_changes(store: &dyn MessageStore) {
    let msg = store
        .create(NewMessage::new(ALICE, Role::User, "gone soon"))
        .await
        .unwrap();
    store.add_reaction(msg.id, BOB, "👍").await.unwrap();
    let deleted = store.soft_delete(msg.id).await.unwrap();

    let not_found =
        |r: Result<_, StoreError>| matches!(r, Err(StoreError::NotFound(id)) if id == msg.id);
    assert!(not_found(store.edit(msg.id, "zombie".into()).await));
    assert!(not_found(store.toggle_favorite(msg.id).await));
    assert!(not_found(store.add_reaction(msg.id, ALICE, "👍").await));
    assert!(not_found(store.remove_reaction(msg.id, BOB, "👍").await));

    assert_eq!(store.get(msg.id).await.unwrap(), deleted);
}

async fn pairs_are_all_or_nothing(store: &dyn MessageStore) {
    let (question, answer) = store
        .create_pair(
            NewMessage::new(ALICE, Role::User, "question"),
            NewMessage::new(ALICE, Role::Assistant, "answer"),
        )
        .await
        .unwrap();
    assert!(question.id < answer.id);
    assert_eq!(question.timestamp, answer.timestamp);

    let err = store
        .create_pair(
            NewMessage::new(ALICE, Role::User, "orphan?"),
            NewMessage::new(ALICE, Role::Assistant, "   "),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(ValidationError::EmptyContent)));

    let history = store.list_for_user(ALICE).await.unwrap();
    assert_eq!(
        history.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![question.id, answer.id]
    );
}

async fn reactions_are_idempotent(store: &dyn MessageStore) {
    let msg = store
        .create(NewMessage::new(ALICE, Role::Assistant, "answer"))
        .await
        .unwrap();

    store.add_reaction(msg.id, ALICE, "👍").await.unwrap();
    let again = store.add_reaction(msg.id, ALICE, "👍").await.unwrap();
    assert_eq!(again.reactions.count(), 1);
    assert_eq!(again.reactions.users().iter().filter(|u| **u == ALICE).count(), 1);

    let both = store.add_reaction(msg.id, BOB, "🎉").await.unwrap();
    assert_eq!(both.reactions.count(), 2);

    let ghost = store.remove_reaction(msg.id, UserId(77), "👍").await.unwrap();
    assert_eq!(ghost.reactions.count(), 2);

    store.remove_reaction(msg.id, ALICE, "👍").await.unwrap();
    store.remove_reaction(msg.id, BOB, "🎉").await.unwrap();
    let empty = store.remove_reaction(msg.id, BOB, "🎉").await.unwrap();
    assert_eq!(empty.reactions.count(), 0);
    assert!(empty.reactions.users().is_empty());

    assert!(matches!(
        store.add_reaction(msg.id, ALICE, "  ").await,
        Err(StoreError::Validation(_))
    ));
}

async fn favorites_toggle(store: &dyn MessageStore) {
    let a = store
        .create(NewMessage::new(ALICE, Role::User, "first"))
        .await
        .unwrap();
    let b = store
        .create(NewMessage::new(ALICE, Role::User, "second"))
        .await
        .unwrap();

    assert!(store.toggle_favorite(a.id).await.unwrap().favorite);
    assert!(store.toggle_favorite(b.id).await.unwrap().favorite);
    assert!(!store.toggle_favorite(a.id).await.unwrap().favorite);

    let favorites = store.favorites_of(ALICE).await.unwrap();
    assert_eq!(favorites.iter().map(|m| m.id).collect::<Vec<_>>(), vec![b.id]);
}

async fn queries_are_scoped_and_ordered(store: &dyn MessageStore) {
    let mut alice_ids = Vec::new();
    for text in ["Rust is fun", "tokio runtime", "more RUST"] {
        let msg = store
            .create(NewMessage::new(ALICE, Role::User, text).with_tags(["lang"]))
            .await
            .unwrap();
        alice_ids.push(msg.id);
    }
    store
        .create(NewMessage::new(BOB, Role::User, "rust from bob").with_tags(["lang"]))
        .await
        .unwrap();

    let history = store.list_for_user(ALICE).await.unwrap();
    assert_eq!(history.iter().map(|m| m.id).collect::<Vec<_>>(), alice_ids);
    assert!(history.iter().all(|m| m.user_id == ALICE));

    let hits = store.search(ALICE, "rust").await.unwrap();
    assert_eq!(
        hits.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![alice_ids[2], alice_ids[0]]
    );

    let tagged = store.by_tags(ALICE, &["lang".into(), "other".into()]).await.unwrap();
    assert_eq!(tagged.len(), 3);
    assert_eq!(tagged[0].id, alice_ids[2]);

    let first = &history[0];
    let ranged = store
        .by_date_range(ALICE, first.timestamp, first.timestamp)
        .await
        .unwrap();
    assert_eq!(ranged.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first.id]);

    assert!(store.list_for_user(UserId(404)).await.unwrap().is_empty());
}

async fn invalid_queries_are_rejected(store: &dyn MessageStore) {
    assert!(matches!(
        store.search(ALICE, "   ").await,
        Err(StoreError::Validation(ValidationError::EmptyQuery))
    ));
    assert!(matches!(
        store.by_tags(ALICE, &[]).await,
        Err(StoreError::Validation(ValidationError::NoTags))
    ));
    let now = Utc::now();
    assert!(matches!(
        store.by_date_range(ALICE, now, now - Duration::days(1)).await,
        Err(StoreError::Validation(ValidationError::InvertedRange))
    ));
}
