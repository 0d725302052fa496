//! End-to-end behaviour of the messaging core over an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use attachment_uploader::{AttachmentUploader, LocalBlobStorage, UploadConfig};
use chat_core::{
    is_attachment, AttachmentPayload, ChatBackend, ChatError, ConversationEvent, InboxReason,
    MessageContent,
};
use chat_database::models::{Booking, ServiceProvider};
use chat_database::{booking, Database};
use delivery_bus::DeliveryBus;
use futures::StreamExt;
use messaging::{Messenger, MessagingConfig};
use tempfile::TempDir;

const P1: &str = "customer-1";
const P2: &str = "provider-owner-1";
const OUTSIDER: &str = "mallory";

struct Harness {
    messenger: Messenger,
    db: Database,
    _uploads: TempDir,
}

async fn harness() -> Harness {
    let db = Database::in_memory().await.unwrap();

    for (provider, owner) in [("prov-1", P2), ("prov-2", "provider-owner-2")] {
        booking::create_provider(
            db.pool(),
            &ServiceProvider {
                id: provider.to_string(),
                user_id: owner.to_string(),
            },
        )
        .await
        .unwrap();
    }

    for (id, customer, provider, status) in [
        ("C", P1, "prov-1", "accepted"),
        ("C2", "customer-2", "prov-2", "accepted"),
        ("C3", P1, "prov-1", "in_progress"),
        ("DONE", P1, "prov-1", "completed"),
    ] {
        booking::create_booking(
            db.pool(),
            &Booking {
                id: id.to_string(),
                customer_id: customer.to_string(),
                provider_id: provider.to_string(),
                status: status.to_string(),
            },
        )
        .await
        .unwrap();
    }

    let uploads = tempfile::tempdir().unwrap();
    let uploader = AttachmentUploader::new(
        Arc::new(LocalBlobStorage::new(uploads.path())),
        UploadConfig::default().with_public_base_url("https://chat.example.com"),
    );
    let messenger = Messenger::with_sqlite_bookings(
        db.clone(),
        DeliveryBus::default(),
        uploader,
        MessagingConfig::default(),
    );

    Harness {
        messenger,
        db,
        _uploads: uploads,
    }
}

fn text(body: &str) -> MessageContent {
    MessageContent::text(body)
}

async fn assert_counts_consistent(messenger: &Messenger, user: &str, conversations: &[&str]) {
    let counts = messenger.per_conversation_unread_counts(user).await.unwrap();
    let mut total = 0;
    for conversation in conversations {
        let history = match messenger.fetch_history(conversation, user).await {
            Ok(history) => history,
            Err(ChatError::AccessDenied(_)) => continue,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let expected = history.iter().filter(|m| m.is_unread_for(user)).count() as u64;
        assert_eq!(
            counts.get(*conversation).copied().unwrap_or(0),
            expected,
            "unread mismatch for {user} in {conversation}"
        );
        total += expected;
    }
    assert_eq!(messenger.global_unread_count(user).await.unwrap(), total);
}

#[tokio::test]
async fn test_resolve_conversation() {
    let h = harness().await;

    let as_customer = h.messenger.resolve_conversation("C", P1).await.unwrap();
    assert_eq!(as_customer.participant_a, P1);
    assert_eq!(as_customer.participant_b, P2);
    assert_eq!(as_customer.other_participant, P2);
    assert!(as_customer.engaged);

    let as_provider = h.messenger.resolve_conversation("C", P2).await.unwrap();
    assert_eq!(as_provider.other_participant, P1);

    assert!(matches!(
        h.messenger.resolve_conversation("C", OUTSIDER).await,
        Err(ChatError::AccessDenied(_))
    ));
    assert!(matches!(
        h.messenger.resolve_conversation("missing", P1).await,
        Err(ChatError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_scenario_a_unread_round_trip() {
    let h = harness().await;

    h.messenger.append("C", P1, text("Hello")).await.unwrap();

    let counts = h.messenger.per_conversation_unread_counts(P2).await.unwrap();
    assert_eq!(counts.get("C"), Some(&1));
    assert_eq!(h.messenger.global_unread_count(P2).await.unwrap(), 1);
    assert_eq!(h.messenger.global_unread_count(P1).await.unwrap(), 0);

    let flipped = h.messenger.mark_read("C", P2).await.unwrap();
    assert_eq!(flipped.len(), 1);
    assert!(flipped[0].read);

    assert!(h
        .messenger
        .per_conversation_unread_counts(P2)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(h.messenger.global_unread_count(P2).await.unwrap(), 0);
}

#[tokio::test]
async fn test_scenario_b_upload_then_append() {
    let h = harness().await;

    let payload = AttachmentPayload::new(
        "site.jpg",
        Some("image/jpeg".to_string()),
        vec![0xFFu8; 2 * 1024 * 1024],
    );
    let uploaded = h.messenger.upload("C", P1, payload).await.unwrap();
    assert!(is_attachment(&uploaded.url));

    // Uploading alone appends nothing.
    assert!(h.messenger.fetch_history("C", P1).await.unwrap().is_empty());

    let sent = h
        .messenger
        .append("C", P1, uploaded.to_content())
        .await
        .unwrap();
    assert!(sent.content.is_attachment());

    let history = h.messenger.fetch_history("C", P2).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body(), uploaded.url);
    assert!(is_attachment(history[0].body()));
}

#[tokio::test]
async fn test_scenario_c_outsider_cannot_append() {
    let h = harness().await;

    let result = h.messenger.append("C2", P1, text("let me in")).await;
    assert!(matches!(result, Err(ChatError::Forbidden(_))));

    let stored = chat_database::message::list_messages(h.db.pool(), "C2")
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_scenario_e_delete_conversation() {
    let h = harness().await;

    h.messenger.append("C", P2, text("one")).await.unwrap();
    h.messenger.append("C", P2, text("two")).await.unwrap();
    h.messenger.append("C", P1, text("three")).await.unwrap();
    h.messenger.append("C3", P2, text("elsewhere")).await.unwrap();

    assert_eq!(h.messenger.global_unread_count(P1).await.unwrap(), 3);

    let removed = h.messenger.delete_conversation("C", P2).await.unwrap();
    assert_eq!(removed, 3);

    assert!(h.messenger.fetch_history("C", P1).await.unwrap().is_empty());
    assert!(h.messenger.fetch_history("C", P2).await.unwrap().is_empty());

    // Dropped by exactly the two that were unread in C.
    assert_eq!(h.messenger.global_unread_count(P1).await.unwrap(), 1);
    let counts = h.messenger.per_conversation_unread_counts(P1).await.unwrap();
    assert_eq!(counts.get("C"), None);
    assert_eq!(counts.get("C3"), Some(&1));
}

#[tokio::test]
async fn test_history_is_ordered() {
    let h = harness().await;

    for i in 0..20 {
        let sender = if i % 3 == 0 { P2 } else { P1 };
        h.messenger
            .append("C", sender, text(&format!("m{i}")))
            .await
            .unwrap();
    }

    let history = h.messenger.fetch_history("C", P1).await.unwrap();
    assert_eq!(history.len(), 20);
    for pair in history.windows(2) {
        assert!(pair[0].ordering_key() < pair[1].ordering_key());
    }

    let page = h
        .messenger
        .fetch_history_after("C", P1, history[4].id, 5)
        .await
        .unwrap();
    let ids: Vec<_> = page.iter().map(|m| m.id).collect();
    let expected: Vec<_> = history[5..10].iter().map(|m| m.id).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_mark_read_idempotent() {
    let h = harness().await;
    h.messenger.append("C", P1, text("a")).await.unwrap();
    h.messenger.append("C", P1, text("b")).await.unwrap();

    assert_eq!(h.messenger.mark_read("C", P2).await.unwrap().len(), 2);
    let once = h.messenger.fetch_history("C", P2).await.unwrap();

    assert!(h.messenger.mark_read("C", P2).await.unwrap().is_empty());
    let twice = h.messenger.fetch_history("C", P2).await.unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_outsider_reads_are_denied_without_mutation() {
    let h = harness().await;
    h.messenger.append("C", P1, text("private")).await.unwrap();

    assert!(h
        .messenger
        .fetch_history("C", OUTSIDER)
        .await
        .unwrap_err()
        .is_denied());
    assert!(h.messenger.mark_read("C", OUTSIDER).await.unwrap_err().is_denied());
    assert!(h
        .messenger
        .delete_conversation("C", OUTSIDER)
        .await
        .unwrap_err()
        .is_denied());
    assert!(h
        .messenger
        .subscribe_messages("C", OUTSIDER)
        .await
        .is_err());

    let history = h.messenger.fetch_history("C", P2).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].read);
}

#[tokio::test]
async fn test_delete_own_only_by_sender() {
    let h = harness().await;
    let mine = h.messenger.append("C", P1, text("oops")).await.unwrap();
    h.messenger.append("C", P2, text("reply")).await.unwrap();

    let err = h.messenger.delete_own(mine.id, P2).await.unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));
    assert!(h.messenger.delete_own(mine.id, OUTSIDER).await.is_err());
    assert_eq!(h.messenger.fetch_history("C", P1).await.unwrap().len(), 2);

    h.messenger.delete_own(mine.id, P1).await.unwrap();
    let history = h.messenger.fetch_history("C", P1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body(), "reply");

    assert!(matches!(
        h.messenger.delete_own(mine.id, P1).await,
        Err(ChatError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_validation_rejects_empty_bodies() {
    let h = harness().await;
    assert!(matches!(
        h.messenger.append("C", P1, text("   ")).await,
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        h.messenger
            .append("C", P1, MessageContent::attachment("", None))
            .await,
        Err(ChatError::Validation(_))
    ));
    assert!(h.messenger.fetch_history("C", P1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unengaged_booking_is_read_only() {
    let h = harness().await;

    let err = h.messenger.append("DONE", P1, text("hi")).await.unwrap_err();
    assert!(matches!(err, ChatError::ChatUnavailable { ref status, .. } if status == "completed"));

    let upload = h
        .messenger
        .upload(
            "DONE",
            P1,
            AttachmentPayload::new("a.png", None, vec![1u8; 8]),
        )
        .await;
    assert!(matches!(upload, Err(ChatError::ChatUnavailable { .. })));

    // Reads still work.
    assert!(h.messenger.fetch_history("DONE", P1).await.unwrap().is_empty());
    assert!(!h.messenger.resolve_conversation("DONE", P2).await.unwrap().engaged);

    // A non-participant is refused before the status is revealed.
    assert!(matches!(
        h.messenger.append("DONE", OUTSIDER, text("hi")).await,
        Err(ChatError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_unread_invariant_after_mixed_operations() {
    let h = harness().await;
    let conversations = ["C", "C2", "C3", "DONE"];

    let a = h.messenger.append("C", P1, text("1")).await.unwrap();
    h.messenger.append("C", P2, text("2")).await.unwrap();
    h.messenger.append("C3", P2, text("3")).await.unwrap();
    h.messenger.append("C3", P2, text("4")).await.unwrap();
    for user in [P1, P2] {
        assert_counts_consistent(&h.messenger, user, &conversations).await;
    }

    h.messenger.mark_read("C3", P1).await.unwrap();
    h.messenger.delete_own(a.id, P1).await.unwrap();
    h.messenger.append("C3", P1, text("5")).await.unwrap();
    for user in [P1, P2] {
        assert_counts_consistent(&h.messenger, user, &conversations).await;
    }

    h.messenger.delete_conversation("C3", P1).await.unwrap();
    for user in [P1, P2] {
        assert_counts_consistent(&h.messenger, user, &conversations).await;
    }
}

#[tokio::test]
async fn test_push_order_matches_store_order() {
    let h = harness().await;
    let mut events = h.messenger.subscribe_messages("C", P2).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let messenger = h.messenger.clone();
        handles.push(tokio::spawn(async move {
            messenger
                .append("C", P1, MessageContent::text(format!("m{i}")))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut pushed = Vec::new();
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(5), events.next()).await {
            Ok(Some(ConversationEvent::Inserted { message })) => pushed.push(message.id),
            other => panic!("unexpected push: {:?}", other),
        }
    }

    let mut sorted = pushed.clone();
    sorted.sort();
    assert_eq!(pushed, sorted);
}

#[tokio::test]
async fn test_mark_read_pushes_updates_and_inbox() {
    let h = harness().await;
    let mut sender_view = h.messenger.subscribe_messages("C", P1).await.unwrap();
    let mut inbox = h.messenger.subscribe_inbox(P2).await.unwrap();

    let sent = h.messenger.append("C", P1, text("seen?")).await.unwrap();
    assert!(matches!(
        sender_view.next().await,
        Some(ConversationEvent::Inserted { .. })
    ));
    let signal = inbox.next().await.unwrap();
    assert_eq!(signal.reason, InboxReason::MessageReceived);

    h.messenger.mark_read("C", P2).await.unwrap();
    match sender_view.next().await {
        Some(ConversationEvent::Updated { message }) => {
            assert_eq!(message.id, sent.id);
            assert!(message.read);
        }
        other => panic!("unexpected push: {:?}", other),
    }
    assert_eq!(inbox.next().await.unwrap().reason, InboxReason::MessagesRead);
}

#[tokio::test]
async fn test_typing_is_not_echoed_to_sender() {
    let h = harness().await;
    let mut own = h.messenger.subscribe_typing("C", P1).await.unwrap();
    let mut other = h.messenger.subscribe_typing("C", P2).await.unwrap();

    h.messenger.send_typing("C", P1).await.unwrap();

    let signal = other.next().await.unwrap();
    assert_eq!(signal.user_id, P1);

    let echoed = tokio::time::timeout(Duration::from_millis(50), own.next()).await;
    assert!(echoed.is_err());

    assert!(h.messenger.send_typing("C", OUTSIDER).await.is_err());
}

#[tokio::test]
async fn test_subscriptions_released_on_drop() {
    let h = harness().await;
    let messages = h.messenger.subscribe_messages("C", P1).await.unwrap();
    let typing = h.messenger.subscribe_typing("C", P1).await.unwrap();
    assert_eq!(h.messenger.bus().message_subscribers("C"), 1);

    drop(messages);
    drop(typing);
    assert_eq!(h.messenger.bus().topic_count(), 0);
}

#[tokio::test]
async fn test_conversation_list() {
    let h = harness().await;
    h.messenger.append("C", P2, text("first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.messenger.append("C3", P2, text("second")).await.unwrap();
    h.messenger.append("C3", P2, text("third")).await.unwrap();

    let chats = h.messenger.list_conversations(P1).await.unwrap();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].conversation_id, "C3");
    assert_eq!(chats[0].last_message.body(), "third");
    assert_eq!(chats[0].unread_count, 2);
    assert_eq!(chats[0].other_participant, P2);
    assert_eq!(chats[1].conversation_id, "C");
    assert_eq!(chats[1].unread_count, 1);

    let provider_view = h.messenger.list_conversations(P2).await.unwrap();
    assert!(provider_view.iter().all(|c| c.unread_count == 0));
    assert_eq!(
        h.messenger.unread_in_conversation("C3", P1).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_closed_bus_reports_delivery_unavailable() {
    let h = harness().await;
    h.messenger.bus().close();

    assert!(matches!(
        h.messenger.subscribe_messages("C", P1).await,
        Err(ChatError::DeliveryUnavailable(_))
    ));
    // Writes still succeed without subscribers.
    h.messenger.append("C", P1, text("still stored")).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_appends_page_in_history_order() {
    let h = harness().await;

    let sends = (0..20).map(|i| {
        let (sender, text) = if i % 2 == 0 { (P1, "from customer") } else { (P2, "from provider") };
        h.messenger.append("C", sender, MessageContent::text(format!("{text} {i}")))
    });
    for sent in futures::future::join_all(sends).await {
        sent.unwrap();
    }

    let history: Vec<i64> = h
        .messenger
        .fetch_history("C", P1)
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(history.len(), 20);

    let mut cursor = 0;
    let mut paged = Vec::new();
    loop {
        let page = h
            .messenger
            .fetch_history_after("C", P2, cursor, 1)
            .await
            .unwrap();
        let Some(last) = page.last() else { break };
        cursor = last.id;
        paged.push(last.id);
    }
    assert_eq!(paged, history);
    assert!(paged.windows(2).all(|pair| pair[0] < pair[1]));
}
