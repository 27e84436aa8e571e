//! Chat resolution against a scripted session.

mod common;

use assert_matches::assert_matches;
use common::{chat, FakeSession};
use mediarelay::config::{DeliveryPolicy, SessionConfig};
use mediarelay::delivery::{ChatResolver, DeliveryError, ResolverSettings};
use mediarelay::session::SessionError;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn resolver() -> ChatResolver {
    ChatResolver::new(ResolverSettings::new(
        &SessionConfig::default(),
        &DeliveryPolicy::default(),
    ))
}

fn session() -> FakeSession {
    FakeSession::ready(vec![
        chat("status@broadcast", "Status"),
        chat("15551234567@c.us", "Alice Cohen"),
        chat("120363@g.us", "Family"),
        chat("120999@g.us", "Family Trip 2024"),
    ])
}

#[tokio::test]
async fn exact_name_wins_over_substring() {
    let session = session();
    let chat = resolver().resolve(&session, "Family").await.unwrap();
    assert_eq!(chat.id(), "120363@g.us");
    assert_eq!(session.get_by_id_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn substring_match_is_fallback() {
    let chat = resolver().resolve(&session(), "Trip").await.unwrap();
    assert_eq!(chat.id(), "120999@g.us");
}

#[tokio::test]
async fn phone_number_uses_direct_lookup() {
    let session = session();
    let chat = resolver().resolve(&session, "+15551234567").await.unwrap();
    assert_eq!(chat.id(), "15551234567@c.us");
    assert_eq!(chat.name(), Some("Alice Cohen"));
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn status_label_resolves_to_broadcast() {
    let chat = resolver().resolve(&session(), "הסטטוס שלי").await.unwrap();
    assert_eq!(chat.id(), "status@broadcast");
}

#[tokio::test]
async fn unknown_qualified_id_falls_back_to_name_search() {
    let session = session();
    let err = resolver().resolve(&session, "+972500000000").await.unwrap_err();

    assert_matches!(
        err,
        DeliveryError::ChatNotFound { ref raw, ref resolved }
            if raw == "+972500000000" && resolved == "972500000000@c.us"
    );
    assert_eq!(session.get_by_id_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let session = session();
    let err = resolver().resolve(&session, "Nobody").await.unwrap_err();
    assert_matches!(err, DeliveryError::ChatNotFound { .. });
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_identifier_matches_nothing() {
    let session = session();
    for raw in ["", "   "] {
        let err = resolver().resolve(&session, raw).await.unwrap_err();
        assert_matches!(err, DeliveryError::ChatNotFound { raw: ref r, .. } if r == raw);
    }
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.get_by_id_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn detached_frame_is_retried_after_delay() {
    let session = session().chat_errors(vec![
        SessionError::FrameDetached("detached Frame".into()),
        SessionError::TargetClosed("Target closed".into()),
    ]);

    let start = tokio::time::Instant::now();
    let chat = resolver().resolve(&session, "Family").await.unwrap();

    assert_eq!(chat.id(), "120363@g.us");
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn exhausted_detachment_retries_is_a_crash() {
    let detached = || SessionError::FrameDetached("detached Frame".into());
    let session = session().chat_errors(vec![detached(), detached(), detached()]);

    let err = resolver().resolve(&session, "Family").await.unwrap_err();
    assert_matches!(err, DeliveryError::SessionCrashed(SessionError::FrameDetached(_)));
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn other_errors_abort_immediately() {
    let session = session().chat_errors(vec![SessionError::Transport("connection reset".into())]);

    let err = resolver().resolve(&session, "Family").await.unwrap_err();
    assert_matches!(err, DeliveryError::Session(SessionError::Transport(_)));
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn browser_crash_is_not_a_transient_retry() {
    let session = session().chat_errors(vec![SessionError::BrowserCrash("t".into())]);

    let err = resolver().resolve(&session, "Family").await.unwrap_err();
    assert_matches!(err, DeliveryError::SessionCrashed(SessionError::BrowserCrash(_)));
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn not_ready_session_aborts() {
    let session = FakeSession::not_ready();
    let err = resolver().resolve(&session, "Family").await.unwrap_err();
    assert_matches!(err, DeliveryError::SessionNotReady);
    assert_eq!(session.get_chats_calls.load(Ordering::SeqCst), 0);
}
