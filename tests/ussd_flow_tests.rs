mod common;

use common::{EMAIL_DOMAIN, PHONE, hub, open, turn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use votehub::application::ussd::prompts;
use votehub::domain::channel::Channel;
use votehub::domain::session::{Level, SessionKey};
use votehub::error::VoteError;

fn key(session_id: &str) -> SessionKey {
    SessionKey::new(session_id, PHONE)
}

#[tokio::test]
async fn test_vote_scenario_reaches_payment() {
    let hub = hub().await;
    hub.gateway.queue_reference("REF123");

    let welcome = hub.ussd.handle_turn(open("S1")).await;
    assert_eq!(welcome.message, prompts::WELCOME);
    assert!(welcome.continue_session);

    let found = hub.ussd.handle_turn(turn("S1", "AB12CD")).await;
    assert!(found.message.contains("Cost per Vote: Ghc 2.00"));

    let confirm = hub.ussd.handle_turn(turn("S1", "5")).await;
    assert!(confirm.message.starts_with("Approve 5 Votes at Ghc 10.00 for"));

    let processing = hub.ussd.handle_turn(turn("S1", "1")).await;
    assert_eq!(processing.message, prompts::PROCESSING);
    assert!(processing.continue_session);

    let initiations = hub.gateway.initiations();
    assert_eq!(initiations.len(), 1);
    let request = &initiations[0];
    assert_eq!(request.amount_minor, 1000);
    assert_eq!(request.phone, PHONE);
    assert_eq!(request.channel, Channel::Mtn);
    assert_eq!(request.email, format!("{PHONE}@{EMAIL_DOMAIN}"));
    assert_eq!(request.metadata.nominee_id, 7);

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::AwaitingPayment);
    assert_eq!(session.reference.as_deref(), Some("REF123"));

    let payment = hub.stores.payments.get("REF123").await.unwrap().unwrap();
    assert_eq!(payment.votes.get(), 5);
    assert!(!payment.is_confirmed());

    // Further input while the payment is outstanding ends the dialog.
    let later = hub.ussd.handle_turn(turn("S1", "1")).await;
    assert_eq!(later.message, prompts::AWAITING_PAYMENT);
    assert!(!later.continue_session);
    assert_eq!(hub.gateway.initiations().len(), 1);
}

#[tokio::test]
async fn test_invalid_vote_count_keeps_level_two() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;
    hub.ussd.handle_turn(turn("S1", "AB12CD")).await;

    let reprompt = hub.ussd.handle_turn(turn("S1", "-3")).await;
    assert_eq!(reprompt.message, prompts::INVALID_VOTES);
    assert!(reprompt.continue_session);

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::VoteEntry);
    assert_eq!(session.votes, None);
}

#[tokio::test]
async fn test_unknown_code_keeps_level_one() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;

    let reprompt = hub.ussd.handle_turn(turn("S1", "NOPE00")).await;
    assert_eq!(reprompt.message, prompts::NOMINEE_NOT_FOUND);

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::CodeEntry);
}

#[tokio::test]
async fn test_cancel_has_no_side_effects() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;
    hub.ussd.handle_turn(turn("S1", "AB12CD")).await;
    hub.ussd.handle_turn(turn("S1", "5")).await;

    let cancelled = hub.ussd.handle_turn(turn("S1", "2")).await;
    assert_eq!(cancelled.message, prompts::CANCELLED);
    assert!(!cancelled.continue_session);

    assert!(hub.gateway.initiations().is_empty());
    let stats = hub.stores.payments.statistics().await.unwrap();
    assert_eq!(stats.total_transactions, 0);
    assert!(hub.stores.votes.votes_for(7).await.unwrap().is_empty());
    let nominee = hub.stores.ledger.get_by_id(7).await.unwrap().unwrap();
    assert_eq!(nominee.votes, 0);
}

#[tokio::test]
async fn test_gateway_failure_stays_at_confirmation() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;
    hub.ussd.handle_turn(turn("S1", "AB12CD")).await;
    hub.ussd.handle_turn(turn("S1", "5")).await;

    hub.gateway.fail_initiations(true);
    let failed = hub.ussd.handle_turn(turn("S1", "1")).await;
    assert_eq!(failed.message, prompts::PAYMENT_FAILED);
    assert!(failed.continue_session);

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::Confirmation);
    assert!(hub.stores.payments.pending().await.unwrap().is_empty());

    hub.gateway.fail_initiations(false);
    let retried = hub.ussd.handle_turn(turn("S1", "1")).await;
    assert_eq!(retried.message, prompts::PROCESSING);
    assert_eq!(hub.stores.payments.pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_new_session_flag_resets_state() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;
    hub.ussd.handle_turn(turn("S1", "AB12CD")).await;

    let welcome = hub.ussd.handle_turn(open("S1")).await;
    assert_eq!(welcome.message, prompts::WELCOME);

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::CodeEntry);
    assert_eq!(session.nominee_id, None);
}

#[tokio::test]
async fn test_unseen_session_starts_with_welcome() {
    let hub = hub().await;
    let response = hub.ussd.handle_turn(turn("S9", "AB12CD")).await;
    assert_eq!(response.message, prompts::WELCOME);

    let session = hub.stores.sessions.get(&key("S9")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::CodeEntry);
}

#[tokio::test]
async fn test_sessions_are_keyed_by_phone_too() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;
    hub.ussd.handle_turn(turn("S1", "AB12CD")).await;

    let mut other_phone = turn("S1", "5");
    other_phone.msisdn = "233201234567".into();
    let response = hub.ussd.handle_turn(other_phone).await;
    assert_eq!(response.message, prompts::WELCOME);

    let original = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(original.level, Level::VoteEntry);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_concurrent_turns_apply_once() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;

    let (a, b) = tokio::join!(
        hub.ussd.handle_turn(turn("S1", "AB12CD")),
        hub.ussd.handle_turn(turn("S1", "AB12CD")),
    );
    let found = [&a, &b]
        .iter()
        .filter(|r| r.message.starts_with("Nominee Ama found."))
        .count();
    assert_eq!(found, 1, "responses: {a:?} / {b:?}");

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::VoteEntry);
    assert_eq!(session.nominee_id, Some(7));
}

async fn at_confirmation(hub: &common::Hub, session_id: &str) {
    hub.ussd.handle_turn(open(session_id)).await;
    hub.ussd.handle_turn(turn(session_id, "AB12CD")).await;
    hub.ussd.handle_turn(turn(session_id, "5")).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_start_one_payment() {
    let hub = hub().await;
    at_confirmation(&hub, "S1").await;
    hub.gateway.delay_initiations(Duration::from_millis(20));

    let (a, b) = tokio::join!(
        hub.ussd.handle_turn(turn("S1", "1")),
        hub.ussd.handle_turn(turn("S1", "1")),
    );

    assert_eq!(hub.gateway.initiations().len(), 1, "responses: {a:?} / {b:?}");
    assert_eq!(hub.stores.payments.pending().await.unwrap().len(), 1);
    let processing = [&a, &b]
        .iter()
        .filter(|r| r.message == prompts::PROCESSING)
        .count();
    assert_eq!(processing, 1, "responses: {a:?} / {b:?}");
    for response in [&a, &b] {
        assert!(
            [prompts::PROCESSING, prompts::BUSY, prompts::AWAITING_PAYMENT]
                .contains(&response.message.as_str()),
            "unexpected response {response:?}"
        );
    }

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::AwaitingPayment);
    assert_eq!(session.reference.as_deref(), Some("REF1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_confirm_while_payment_in_flight_is_not_replayed() {
    let hub = hub().await;
    at_confirmation(&hub, "S1").await;
    hub.gateway.delay_initiations(Duration::from_millis(100));

    let (first, second) = tokio::join!(hub.ussd.handle_turn(turn("S1", "1")), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        hub.ussd.handle_turn(turn("S1", "1")).await
    });

    assert_eq!(first.message, prompts::PROCESSING);
    assert_eq!(second.message, prompts::AWAITING_PAYMENT);
    assert!(!second.continue_session);
    assert_eq!(hub.gateway.initiations().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_payment_releases_session_for_retry() {
    let hub = hub().await;
    at_confirmation(&hub, "S1").await;
    hub.gateway.delay_initiations(Duration::from_millis(10));
    hub.gateway.fail_initiations(true);

    let (a, b) = tokio::join!(
        hub.ussd.handle_turn(turn("S1", "1")),
        hub.ussd.handle_turn(turn("S1", "1")),
    );
    let failed = [&a, &b]
        .iter()
        .filter(|r| r.message == prompts::PAYMENT_FAILED)
        .count();
    assert_eq!(failed, 1, "responses: {a:?} / {b:?}");

    let session = hub.stores.sessions.get(&key("S1")).await.unwrap().unwrap();
    assert_eq!(session.level, Level::Confirmation);
    assert_eq!(session.reference, None);

    hub.gateway.fail_initiations(false);
    let retried = hub.ussd.handle_turn(turn("S1", "1")).await;
    assert_eq!(retried.message, prompts::PROCESSING);
    assert_eq!(hub.gateway.initiations().len(), 1);
}

#[tokio::test]
async fn test_statistics_window_out_of_range() {
    let hub = hub().await;
    let err = hub.ussd.statistics(i64::MAX).await.unwrap_err();
    assert!(matches!(err, VoteError::Validation(_)));
}

#[tokio::test]
async fn test_levels_never_skip_or_regress() {
    let hub = hub().await;
    let inputs = ["AB12CD", "XY34EF", "zz", "5", "-3", "0", "12", "1", "2", "3", "", "abc"];
    let mut rng = StdRng::seed_from_u64(7);

    for round in 0..20 {
        let session_id = format!("R{round}");
        hub.ussd.handle_turn(open(&session_id)).await;
        let mut previous = Level::CodeEntry;
        let steps = rng.gen_range(1..15);
        for _ in 0..steps {
            let input = inputs.choose(&mut rng).copied().unwrap_or("");
            let response = hub.ussd.handle_turn(turn(&session_id, input)).await;
            assert!(!response.message.is_empty());

            let level = hub
                .stores
                .sessions
                .get(&key(&session_id))
                .await
                .unwrap()
                .unwrap()
                .level;
            assert!(
                level.number() == previous.number() || level.number() == previous.number() + 1,
                "level jumped from {previous} to {level} on {input:?}"
            );
            previous = level;
            if !response.continue_session {
                break;
            }
        }
    }
}

#[tokio::test]
async fn test_session_statistics() {
    let hub = hub().await;
    hub.ussd.handle_turn(open("S1")).await;
    hub.ussd.handle_turn(open("S2")).await;
    hub.ussd.handle_turn(turn("S2", "AB12CD")).await;

    let stats = hub.ussd.statistics(7).await.unwrap();
    assert_eq!(stats.active_sessions, 2);
    assert_eq!(stats.level_counts.get(&Level::CodeEntry), Some(&1));
    assert_eq!(stats.level_counts.get(&Level::VoteEntry), Some(&1));
}
