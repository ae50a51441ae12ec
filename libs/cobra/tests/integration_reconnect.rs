//! Integration tests for reconnection behavior
//!
//! Time is paused in these tests so reconnect delays and response timeouts
//! elapse instantly and deterministically.

mod common;

use cobra::{ClientSettings, CobraClient, ConnectionEvent, ConnectionState, ExponentialBackoff};
use common::*;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

/// Macro for verbose test output
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[tokio::test(start_paused = true)]
async fn test_single_reconnect_after_fixed_delay() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (client, _received) = lobby_client(factory.clone(), ClientSettings::default()).await;

    let mut first = peers.next().await;
    first.complete_auth("s").await;

    let closed_at = Instant::now();
    first.close("server restart");
    first.close("server restart, again");

    let mut second = peers.next().await;
    let waited = closed_at.elapsed();
    verbose_println!("  reconnected after {:?}", waited);
    assert!(waited >= Duration::from_millis(1000), "reconnected after {:?}", waited);
    assert!(waited < Duration::from_millis(1100), "reconnected after {:?}", waited);

    assert_eq!(second.next_sent().await["action"], "auth/handshake");

    // No second, overlapping restart
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(peers.try_next().is_none());
    assert_eq!(factory.created(), 2);
    assert_eq!(client.metrics().reconnect_count, 1);

    let events = drain_events(&client);
    let reconnecting: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ConnectionEvent::Reconnecting { .. }))
        .collect();
    assert_eq!(
        reconnecting,
        vec![&ConnectionEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(1000)
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reauthenticates_with_fresh_nonce() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (client, received) = lobby_client(factory, ClientSettings::default()).await;

    let mut first = peers.next().await;
    first.complete_auth("s").await;
    first.close("gone");

    let mut second = peers.next().await;
    let auth = second.answer_handshake("second-nonce").await;
    assert_eq!(auth["body"]["credentials"]["hash"], cobra::compute_hash("s", "second-nonce").unwrap());
    second.push(json!({"action": "auth/authenticate/ok", "id": auth["id"].clone()}));

    let subscribe = second.next_sent().await;
    assert_eq!(subscribe["body"]["channel"], "lobby");

    second.push(json!({"action": "rtm/subscription/data", "body": {"channel": "lobby", "messages": ["back"]}}));
    wait_for(|| received.lock().len() == 1).await;
    assert_eq!(client.connection_state(), ConnectionState::Subscribed);
}

#[tokio::test(start_paused = true)]
async fn test_request_ids_continue_across_reconnects() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (_client, _received) = lobby_client(factory, ClientSettings::default()).await;

    let mut first = peers.next().await;
    assert_eq!(first.next_sent().await["id"], 0);
    first.close("gone");

    let mut second = peers.next().await;
    assert_eq!(second.next_sent().await["id"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connects_are_retried() {
    let (factory, mut peers) = MockTransportFactory::new();
    factory.fail_next_connects(2);
    let started = Instant::now();
    let (client, _received) = lobby_client(factory.clone(), ClientSettings::default()).await;

    let mut peer = peers.next().await;
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(factory.created(), 3);
    assert_eq!(peer.next_sent().await["action"], "auth/handshake");
    assert_eq!(client.metrics().reconnect_count, 2);

    let attempts: Vec<usize> = drain_events(&client)
        .into_iter()
        .filter_map(|e| match e {
            ConnectionEvent::Reconnecting { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_repeated_auth_rejections() {
    let (factory, mut peers) = MockTransportFactory::new();
    let settings = ClientSettings {
        max_auth_rejections: Some(2),
        ..ClientSettings::default()
    };
    let (client, _received) = lobby_client(factory.clone(), settings).await;

    for round in 0..2 {
        verbose_println!("  rejection round {}", round + 1);
        let mut peer = peers.next().await;
        let auth = peer.answer_handshake("n").await;
        peer.push(json!({
            "action": "auth/authenticate/error",
            "id": auth["id"].clone(),
            "body": {"error": "authentication_failed", "reason": "invalid hash"}
        }));
        wait_for(|| peer.is_closed()).await;
    }

    wait_for(|| drain_events(&client).iter().any(|e| matches!(e, ConnectionEvent::GaveUp { .. }))).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(peers.try_next().is_none());
    assert_eq!(factory.created(), 2);
    assert_eq!(client.connection_state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_response_timeout_restarts_connection() {
    let (factory, mut peers) = MockTransportFactory::new();
    let settings = ClientSettings {
        response_timeout_secs: 2,
        ..ClientSettings::default()
    };
    let (client, _received) = lobby_client(factory, settings).await;

    let mut first = peers.next().await;
    assert_eq!(first.next_sent().await["action"], "auth/handshake");
    let silent_since = Instant::now();

    let mut second = peers.next().await;
    assert!(first.is_closed());
    assert!(silent_since.elapsed() >= Duration::from_millis(3000));
    assert_eq!(second.next_sent().await["action"], "auth/handshake");

    let events = drain_events(&client);
    assert!(events
        .iter()
        .any(|e| matches!(e, ConnectionEvent::Disconnected { reason } if reason.contains("timed out"))));
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_reconnect() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (client, _received) = lobby_client(factory.clone(), ClientSettings::default()).await;

    let mut first = peers.next().await;
    first.complete_auth("s").await;
    first.close("gone");
    wait_for(|| client.connection_state() == ConnectionState::Closed).await;

    client.stop();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(peers.try_next().is_none());
    assert_eq!(factory.created(), 1);
    assert!(drain_events(&client).contains(&ConnectionEvent::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_pending_ack_fails_when_connection_drops() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (client, _received) = lobby_client(factory, ClientSettings::default()).await;

    let mut first = peers.next().await;
    first.complete_auth("s").await;

    let (result, ()) = tokio::join!(client.publish_confirmed("lobby", json!("x")), async {
        first.next_sent().await;
        first.close("dropped");
    });
    assert!(matches!(result, Err(cobra::CobraError::Transport(_))), "got {:?}", result);
}

#[tokio::test(start_paused = true)]
async fn test_custom_strategy_is_used() {
    let (factory, mut peers) = MockTransportFactory::new();
    let client = CobraClient::builder()
        .config(test_config())
        .channel("lobby")
        .transport_factory(factory)
        .reconnect_strategy(ExponentialBackoff::new(
            Duration::from_millis(200),
            Duration::from_secs(5),
            None,
        ))
        .build()
        .await
        .unwrap();

    let first = peers.next().await;
    first.close("gone");
    let started = Instant::now();
    let _second = peers.next().await;
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(1000), "waited {:?}", waited);
    drop(client);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_after_reconnect_resumes_from_last_position() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (_client, received) = lobby_client(factory, ClientSettings::default()).await;

    let mut first = peers.next().await;
    let subscribe = first.complete_auth("s").await;
    assert!(subscribe["body"].get("position").is_none(), "first subscribe starts at the tail");

    first.push(json!({"action": "rtm/subscribe/ok", "id": subscribe["id"].clone(), "body": {"position": "1519190184:0"}}));
    first.push(json!({
        "action": "rtm/subscription/data",
        "body": {"channel": "lobby", "messages": ["a", "b"], "position": "1519190184:2"}
    }));
    wait_for(|| received.lock().len() == 2).await;
    first.close("gone");

    let mut second = peers.next().await;
    let resumed = second.complete_auth("s").await;
    verbose_println!("  resubscribe after reconnect: {}", resumed);
    assert_eq!(resumed["body"]["channel"], "lobby");
    assert_eq!(resumed["body"]["position"], "1519190184:2");
}

#[tokio::test(start_paused = true)]
async fn test_switching_channel_forgets_position() {
    let (factory, mut peers) = MockTransportFactory::new();
    let (client, received) = lobby_client(factory, ClientSettings::default()).await;

    let mut first = peers.next().await;
    first.complete_auth("s").await;
    first.push(json!({
        "action": "rtm/subscription/data",
        "body": {"channel": "lobby", "messages": ["a"], "position": "7:1"}
    }));
    wait_for(|| received.lock().len() == 1).await;

    client.resubscribe("news", None).unwrap();
    assert_eq!(first.next_sent().await["action"], "rtm/unsubscribe");
    let news = first.next_sent().await;
    assert_eq!(news["body"]["channel"], "news");
    assert!(news["body"].get("position").is_none());

    first.close("gone");
    let mut second = peers.next().await;
    let resumed = second.complete_auth("s").await;
    assert_eq!(resumed["body"]["channel"], "news");
    assert!(resumed["body"].get("position").is_none());
}
