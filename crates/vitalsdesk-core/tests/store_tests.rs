//! Query store behaviour: de-duplication, ordering, eviction, errors.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use common::{settle_tasks, store_over, ScriptedExecutor};
use vitalsdesk_core::api::ApiError;
use vitalsdesk_core::cache::{CacheError, CacheKey, QueryStatus, Tag};
use vitalsdesk_core::services::{records, users, RECORD, USER};

const USER_ROUTE: &str = "GET /users/line123";
const RECORDS_ROUTE: &str = "GET /records";

fn user_json(name: &str) -> Value {
    json!({ "lineId": "line123", "name": name })
}

#[tokio::test]
async fn test_concurrent_subscribers_share_one_request() {
    let executor = ScriptedExecutor::new();
    let gate = executor.gate(USER_ROUTE);
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut first = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    let mut second = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    assert_eq!(first.key(), second.key());
    assert_eq!(store.in_flight_count(), 1);
    assert!(first.snapshot().is_loading());

    gate.send(Ok(user_json("Somchai"))).expect("request waiting");
    let a = first.settled().await.expect("first settles");
    let b = second.settled().await.expect("second settles");

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a["name"], "Somchai");
    assert_eq!(executor.calls_to(USER_ROUTE), 1);
    assert_eq!(store.in_flight_count(), 0);
    assert_eq!(first.snapshot().subscriber_count, 2);
}

#[tokio::test]
async fn test_resubscribe_while_in_flight_does_not_refetch() {
    let executor = ScriptedExecutor::new();
    let gate = executor.gate(USER_ROUTE);
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let first = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    first.unsubscribe();
    let mut again = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    assert_eq!(again.snapshot().subscriber_count, 1);

    gate.send(Ok(user_json("Somchai"))).expect("request waiting");
    let value = again.settled().await.expect("settles");
    assert_eq!(value["name"], "Somchai");
    assert_eq!(executor.calls_to(USER_ROUTE), 1);
}

#[tokio::test]
async fn test_unsubscribed_request_still_fills_cache() {
    let executor = ScriptedExecutor::new();
    let gate = executor.gate(USER_ROUTE);
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let subscription = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    let key = subscription.key().clone();
    let pending = store.in_flight(&key).expect("request running");
    drop(subscription);

    gate.send(Ok(user_json("Somchai"))).expect("request waiting");
    pending.await.expect("request succeeds");

    let snapshot = store.get(&key).expect("entry kept while idle");
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.subscriber_count, 0);
    assert_eq!(store.tags_for(&key), vec![Tag::id(USER, "line123")]);
}

#[tokio::test]
async fn test_superseded_completion_is_discarded() {
    let executor = ScriptedExecutor::new();
    let first_gate = executor.gate(RECORDS_ROUTE);
    let second_gate = executor.gate(RECORDS_ROUTE);
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut subscription = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    let key = subscription.key().clone();
    let first = store.in_flight(&key).expect("first request running");
    settle_tasks().await;

    // A new request for the same key supersedes the first one.
    assert!(store.invalidate(&key));
    settle_tasks().await;
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 2);

    second_gate
        .send(Ok(json!([{ "_id": "r2" }])))
        .expect("second request waiting");
    let newest = subscription.settled().await.expect("settles");
    assert_eq!(*newest, json!([{ "_id": "r2" }]));

    first_gate
        .send(Ok(json!([{ "_id": "r1" }])))
        .expect("first request waiting");
    let late = first.await.expect("first request completes");
    assert_eq!(*late, json!([{ "_id": "r1" }]));

    let snapshot = store.get(&key).expect("entry cached");
    assert_eq!(snapshot.data.as_deref(), Some(&json!([{ "_id": "r2" }])));
    assert!(!snapshot.is_fetching);
}

#[tokio::test]
async fn test_error_keeps_previous_data_and_tags() {
    let executor = ScriptedExecutor::new();
    executor.once(RECORDS_ROUTE, Ok(json!([{ "_id": "r1" }])));
    executor.once(
        RECORDS_ROUTE,
        Err(ApiError::from_status(500, r#"{"message":"boom"}"#)),
    );
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut subscription = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    subscription.settled().await.expect("first fetch succeeds");
    let key = subscription.key().clone();

    store.invalidate(&key);
    let err = subscription.settled().await.expect_err("refetch fails");
    assert_eq!(err.status(), Some(500));

    settle_tasks().await;
    let snapshot = subscription.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert!(!snapshot.is_stale);
    assert!(!snapshot.is_fetching);
    assert_eq!(snapshot.data.as_deref(), Some(&json!([{ "_id": "r1" }])));
    assert_eq!(store.tags_for(&key), vec![Tag::of(RECORD)]);
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 2);
}

#[tokio::test]
async fn test_failing_refetch_after_invalidation_is_not_retried() {
    let executor = ScriptedExecutor::new();
    executor.once(RECORDS_ROUTE, Ok(json!([])));
    executor.always(
        RECORDS_ROUTE,
        Err(ApiError::from_status(404, r#"{"message":"gone"}"#)),
    );
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut subscription = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    subscription.settled().await.expect("first fetch succeeds");
    let key = subscription.key().clone();

    assert!(store.invalidate(&key));
    for _ in 0..20 {
        settle_tasks().await;
    }

    assert_eq!(executor.calls_to(RECORDS_ROUTE), 2);
    let err = subscription.settled().await.expect_err("refetch fails");
    assert_eq!(err.status(), Some(404));
    assert!(!subscription.snapshot().is_stale);
    assert_eq!(store.in_flight_count(), 0);
}

#[tokio::test]
async fn test_invalidation_during_failed_request_refetches_once() {
    let executor = ScriptedExecutor::new();
    let gate = executor.gate(RECORDS_ROUTE);
    executor.always(RECORDS_ROUTE, Ok(json!([{ "_id": "r2" }])));
    let store = store_over(executor.clone(), Duration::from_secs(60));

    // Invalidated while the request runs with nobody mounted.
    let first = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    let key = first.key().clone();
    drop(first);
    assert!(store.invalidate(&key));
    let mut again = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    settle_tasks().await;
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 1);

    // The failure predates the invalidation, so one more request follows.
    gate.send(Err(ApiError::Network("connection reset".into())))
        .expect("request waiting");
    let value = again.settled().await.expect("follow-up request succeeds");
    assert_eq!(*value, json!([{ "_id": "r2" }]));

    settle_tasks().await;
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 2);
    assert!(!again.snapshot().is_stale);
}

#[tokio::test]
async fn test_refetch_of_uncached_key_is_refused() {
    let executor = ScriptedExecutor::new();
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let key = CacheKey::new(records::GET_RECORDS, &Value::Null);
    assert_eq!(store.refetch(&key), Err(CacheError::NotCached(key.clone())));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_error_entry_refetches_on_next_subscribe() {
    let executor = ScriptedExecutor::new();
    executor.once(USER_ROUTE, Err(ApiError::Network("connection refused".into())));
    executor.always(USER_ROUTE, Ok(user_json("Somchai")));
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut first = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    assert!(matches!(
        first.settled().await,
        Err(CacheError::Api(ApiError::Network(_)))
    ));

    let mut second = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    let value = second.settled().await.expect("retry succeeds");
    assert_eq!(value["name"], "Somchai");
    assert_eq!(executor.calls_to(USER_ROUTE), 2);
}

#[tokio::test(start_paused = true)]
async fn test_idle_entry_is_evicted_after_keep_window() {
    let executor = ScriptedExecutor::new();
    executor.always(RECORDS_ROUTE, Ok(json!([{ "_id": "r1" }])));
    let store = store_over(executor.clone(), Duration::from_secs(60));
    let key = CacheKey::new(records::GET_RECORDS, &Value::Null);

    store.query(records::GET_RECORDS, ()).await.expect("query");
    assert!(store.get(&key).is_some());
    assert_eq!(store.tags_for(&key), vec![Tag::of(RECORD)]);

    tokio::time::sleep(Duration::from_secs(59)).await;
    settle_tasks().await;
    assert!(store.get(&key).is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle_tasks().await;
    assert!(store.get(&key).is_none());
    assert!(store.tags_for(&key).is_empty());
    assert_eq!(store.invalidate_tags(&[Tag::of(RECORD)]), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_cancels_eviction() {
    let executor = ScriptedExecutor::new();
    executor.always(RECORDS_ROUTE, Ok(json!([])));
    let store = store_over(executor.clone(), Duration::from_secs(60));
    let key = CacheKey::new(records::GET_RECORDS, &Value::Null);

    store.query(records::GET_RECORDS, ()).await.expect("query");
    tokio::time::sleep(Duration::from_secs(30)).await;

    let subscription = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    assert!(subscription.snapshot().is_success());
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle_tasks().await;
    assert!(store.get(&key).is_some());

    drop(subscription);
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle_tasks().await;
    assert!(store.get(&key).is_none());
}

#[tokio::test]
async fn test_zero_keep_window_evicts_immediately() {
    let executor = ScriptedExecutor::new();
    executor.always(RECORDS_ROUTE, Ok(json!([])));
    let store = store_over(executor.clone(), Duration::ZERO);

    store.query(records::GET_RECORDS, ()).await.expect("query");
    assert!(store.entries().is_empty());

    store.query(records::GET_RECORDS, ()).await.expect("query");
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 2);
}

#[tokio::test]
async fn test_fresh_entry_served_from_cache() {
    let executor = ScriptedExecutor::new();
    executor.always(RECORDS_ROUTE, Ok(json!([])));
    let store = store_over(executor.clone(), Duration::from_secs(60));

    store.query(records::GET_RECORDS, ()).await.expect("query");
    store.query(records::GET_RECORDS, ()).await.expect("query");
    assert_eq!(executor.calls_to(RECORDS_ROUTE), 1);
}

#[tokio::test]
async fn test_args_normalized_into_one_key() {
    let executor = ScriptedExecutor::new();
    executor.always(
        "GET /records/user/u1/date-range?startDate=2024-01-01&endDate=2024-01-31",
        Ok(json!([])),
    );
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let a = store
        .subscribe(
            records::GET_RECORDS_BY_DATE_RANGE,
            json!({ "userId": "u1", "startDate": "2024-01-01", "endDate": "2024-01-31" }),
        )
        .expect("subscribe");
    let b = store
        .subscribe(
            records::GET_RECORDS_BY_DATE_RANGE,
            json!({ "endDate": "2024-01-31", "userId": "u1", "startDate": "2024-01-01" }),
        )
        .expect("subscribe");
    assert_eq!(a.key(), b.key());
    assert_eq!(store.entries().len(), 1);
}

#[tokio::test]
async fn test_upsert_writes_without_request() {
    let executor = ScriptedExecutor::new();
    let store = store_over(executor.clone(), Duration::from_secs(60));

    store
        .upsert(users::GET_USER_BY_LINE_ID, "line123", user_json("Cached"))
        .expect("upsert");
    let subscription = store
        .subscribe(users::GET_USER_BY_LINE_ID, "line123")
        .expect("subscribe");
    let snapshot = subscription.snapshot();
    assert!(snapshot.is_success());
    assert_eq!(snapshot.data.as_deref(), Some(&user_json("Cached")));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_endpoint_kind_is_checked() {
    let store = store_over(ScriptedExecutor::new(), Duration::from_secs(60));

    assert!(matches!(
        store.subscribe(records::CREATE_RECORD, json!({})),
        Err(CacheError::WrongKind { .. })
    ));
    assert!(matches!(
        store.mutate(records::GET_RECORDS, ()).await,
        Err(CacheError::WrongKind { .. })
    ));
    assert!(matches!(
        store.subscribe("getNothing", ()),
        Err(CacheError::UnknownEndpoint(_))
    ));
}

#[tokio::test]
async fn test_invalid_args_surface_as_entry_error() {
    let executor = ScriptedExecutor::new();
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut subscription = store
        .subscribe(records::GET_RECORD_BY_ID, json!({ "wrong": 1 }))
        .expect("subscribe");
    let err = subscription.settled().await.expect_err("builder rejects args");
    assert!(matches!(err, CacheError::Api(ApiError::InvalidRequest(_))));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_dispose_closes_subscriptions() {
    let executor = ScriptedExecutor::new();
    let _gate = executor.gate(RECORDS_ROUTE);
    let store = store_over(executor.clone(), Duration::from_secs(60));

    let mut subscription = store.subscribe(records::GET_RECORDS, ()).expect("subscribe");
    store.dispose();

    assert!(store.is_disposed());
    let closed = loop {
        match subscription.changed().await {
            Ok(_) => continue,
            Err(err) => break err,
        }
    };
    assert_eq!(closed, CacheError::Disposed);
    assert!(matches!(
        store.subscribe(records::GET_RECORDS, ()),
        Err(CacheError::Disposed)
    ));
    assert_eq!(store.invalidate_tags(&[Tag::of(RECORD)]), 0);
}
