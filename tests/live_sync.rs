//! End-to-end sync behaviour over the in-memory backend.

mod common;

use std::time::Duration;

use liveconf::backend::BackendError;
use liveconf::schema::{IntKind, UintKind};
use liveconf::{impl_reflect, Error, Live, SyncState, Value, WatchingConfig};

use common::{controlled_conf, event_stream, eventually, memory_conf, next_event};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Default, PartialEq)]
struct Config3 {
    field1: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Sample {
    field1: String,
    config3: Config3,
}

impl_reflect!(Config3 { field1 as "Field1" });
impl_reflect!(Sample { field1 as "Field1", config3 as "Config3" });

#[derive(Debug, Clone, Default, PartialEq)]
struct Limits {
    burst: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Service {
    port: u16,
    limits: Option<Limits>,
}

impl_reflect!(Limits { burst as "Burst" });
impl_reflect!(Service { port as "Port", limits as "Limits" });

#[tokio::test]
async fn test_nested_keys() {
    let (_broker, conf) = memory_conf("ns", 50);
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();

    let mut keys = conf.keys();
    keys.sort();
    assert_eq!(keys, vec!["A:Config3:Field1", "A:Field1"]);
    assert_eq!(conf.configs().await, vec!["A"]);
    assert_eq!(conf.field("A:Config3:Field1").unwrap().level(), 1);
}

#[tokio::test]
async fn test_initial_sync_loads_values_without_events() {
    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:A:Field1", "hello");
    broker.insert("ns:A:Config3:Field1", "1, 2,3");
    let mut events = event_stream(&conf);

    assert_eq!(conf.state(), SyncState::Idle);
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();

    assert_eq!(sample.load().field1, "hello");
    assert_eq!(sample.load().config3.field1, vec![1, 2, 3]);
    assert_eq!(conf.state(), SyncState::Watching);
    assert!(next_event(&mut events, QUIET).await.is_none());
}

#[tokio::test]
async fn test_change_updates_field_and_raises_one_event() {
    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:A:Field1", "hello");
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();
    let mut events = event_stream(&conf);

    broker.set_and_publish("ns", "A:Field1", "world");

    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.namespace, "ns");
    assert_eq!(event.key, "A:Field1");
    assert_eq!(event.before, Value::String("hello".into()));
    assert_eq!(event.after, Value::String("world".into()));
    assert_eq!(sample.load().field1, "world");
    assert!(next_event(&mut events, QUIET).await.is_none());
}

#[tokio::test]
async fn test_unknown_and_foreign_keys_are_ignored() {
    let (broker, conf) = memory_conf("ns", 50);
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();
    let mut events = event_stream(&conf);

    broker.set_and_publish("ns", "A:Unknown", "x");
    broker.set_and_publish("other", "A:Field1", "x");

    assert!(next_event(&mut events, QUIET).await.is_none());
    assert_eq!(sample.load().field1, "");
}

#[tokio::test]
async fn test_equal_value_raises_no_event() {
    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:A:Config3:Field1", "1,2");
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();
    let mut events = event_stream(&conf);

    // Same list, different spelling.
    broker.set_and_publish("ns", "A:Config3:Field1", " 1, 2 ");

    assert!(next_event(&mut events, QUIET).await.is_none());
    assert_eq!(sample.load().config3.field1, vec![1, 2]);
}

#[tokio::test]
async fn test_reregistering_same_instance_is_idempotent() {
    let (_broker, conf) = memory_conf("ns", 50);
    let sample = Live::new(Sample::default());

    let first = WatchingConfig::named("A", &sample).unwrap();
    let first_keys: Vec<String> = first.keys().map(String::from).collect();
    conf.register_all(vec![first]).await.unwrap();
    conf.register_named("A", &sample.clone()).await.unwrap();

    let again = WatchingConfig::named("A", &sample).unwrap();
    assert_eq!(again.keys().map(String::from).collect::<Vec<_>>(), first_keys);
    assert_eq!(conf.keys().len(), 2);
}

#[tokio::test]
async fn test_same_name_different_instance_is_rejected() {
    let (_broker, conf) = memory_conf("ns", 50);
    conf.register_named("A", &Live::new(Sample::default())).await.unwrap();

    let err = conf
        .register_named("A", &Live::new(Sample::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateConfig { ref name } if name == "A"));
}

#[tokio::test]
async fn test_key_collision_between_roots_is_rejected() {
    #[derive(Debug, Clone, Default)]
    struct Inner {
        c: String,
    }
    #[derive(Debug, Clone, Default)]
    struct Outer {
        b: Inner,
    }
    impl_reflect!(Inner { c as "C" });
    impl_reflect!(Outer { b as "B" });

    let (_broker, conf) = memory_conf("ns", 50);
    conf.register_named("A", &Live::new(Outer::default())).await.unwrap();

    let err = conf
        .register_named("A:B", &Live::new(Inner::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KeyCollision { ref key, .. } if key == "A:B:C"));
    assert_eq!(conf.configs().await, vec!["A"]);
}

#[tokio::test]
async fn test_invalid_stored_value_fails_registration() {
    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:Service:Port", "eighty");

    let err = conf.register(&Live::new(Service::default())).await.unwrap_err();
    assert!(matches!(err, Error::Convert { ref key, .. } if key == "Service:Port"));
}

#[tokio::test]
async fn test_conversion_failure_during_delivery_is_dropped() {
    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:Service:Port", "80");
    let service = Live::new(Service::default());
    conf.register(&service).await.unwrap();
    let mut events = event_stream(&conf);

    broker.set_and_publish("ns", "Service:Port", "99999");
    assert!(next_event(&mut events, QUIET).await.is_none());
    assert_eq!(service.load().port, 80);

    broker.set_and_publish("ns", "Service:Port", "81");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.after, Value::Uint(UintKind::U16, 81));
}

#[tokio::test]
async fn test_nested_option_is_allocated_and_updated() {
    let (broker, conf) = memory_conf("ns", 50);
    let service = Live::new(Service::default());
    conf.register(&service).await.unwrap();
    assert_eq!(service.load().limits, Some(Limits { burst: 0 }));

    let mut events = event_stream(&conf);
    broker.set_and_publish("ns", "Service:Limits:Burst", "25");
    next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(service.load().limits, Some(Limits { burst: 25 }));
}

#[tokio::test]
async fn test_different_keys_change_independently() {
    let (broker, conf) = memory_conf("ns", 50);
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();
    let mut events = event_stream(&conf);

    broker.set_and_publish("ns", "A:Field1", "x");
    broker.set_and_publish("ns", "A:Config3:Field1", "7,8");

    let mut keys = Vec::new();
    for _ in 0..2 {
        keys.push(next_event(&mut events, WAIT).await.expect("change event").key);
    }
    keys.sort();
    assert_eq!(keys, vec!["A:Config3:Field1", "A:Field1"]);

    let current = sample.load();
    assert_eq!(current.field1, "x");
    assert_eq!(current.config3.field1, vec![7, 8]);
}

#[tokio::test]
async fn test_reconnects_after_monitor_failure() {
    let (broker, conf) = memory_conf("ns", 200);
    let sample = Live::new(Sample::default());
    conf.register_named("A", &sample).await.unwrap();
    let mut events = event_stream(&conf);

    broker.fail("connection reset");
    assert!(eventually(WAIT, || conf.state() == SyncState::Reconnecting).await);
    assert!(eventually(WAIT, || conf.state() == SyncState::Watching).await);

    broker.set_and_publish("ns", "A:Field1", "after-reconnect");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.after, Value::String("after-reconnect".into()));
}

#[tokio::test]
async fn test_close_cancels_reconnect_and_rejects_registration() {
    let (broker, conf) = memory_conf("ns", 200);
    conf.register_named("A", &Live::new(Sample::default())).await.unwrap();

    broker.fail("connection reset");
    assert!(eventually(WAIT, || conf.state() == SyncState::Reconnecting).await);
    conf.close();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(broker.subscriber_count(), 0);
    assert_eq!(conf.state(), SyncState::Reconnecting);

    let err = conf
        .register_named("B", &Live::new(Sample::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Closed(_)));
}

#[tokio::test]
async fn test_changes_after_close_are_ignored() {
    let (broker, conf) = memory_conf("ns", 50);
    let service = Live::new(Service::default());
    conf.register(&service).await.unwrap();
    let mut events = event_stream(&conf);

    conf.close();
    broker.set_and_publish("ns", "Service:Port", "443");

    assert!(next_event(&mut events, QUIET).await.is_none());
    assert_eq!(service.load().port, 0);
}

#[tokio::test]
async fn test_event_values_use_field_width() {
    #[derive(Debug, Clone, Default)]
    struct Counter {
        hits: i8,
    }
    impl_reflect!(Counter { hits as "Hits" });

    let (broker, conf) = memory_conf("", 50);
    conf.register(&Live::new(Counter::default())).await.unwrap();
    let mut events = event_stream(&conf);

    broker.set_and_publish("", "Counter:Hits", "-3");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.before, Value::Int(IntKind::I8, 0));
    assert_eq!(event.after, Value::Int(IntKind::I8, -3));
}

#[tokio::test]
async fn test_failed_initial_sync_can_be_retried() {
    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:Service:Port", "eighty");
    let service = Live::new(Service::default());

    let err = conf.register(&service).await.unwrap_err();
    assert!(matches!(err, Error::Convert { .. }));
    assert!(conf.keys().is_empty());
    assert!(conf.configs().await.is_empty());
    assert_eq!(conf.state(), SyncState::Idle);

    broker.insert("ns:Service:Port", "80");
    conf.register(&service).await.unwrap();
    assert_eq!(service.load().port, 80);
    assert_eq!(conf.state(), SyncState::Watching);

    let mut events = event_stream(&conf);
    broker.set_and_publish("ns", "Service:Port", "81");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.after, Value::Uint(UintKind::U16, 81));
    assert_eq!(service.load().port, 81);
}

#[tokio::test]
async fn test_storage_failure_during_delivery_is_dropped() {
    let (broker, storage, conf) = controlled_conf("ns");
    broker.insert("ns:Service:Port", "80");
    let service = Live::new(Service::default());
    conf.register(&service).await.unwrap();
    let mut events = event_stream(&conf);

    storage.set_failing(true);
    broker.set_and_publish("ns", "Service:Port", "81");
    assert!(next_event(&mut events, QUIET).await.is_none());
    assert_eq!(service.load().port, 80);

    storage.set_failing(false);
    broker.set_and_publish("ns", "Service:Port", "82");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.before, Value::Uint(UintKind::U16, 80));
    assert_eq!(event.after, Value::Uint(UintKind::U16, 82));
}

#[tokio::test]
async fn test_storage_failure_during_initial_sync_is_returned() {
    let (broker, storage, conf) = controlled_conf("ns");
    broker.insert("ns:Service:Port", "443");
    let service = Live::new(Service::default());

    storage.set_failing(true);
    let err = conf.register(&service).await.unwrap_err();
    assert!(matches!(err, Error::Backend(BackendError::Storage(_))));
    assert!(conf.configs().await.is_empty());
    assert_eq!(service.load().port, 0);

    storage.set_failing(false);
    conf.register(&service).await.unwrap();
    assert_eq!(service.load().port, 443);
}

#[tokio::test]
async fn test_register_all_keeps_configs_before_the_failing_one() {
    #[derive(Debug, Clone, Default)]
    struct Inner {
        c: String,
    }
    #[derive(Debug, Clone, Default)]
    struct Outer {
        b: Inner,
    }
    impl_reflect!(Inner { c as "C" });
    impl_reflect!(Outer { b as "B" });

    let (broker, conf) = memory_conf("ns", 50);
    broker.insert("ns:A:B:C", "first");
    let outer = Live::new(Outer::default());
    let configs = vec![
        WatchingConfig::named("A", &outer).unwrap(),
        WatchingConfig::named("A:B", &Live::new(Inner::default())).unwrap(),
    ];

    let err = conf.register_all(configs).await.unwrap_err();
    assert!(matches!(err, Error::KeyCollision { ref key, .. } if key == "A:B:C"));
    assert_eq!(conf.configs().await, vec!["A"]);
    assert_eq!(conf.keys(), vec!["A:B:C"]);
    assert_eq!(outer.load().b.c, "first");
    assert_eq!(conf.state(), SyncState::Watching);

    let mut events = event_stream(&conf);
    broker.set_and_publish("ns", "A:B:C", "second");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.after, Value::String("second".into()));
    assert_eq!(outer.load().b.c, "second");
}

#[tokio::test]
async fn test_change_delivered_during_initial_sync_wins() {
    let (broker, storage, conf) = controlled_conf("ns");
    conf.register_named("A", &Live::new(Sample::default())).await.unwrap();
    broker.insert("ns:B:Field1", "old");
    let late = Live::new(Sample::default());
    let mut events = event_stream(&conf);

    storage.set_gated(true);
    let registration = {
        let conf = conf.clone();
        let late = late.clone();
        tokio::spawn(async move { conf.register_named("B", &late).await })
    };
    storage.entered.notified().await;
    storage.set_gated(false);

    broker.set_and_publish("ns", "B:Field1", "new");
    let event = next_event(&mut events, WAIT).await.expect("change event");
    assert_eq!(event.key, "B:Field1");
    assert_eq!(event.after, Value::String("new".into()));

    storage.release.notify_one();
    registration.await.unwrap().unwrap();
    assert_eq!(late.load().field1, "new");
}
