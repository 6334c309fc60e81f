//! End-to-End Integration Tests
//!
//! Complete firing workflows through the public API: configuration file →
//! notifier → synchronous, transactional and asynchronous observers.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use tempfile::TempDir;

use eventwire::config::ConfigManager;
use eventwire::event::{
    AsyncDeliveryError, Event, EventMetadata, EventType, NotifierError, ObserverFn, ObserverMethod, ObserverNotifier,
    ObserverRegistry, Qualifier, ResolvableKey, TransactionPhase, TypeArg, TypeRegistry,
};

#[derive(Debug)]
struct OrderPlaced {
    id: u64,
}

impl Event for OrderPlaced {
    fn event_type(&self) -> EventType {
        EventType::named("OrderPlaced")
    }
}

#[derive(Debug)]
struct Batch {
    of: EventType,
}

impl Event for Batch {
    fn event_type(&self) -> EventType {
        EventType::generic("Batch", vec![TypeArg::Concrete(self.of.clone())])
    }
}

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().push(entry.into());
}

fn order_types() -> Arc<TypeRegistry> {
    Arc::new(
        TypeRegistry::new()
            .with_type("OrderPlaced", vec![EventType::named("DomainEvent")])
            .with_type("Batch", vec![EventType::named("DomainEvent")]),
    )
}

fn observer(id: &'static str, observed: &str, log: &Log) -> ObserverFn {
    let log = Arc::clone(log);
    ObserverFn::builder(id, EventType::named(observed)).handler(move |_, _| {
        record(&log, id);
        Ok(())
    })
}

#[test]
fn test_order_placed_scenario() {
    let registry = Arc::new(ObserverRegistry::new());
    let log: Log = Arc::default();
    let caller = thread::current().id();
    let async_threads = Arc::new(Mutex::new(Vec::new()));

    let default_only = |builder: eventwire::event::ObserverFnBuilder| builder.qualifier(Qualifier::default_qualifier());

    {
        let log = Arc::clone(&log);
        registry
            .register(Arc::new(default_only(ObserverFn::builder("A", EventType::named("OrderPlaced"))).handler(
                move |_, _| {
                    record(&log, "A");
                    Ok(())
                },
            )))
            .unwrap();
    }
    for id in ["B", "C"] {
        let log = Arc::clone(&log);
        let async_threads = Arc::clone(&async_threads);
        registry
            .register(Arc::new(
                default_only(ObserverFn::builder(id, EventType::named("OrderPlaced")))
                    .asynchronous()
                    .handler(move |_, _| {
                        async_threads.lock().push(thread::current().id());
                        record(&log, id);
                        Ok(())
                    }),
            ))
            .unwrap();
    }

    let notifier = ObserverNotifier::strict(order_types(), registry);
    let event: Arc<dyn Event> = Arc::new(OrderPlaced { id: 1001 });
    let delivery = notifier
        .fire_async(Arc::clone(&event), None, &[Qualifier::default_qualifier()], None)
        .unwrap();

    assert_eq!(log.lock().first().map(String::as_str), Some("A"));
    let delivered = delivery.wait().unwrap();
    assert!(Arc::ptr_eq(&delivered, &event));
    assert_eq!(*log.lock(), vec!["A", "B", "C"]);

    let threads = async_threads.lock();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0], threads[1]);
    assert_ne!(threads[0], caller);

    // Without the Default qualifier on the firing none of them match
    notifier.fire_event(&OrderPlaced { id: 1002 }, None, &[Qualifier::named("eu")]).unwrap();
    assert_eq!(log.lock().len(), 3);
}

#[test]
fn test_ordering_preserved_in_every_group() {
    let registry = Arc::new(ObserverRegistry::new());
    let log: Log = Arc::default();

    for (group, phase, asynchronous) in [
        ("sync", TransactionPhase::None, false),
        ("tx", TransactionPhase::AfterSuccess, false),
        ("async", TransactionPhase::None, true),
    ] {
        for n in 1..=3 {
            let log = Arc::clone(&log);
            let id = format!("{}-{}", group, n);
            let entry = id.clone();
            let mut builder = ObserverFn::builder(id, EventType::named("DomainEvent")).during(phase);
            if asynchronous {
                builder = builder.asynchronous();
            }
            registry
                .register(Arc::new(builder.handler(move |_, _| {
                    record(&log, entry.clone());
                    Ok(())
                })))
                .unwrap();
        }
    }

    let notifier = ObserverNotifier::strict(order_types(), registry);
    for _ in 0..3 {
        log.lock().clear();
        notifier
            .fire_async(Arc::new(OrderPlaced { id: 1 }), None, &[], None)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(
            *log.lock(),
            vec!["sync-1", "sync-2", "sync-3", "tx-1", "tx-2", "tx-3", "async-1", "async-2", "async-3"]
        );
    }
    assert_eq!(notifier.cached_resolutions(), 1);
}

#[derive(Debug, thiserror::Error)]
#[error("payment declined for order {0}")]
struct PaymentDeclined(u64);

#[test]
fn test_sync_failure_propagates_unchanged() {
    let registry = Arc::new(ObserverRegistry::new());
    let log: Log = Arc::default();
    registry.register(Arc::new(observer("O1", "OrderPlaced", &log))).unwrap();
    registry
        .register(Arc::new(ObserverFn::builder("O2", EventType::named("OrderPlaced")).typed::<OrderPlaced, _>(
            |order, _| Err(PaymentDeclined(order.id).into()),
        )))
        .unwrap();
    registry.register(Arc::new(observer("O3", "OrderPlaced", &log))).unwrap();

    let notifier = ObserverNotifier::strict(order_types(), registry);
    let err = notifier.fire_event(&OrderPlaced { id: 77 }, None, &[]).unwrap_err();

    let NotifierError::ObserverFailed(failure) = err else {
        panic!("expected an observer failure");
    };
    assert_eq!(failure.observer_id(), "O2");
    let source = failure.into_source();
    assert_eq!(source.downcast_ref::<PaymentDeclined>().map(|p| p.0), Some(77));
    assert_eq!(*log.lock(), vec!["O1"]);
}

#[tokio::test]
async fn test_async_failures_surface_through_future() {
    let registry = Arc::new(ObserverRegistry::new());
    let log: Log = Arc::default();
    registry
        .register(Arc::new(
            ObserverFn::builder("O1", EventType::named("OrderPlaced"))
                .asynchronous()
                .handler({
                    let log = Arc::clone(&log);
                    move |_, _| {
                        record(&log, "O1");
                        Ok(())
                    }
                }),
        ))
        .unwrap();
    registry
        .register(Arc::new(
            ObserverFn::builder("O2", EventType::named("OrderPlaced"))
                .asynchronous()
                .typed::<OrderPlaced, _>(|order, _| Err(PaymentDeclined(order.id).into())),
        ))
        .unwrap();
    registry
        .register(Arc::new(
            ObserverFn::builder("O3", EventType::named("OrderPlaced"))
                .asynchronous()
                .handler({
                    let log = Arc::clone(&log);
                    move |_, _| {
                        record(&log, "O3");
                        Ok(())
                    }
                }),
        ))
        .unwrap();

    let notifier = ObserverNotifier::strict(order_types(), registry);
    let err = notifier
        .fire_async(Arc::new(OrderPlaced { id: 5 }), None, &[], None)
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(*log.lock(), vec!["O1", "O3"]);
    match &err {
        AsyncDeliveryError::ObserverFailures { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].observer_id(), "O2");
            assert!(failures[0].cause().downcast_ref::<PaymentDeclined>().is_some());
        }
        AsyncDeliveryError::Abandoned => panic!("delivery abandoned"),
    }
}

#[test]
fn test_strict_rejection_of_unresolved_batch() {
    let registry = Arc::new(ObserverRegistry::new());
    let log: Log = Arc::default();
    registry.register(Arc::new(observer("domain", "DomainEvent", &log))).unwrap();
    let notifier = ObserverNotifier::strict(order_types(), registry);

    notifier
        .fire_event(&Batch { of: EventType::named("OrderPlaced") }, None, &[])
        .unwrap();
    assert_eq!(log.lock().len(), 1);

    let unresolved = EventType::generic("Batch", vec![TypeArg::Wildcard]);
    let err = notifier
        .fire_event_as(&unresolved, &Batch { of: EventType::object() }, None, &[])
        .unwrap_err();
    assert!(matches!(err, NotifierError::InvalidEventType(_)));
    assert_eq!(log.lock().len(), 1);
}

/// Observer that counts resolution scans
struct ScanCounter {
    scans: Arc<AtomicUsize>,
}

impl ObserverMethod for ScanCounter {
    fn id(&self) -> &str {
        "scan-counter"
    }

    fn matches(&self, key: &ResolvableKey) -> bool {
        self.scans.fetch_add(1, Ordering::SeqCst);
        key.has_type_accepted_by(&EventType::named("DomainEvent"))
    }

    fn notify(&self, _event: &dyn Event, _metadata: Option<&EventMetadata>) -> Result<(), eventwire::event::BoxError> {
        Ok(())
    }
}

#[test]
fn test_concurrent_first_resolution_computes_once() {
    let registry = Arc::new(ObserverRegistry::new());
    let scans = Arc::new(AtomicUsize::new(0));
    registry.register(Arc::new(ScanCounter { scans: Arc::clone(&scans) })).unwrap();
    let notifier = Arc::new(ObserverNotifier::strict(order_types(), registry));

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let notifier = Arc::clone(&notifier);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                notifier
                    .resolve_observer_methods(&EventType::named("OrderPlaced"), &[])
                    .unwrap()
                    .len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(scans.load(Ordering::SeqCst), 1);
}

#[test]
fn test_configured_notifier_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("eventwire.toml");
    fs::write(
        &config_path,
        r#"
[notifier]
strict = true
reserved-event-types = "DomainEvent"

[executor]
threads = 2
thread-name = "e2e-async"
"#,
    )
    .unwrap();

    let manager = ConfigManager::load_from_file(config_path).unwrap();
    let config = manager.get_notifier_config().unwrap();

    let registry = Arc::new(ObserverRegistry::new());
    let names = Arc::new(Mutex::new(Vec::new()));
    {
        let names = Arc::clone(&names);
        registry
            .register(Arc::new(
                ObserverFn::builder("named", EventType::named("Heartbeat"))
                    .asynchronous()
                    .handler(move |_, _| {
                        names.lock().push(thread::current().name().unwrap_or_default().to_string());
                        Ok(())
                    }),
            ))
            .unwrap();
    }

    let notifier = ObserverNotifier::builder(order_types(), registry)
        .with_config(&config)
        .unwrap()
        .build();

    // OrderPlaced is now assignable to a reserved type
    assert!(matches!(
        notifier.fire_event(&OrderPlaced { id: 1 }, None, &[]),
        Err(NotifierError::InvalidEventType(_))
    ));

    #[derive(Debug)]
    struct Heartbeat;
    impl Event for Heartbeat {
        fn event_type(&self) -> EventType {
            EventType::named("Heartbeat")
        }
    }
    tokio_test::block_on(notifier.fire_async(Arc::new(Heartbeat), None, &[], None).unwrap()).unwrap();
    assert!(names.lock()[0].starts_with("e2e-async-"));
}
