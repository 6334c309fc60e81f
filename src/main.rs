use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use eventwire::cli::{self, Args, Scenario};
use eventwire::config::{ConfigManager, EngineConfig};
use eventwire::event::{
    Event, EventMetadata, EventType, NotifierStats, ObserverFn, ObserverNotifier, ObserverRegistry, Qualifier,
    TypeRegistry,
};
use eventwire::interceptor::{
    downcast_value, value, InterceptionChain, InterceptionError, InterceptionModel, InterceptionType,
    InterceptorClassMetadata, InvocationContext, InvocationResult, TargetClassInterceptorMetadata,
};
use eventwire::logging;

#[derive(Debug)]
struct OrderPlaced {
    id: u64,
    total_cents: u64,
}

impl Event for OrderPlaced {
    fn event_type(&self) -> EventType {
        EventType::named("OrderPlaced")
    }
}

fn main() {
    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let engine = load_engine_config(&args)?;
    logging::init_logger(engine.log_config())?;
    info!("eventwire {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    if matches!(args.scenario, Scenario::Orders | Scenario::All) {
        let stats = runtime.block_on(run_orders(&engine))?;
        print_stats(&stats);
    }
    if matches!(args.scenario, Scenario::Interception | Scenario::All) {
        run_interception()?;
    }
    Ok(())
}

fn load_engine_config(args: &Args) -> Result<EngineConfig> {
    let manager = match &args.config_file {
        Some(path) => ConfigManager::load_from_file(path.clone())?,
        None => ConfigManager::load()?,
    };
    args.apply_to(manager.get_engine_config()?)
}

async fn run_orders(engine: &EngineConfig) -> Result<NotifierStats> {
    let types = Arc::new(TypeRegistry::new().with_type("OrderPlaced", vec![EventType::named("DomainEvent")]));
    let observers = Arc::new(ObserverRegistry::new());

    observers.register(Arc::new(
        ObserverFn::builder("A:reserve-stock", EventType::named("OrderPlaced"))
            .qualifier(Qualifier::default_qualifier())
            .typed::<OrderPlaced, _>(|order, _| {
                println!("[sync ] reserving stock for order {}", order.id);
                Ok(())
            }),
    ))?;
    observers.register(Arc::new(
        ObserverFn::builder("B:send-receipt", EventType::named("OrderPlaced"))
            .qualifier(Qualifier::default_qualifier())
            .asynchronous()
            .with_metadata()
            .typed::<OrderPlaced, _>(|order, metadata| {
                let qualifiers = metadata.map(|m| m.qualifiers().len()).unwrap_or_default();
                println!(
                    "[async] sending receipt for order {} on {:?} ({} qualifiers)",
                    order.id,
                    std::thread::current().name().unwrap_or("worker"),
                    qualifiers
                );
                Ok(())
            }),
    ))?;
    observers.register(Arc::new(
        ObserverFn::builder("C:update-ledger", EventType::named("DomainEvent"))
            .asynchronous()
            .typed::<OrderPlaced, _>(|order, _| {
                println!("[async] booking {} cents for order {}", order.total_cents, order.id);
                Ok(())
            }),
    ))?;

    let notifier = ObserverNotifier::builder(types, observers)
        .with_config(&engine.notifier)?
        .build();
    match engine.notifier.executor.threads {
        Some(threads) => info!("Async delivery on a dedicated pool of {} threads", threads),
        None => info!("Async delivery on the shared pool ({} cpus)", num_cpus::get()),
    }

    let qualifiers = [Qualifier::default_qualifier()];
    for id in 1..=3 {
        let event = Arc::new(OrderPlaced {
            id,
            total_cents: 1250 * id,
        });
        let metadata = EventMetadata::new(event.event_type(), &qualifiers).with_injection_point("Checkout.placed");
        let delivery = notifier.fire_async(event, Some(metadata), &qualifiers, None)?;
        match delivery.await {
            Ok(event) => info!("Delivered {:?}", event),
            Err(e) => warn!("Async delivery failed: {}", e),
        }
    }

    // Type variables are rejected before any observer runs
    #[derive(Debug)]
    struct Unresolved;
    impl Event for Unresolved {
        fn event_type(&self) -> EventType {
            EventType::generic("Envelope", vec![eventwire::event::TypeArg::Variable("T".to_string())])
        }
    }
    if let Err(e) = notifier.fire_event(&Unresolved, None, &[]) {
        println!("[check] {}", e);
    }

    Ok(notifier.stats())
}

fn print_stats(stats: &NotifierStats) {
    println!(
        "Events: {} | Async deliveries: {} | Notifications: {} | Failures: {}",
        stats.events_fired, stats.async_deliveries, stats.observer_notifications, stats.observer_failures
    );
}

struct PricingService {
    discount_percent: u64,
}

fn run_interception() -> Result<()> {
    let model = InterceptionModel::new()
        .bind_class(
            InterceptorClassMetadata::new("Audit")
                .around_invoke(|ctx| {
                    println!("[audit] entering {}", ctx.method().unwrap_or("?"));
                    let result = ctx.proceed();
                    let outcome = if result.is_ok() { "ok" } else { "failed" };
                    println!("[audit] leaving {} ({})", ctx.method().unwrap_or("?"), outcome);
                    result
                })
                .post_construct(|| {
                    println!("[audit] pricing service constructed");
                    Ok(())
                }),
        )
        .bind_method(
            "quote",
            InterceptorClassMetadata::new("Validation").around_invoke(|ctx| {
                let cents = *ctx
                    .parameter::<u64>(0)
                    .ok_or_else(|| InterceptionError::failure("quote takes an amount in cents"))?;
                if cents == 0 {
                    return Err(InterceptionError::failure("cannot quote an empty order"));
                }
                ctx.proceed()
            }),
        )
        .with_target_class(TargetClassInterceptorMetadata::new(
            InterceptorClassMetadata::new("PricingService").pre_destroy(|| {
                println!("[self ] releasing price tables");
                Ok(())
            }),
        ));

    let service: Arc<dyn std::any::Any + Send + Sync> = Arc::new(PricingService { discount_percent: 10 });

    InterceptionChain::build(&model, InterceptionType::PostConstruct, None)
        .invoke(Some(Arc::clone(&service)), None, Vec::new())
        .context("Post-construct callbacks failed")?;

    let quote = InterceptionChain::build(&model, InterceptionType::AroundInvoke, Some("quote")).with_completion(
        |ctx: &mut InvocationContext| -> InvocationResult {
            let service = ctx
                .target_as::<PricingService>()
                .ok_or_else(|| InterceptionError::failure("missing pricing service"))?;
            let cents = ctx.parameter::<u64>(0).copied().unwrap_or_default();
            Ok(value(cents * (100 - service.discount_percent) / 100))
        },
    );

    for cents in [2500u64, 0] {
        match quote.invoke(Some(Arc::clone(&service)), Some("quote"), vec![Box::new(cents)]) {
            Ok(result) => println!("[quote] {} -> {:?}", cents, downcast_value::<u64>(result)),
            Err(e) => println!("[quote] {} rejected: {}", cents, e),
        }
    }

    InterceptionChain::build(&model, InterceptionType::PreDestroy, None)
        .invoke(Some(service), None, Vec::new())
        .context("Pre-destroy callbacks failed")?;
    Ok(())
}
