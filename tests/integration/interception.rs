//! Interception Integration Tests
//!
//! Chains built from component models and run through the public API,
//! including lifecycle callbacks, shared context data and scope propagation
//! to other threads.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use eventwire::interceptor::context;
use eventwire::interceptor::{
    downcast_value, returning, value, InterceptionChain, InterceptionError, InterceptionModel, InterceptionScope,
    InterceptionType, InterceptorClassMetadata, InvocationContext, InvocationResult, TargetClassInterceptorMetadata,
};

type Trace = Arc<Mutex<Vec<String>>>;

struct Inventory {
    stock: u32,
}

fn tracing_interceptor(name: &'static str, trace: &Trace) -> InterceptorClassMetadata {
    let around = Arc::clone(trace);
    let constructed = Arc::clone(trace);
    InterceptorClassMetadata::new(name)
        .around_invoke(move |ctx| {
            around.lock().push(format!("{}:before", name));
            let result = ctx.proceed();
            around.lock().push(format!("{}:after", name));
            result
        })
        .post_construct(move || {
            constructed.lock().push(format!("{}:constructed", name));
            Ok(())
        })
}

fn inventory_model(trace: &Trace) -> InterceptionModel {
    let own = Arc::clone(trace);
    let destroyed = Arc::clone(trace);
    InterceptionModel::new()
        .bind_class(tracing_interceptor("Metrics", trace))
        .bind_class(tracing_interceptor("Tx", trace))
        .bind_method("reserve", tracing_interceptor("Quota", trace))
        .with_target_class(TargetClassInterceptorMetadata::new(
            InterceptorClassMetadata::new("Inventory")
                .around_invoke(move |ctx| {
                    own.lock().push("Inventory:self".to_string());
                    ctx.proceed()
                })
                .pre_destroy(move || {
                    destroyed.lock().push("Inventory:destroyed".to_string());
                    Ok(())
                }),
        ))
}

fn reserve_completion(ctx: &mut InvocationContext) -> InvocationResult {
    let inventory = ctx
        .target_as::<Inventory>()
        .ok_or_else(|| InterceptionError::failure("no inventory target"))?;
    let wanted = *ctx
        .parameter::<u32>(0)
        .ok_or_else(|| InterceptionError::failure("reserve takes a quantity"))?;
    if wanted > inventory.stock {
        return Err(InterceptionError::failure(format!("only {} in stock", inventory.stock)));
    }
    Ok(value(inventory.stock - wanted))
}

#[test]
fn test_method_chain_runs_in_binding_order() {
    let trace: Trace = Arc::default();
    let model = inventory_model(&trace);
    let chain = InterceptionChain::build(&model, InterceptionType::AroundInvoke, Some("reserve"))
        .with_completion(reserve_completion);
    assert_eq!(chain.len(), 4);

    let result = chain
        .invoke(Some(Arc::new(Inventory { stock: 10 })), Some("reserve"), vec![Box::new(3u32)])
        .unwrap();
    assert_eq!(downcast_value::<u32>(result), Some(7));
    assert_eq!(
        *trace.lock(),
        vec![
            "Metrics:before",
            "Tx:before",
            "Quota:before",
            "Inventory:self",
            "Quota:after",
            "Tx:after",
            "Metrics:after",
        ]
    );
}

#[test]
fn test_method_bindings_do_not_leak_to_other_methods() {
    let trace: Trace = Arc::default();
    let model = inventory_model(&trace);
    let chain = InterceptionChain::build(&model, InterceptionType::AroundInvoke, Some("restock"))
        .with_completion(returning(()));

    chain.invoke(None, Some("restock"), Vec::new()).unwrap();
    assert!(!trace.lock().iter().any(|entry| entry.starts_with("Quota")));
    assert_eq!(chain.len(), 3);
}

#[test]
fn test_lifecycle_callbacks_run_without_target_call() {
    let trace: Trace = Arc::default();
    let model = inventory_model(&trace);

    let constructed = InterceptionChain::build(&model, InterceptionType::PostConstruct, None)
        .invoke(Some(Arc::new(Inventory { stock: 1 })), None, Vec::new())
        .unwrap();
    assert!(constructed.is_none());
    assert_eq!(*trace.lock(), vec!["Metrics:constructed", "Tx:constructed"]);

    trace.lock().clear();
    InterceptionChain::build(&model, InterceptionType::PreDestroy, None)
        .invoke(None, None, Vec::new())
        .unwrap();
    assert_eq!(*trace.lock(), vec!["Inventory:destroyed"]);
}

#[test]
fn test_parameters_rewritten_before_target() {
    let clamp = InterceptorClassMetadata::new("Clamp").around_invoke(|ctx| {
        let wanted = ctx.parameter::<u32>(0).copied().unwrap_or_default();
        ctx.set_parameters(vec![Box::new(wanted.min(5))]);
        ctx.proceed()
    });
    let chain = InterceptionChain::from_interceptors(&[clamp], InterceptionType::AroundInvoke)
        .with_completion(reserve_completion);

    let result = chain
        .invoke(Some(Arc::new(Inventory { stock: 8 })), Some("reserve"), vec![Box::new(50u32)])
        .unwrap();
    assert_eq!(downcast_value::<u32>(result), Some(3));
}

#[test]
fn test_context_data_scoped_to_one_call() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let writer = InterceptorClassMetadata::new("Writer").around_invoke(|ctx| {
        let calls = ctx.data::<u32>("calls").copied().unwrap_or_default();
        ctx.set_data("calls", calls + 1);
        ctx.proceed()
    });
    let reader = {
        let seen = Arc::clone(&seen);
        InterceptorClassMetadata::new("Reader").around_invoke(move |ctx| {
            seen.lock().push(ctx.data::<u32>("calls").copied());
            ctx.proceed()
        })
    };
    let chain = InterceptionChain::from_interceptors(&[writer, reader], InterceptionType::AroundInvoke)
        .with_completion(returning(()));

    chain.invoke(None, None, Vec::new()).unwrap();
    chain.invoke(None, None, Vec::new()).unwrap();
    assert_eq!(*seen.lock(), vec![Some(1), Some(1)]);
}

#[derive(Debug, thiserror::Error)]
#[error("inventory locked")]
struct Locked;

#[test]
fn test_outer_interceptor_sees_unwrapped_failure() {
    let observed = Arc::new(Mutex::new(None));
    let outer = {
        let observed = Arc::clone(&observed);
        InterceptorClassMetadata::new("Outer").around_invoke(move |ctx| {
            let result = ctx.proceed();
            if let Err(err) = &result {
                *observed.lock() = Some(err.is_wrapped());
            }
            result
        })
    };
    let inner = InterceptorClassMetadata::new("Inner")
        .around_invoke(|_| Err(InterceptionError::failure(Locked).wrap_target()));
    let chain = InterceptionChain::from_interceptors(&[outer, inner], InterceptionType::AroundInvoke);

    let err = chain.invoke(None, None, Vec::new()).unwrap_err();
    assert_eq!(*observed.lock(), Some(false));
    assert!(err.root_cause().downcast_ref::<Locked>().is_some());
}

#[test]
fn test_captured_scope_restored_on_worker_thread() {
    let scope = InterceptionScope::new("inventory-request");
    let chain = {
        let _active = context::start(scope.clone());
        let probe = InterceptorClassMetadata::new("Probe").around_invoke(|ctx| {
            let label = context::peek().map(|s| s.label().to_string());
            ctx.set_data("scope", label);
            ctx.proceed()
        });
        InterceptionChain::from_interceptors(&[probe], InterceptionType::AroundInvoke).with_completion(
            |ctx: &mut InvocationContext| -> InvocationResult {
                Ok(value(ctx.data::<Option<String>>("scope").cloned().flatten()))
            },
        )
    };
    assert!(context::is_empty());
    assert_eq!(chain.captured_scope().map(InterceptionScope::id), Some(scope.id()));

    let worker_chain = chain.clone();
    let (label, depth_after) = thread::spawn(move || {
        let result = worker_chain.invoke(None, None, Vec::new()).unwrap();
        (downcast_value::<Option<String>>(result).flatten(), context::depth())
    })
    .join()
    .unwrap();

    assert_eq!(label.as_deref(), Some("inventory-request"));
    assert_eq!(depth_after, 0);
}

#[tokio::test]
async fn test_chain_runs_on_blocking_pool() {
    let trace: Trace = Arc::default();
    let model = inventory_model(&trace);
    let chain = InterceptionChain::build(&model, InterceptionType::AroundInvoke, Some("reserve"))
        .with_completion(reserve_completion);

    let handles: Vec<_> = (1..=4u32)
        .map(|wanted| {
            let chain = chain.clone();
            tokio::task::spawn_blocking(move || {
                chain.invoke(Some(Arc::new(Inventory { stock: 4 })), Some("reserve"), vec![Box::new(wanted)])
            })
        })
        .collect();

    let mut remaining = Vec::new();
    for handle in handles {
        remaining.push(downcast_value::<u32>(handle.await.unwrap().unwrap()));
    }
    assert_eq!(remaining, vec![Some(3), Some(2), Some(1), Some(0)]);
    assert_eq!(trace.lock().len(), 4 * 7);
}
