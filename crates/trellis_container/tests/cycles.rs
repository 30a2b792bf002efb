//! Two-phase construction and cycle tests for `trellis_container`.

use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_container::prelude::*;

struct A {
    b: Mutex<Option<Arc<B>>>,
}

struct B {
    a: Mutex<Option<Arc<A>>>,
}

/// A and B each receive the other in their wirer.
fn register_mutual_pair(container: &Container) {
    container.register(
        "a",
        |_| async { Ok(A { b: Mutex::new(None) }) },
        FactoryOptions::new().with_wirer(|a: Arc<A>, resolver: Resolver| async move {
            let b = resolver.resolve::<B>("b").await?;
            *a.b.lock() = Some(b);
            Ok(())
        }),
    );
    container.register(
        "b",
        |_| async { Ok(B { a: Mutex::new(None) }) },
        FactoryOptions::new().with_wirer(|b: Arc<B>, resolver: Resolver| async move {
            let a = resolver.resolve::<A>("a").await?;
            *b.a.lock() = Some(a);
            Ok(())
        }),
    );
}

fn assert_linked(a: &Arc<A>, b: &Arc<B>) {
    let a_to_b = a.b.lock().clone().unwrap();
    let b_to_a = b.a.lock().clone().unwrap();
    assert!(Arc::ptr_eq(&a_to_b, b));
    assert!(Arc::ptr_eq(&b_to_a, a));
}

#[tokio::test]
async fn wirer_cycle_links_both_sides_starting_from_a() {
    let container = Container::new();
    register_mutual_pair(&container);

    let a = container.resolve::<A>("a").await.unwrap();
    let b = container.resolve::<B>("b").await.unwrap();
    assert_linked(&a, &b);
}

#[tokio::test]
async fn wirer_cycle_links_both_sides_starting_from_b() {
    let container = Container::new();
    register_mutual_pair(&container);

    let b = container.resolve::<B>("b").await.unwrap();
    let a = container.resolve::<A>("a").await.unwrap();
    assert_linked(&a, &b);
}

/// A builder asking for itself can never succeed.
#[tokio::test]
async fn builder_self_reference_is_circular() {
    let container = Container::new();
    container.register(
        "selfish",
        |resolver: Resolver| async move {
            let me = resolver.resolve::<u8>("selfish").await?;
            Ok(*me)
        },
        FactoryOptions::new(),
    );

    let err = container.resolve::<u8>("selfish").await.unwrap_err();
    assert!(err.is_circular());
    let ContainerError::CircularDependency { key, path } = err else {
        unreachable!()
    };
    assert_eq!(key, ServiceKey::from("selfish"));
    assert_eq!(path, vec![ServiceKey::from("selfish"), ServiceKey::from("selfish")]);
}

/// x -> y -> z -> x through builders only.
#[tokio::test]
async fn transitive_builder_cycle_is_circular() {
    let container = Container::new();
    for (key, next) in [("x", "y"), ("y", "z"), ("z", "x")] {
        container.register(
            key,
            move |resolver: Resolver| async move {
                let inner = resolver.resolve::<u32>(next).await?;
                Ok(*inner + 1)
            },
            FactoryOptions::new(),
        );
    }

    let err = container.resolve::<u32>("x").await.unwrap_err();
    let ContainerError::CircularDependency { key, path } = err else {
        panic!("expected a circular dependency");
    };
    assert_eq!(key, ServiceKey::from("x"));
    assert_eq!(
        path,
        ["x", "y", "z", "x"].map(ServiceKey::from).to_vec()
    );

    // Nothing from the failed chain stays cached.
    for key in ["x", "y", "z"] {
        assert!(!container.is_cached(key, &TagSet::new()));
    }
}

/// A wirer needing a value whose builder depends on the wirer's owner is fine
/// as long as the owner's builder has finished.
#[tokio::test]
async fn builder_may_see_raw_value_of_a_wiring_dependent() {
    struct Owner {
        helper: Mutex<Option<Arc<Helper>>>,
    }
    struct Helper {
        owner: Arc<Owner>,
    }

    let container = Container::new();
    container.register(
        "owner",
        |_| async { Ok(Owner { helper: Mutex::new(None) }) },
        FactoryOptions::new().with_wirer(|owner: Arc<Owner>, resolver: Resolver| async move {
            *owner.helper.lock() = Some(resolver.resolve::<Helper>("helper").await?);
            Ok(())
        }),
    );
    container.register(
        "helper",
        |resolver: Resolver| async move {
            Ok(Helper {
                owner: resolver.resolve::<Owner>("owner").await?,
            })
        },
        FactoryOptions::new(),
    );

    let owner = container.resolve::<Owner>("owner").await.unwrap();
    let helper = owner.helper.lock().clone().unwrap();
    assert!(Arc::ptr_eq(&helper.owner, &owner));
}

/// Once a dependent holds the raw value, a failing wirer must not lead to a
/// second build of the same service.
#[tokio::test]
async fn wiring_failure_after_sharing_the_raw_value_is_final() {
    #[derive(Debug)]
    struct Owner;
    struct Helper {
        owner: Arc<Owner>,
    }

    let container = Container::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let wirings = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&builds);
    let attempts = Arc::clone(&wirings);
    container.register(
        "owner",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Owner) }
        },
        FactoryOptions::new().with_wirer(move |_: Arc<Owner>, resolver: Resolver| {
            let attempts = Arc::clone(&attempts);
            async move {
                resolver.resolve::<Helper>("helper").await?;
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(ContainerError::custom("wiring failed"));
                }
                Ok(())
            }
        }),
    );
    container.register(
        "helper",
        |resolver: Resolver| async move {
            Ok(Helper {
                owner: resolver.resolve::<Owner>("owner").await?,
            })
        },
        FactoryOptions::new(),
    );

    let err = container.resolve::<Owner>("owner").await.unwrap_err();
    assert_eq!(err.to_string(), "wiring failed");

    // The helper kept the raw owner; the owner is never built again.
    let err = container.resolve::<Owner>("owner").await.unwrap_err();
    assert_eq!(err.to_string(), "wiring failed");
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(wirings.load(Ordering::SeqCst), 1);
    assert!(!container.is_cached("owner", &TagSet::new()));

    assert!(container.is_cached("helper", &TagSet::new()));
    let helper = container.resolve::<Helper>("helper").await.unwrap();
    let again = container.resolve::<Helper>("helper").await.unwrap();
    assert!(Arc::ptr_eq(&helper.owner, &again.owner));
}

/// A wiring failure nobody observed leaves the service buildable.
#[tokio::test]
async fn unshared_wiring_failure_is_retried_on_next_resolve() {
    let container = Container::new();
    let builds = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&builds);
    let first = Arc::new(AtomicUsize::new(0));
    container.register(
        "flaky",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(5_u8) }
        },
        FactoryOptions::new().with_wirer(move |_: Arc<u8>, _: Resolver| {
            let first = Arc::clone(&first);
            async move {
                if first.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(ContainerError::custom("not yet"));
                }
                Ok(())
            }
        }),
    );

    assert!(container.resolve::<u8>("flaky").await.is_err());
    assert_eq!(*container.resolve::<u8>("flaky").await.unwrap(), 5);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

/// Many tasks asking for the same slow service trigger a single build.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolves_build_once() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    container.register(
        "slow",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(String::from("done"))
            }
        },
        FactoryOptions::new(),
    );

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let container = container.clone();
            tokio::spawn(async move { container.resolve::<String>("slow").await })
        })
        .collect();

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

/// Two unrelated dependents of one slow service do not mistake each other
/// for a cycle.
#[tokio::test]
async fn shared_dependency_is_not_a_cycle() {
    let container = Container::new();
    container.register(
        "base",
        |_| async {
            tokio::task::yield_now().await;
            Ok(10_u32)
        },
        FactoryOptions::new(),
    );
    for key in ["left", "right"] {
        container.register(
            key,
            |resolver: Resolver| async move { Ok(*resolver.resolve::<u32>("base").await? + 1) },
            FactoryOptions::new(),
        );
    }

    let (left, right) = futures::future::join(
        container.resolve::<u32>("left"),
        container.resolve::<u32>("right"),
    )
    .await;
    assert_eq!(*left.unwrap(), 11);
    assert_eq!(*right.unwrap(), 11);
}

/// A delayed builder feeding a dependent that doubles its value.
#[tokio::test]
async fn suspended_builders_compose() {
    let container = Container::new();
    container.register(
        "delayed",
        |_| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(42_u64)
        },
        FactoryOptions::new(),
    );
    container.register(
        "doubled",
        |resolver: Resolver| async move {
            let base = resolver.resolve::<u64>("delayed").await?;
            Ok(*base * 2)
        },
        FactoryOptions::new(),
    );

    assert_eq!(*container.resolve::<u64>("doubled").await.unwrap(), 84);
}
