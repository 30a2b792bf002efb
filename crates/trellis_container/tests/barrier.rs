//! Bootstrap barrier tests for `trellis_container`.

use core::time::Duration;

use trellis_container::prelude::*;

/// A resolve issued before a pending step settles sees what the step registered.
#[tokio::test]
async fn resolve_waits_for_pending_registration() {
    let container = Container::new();
    let registrar = container.clone();
    container.pause_for(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        registrar.register_value("late", String::from("registered late"), TagSet::new());
        Ok(())
    });

    // Nothing is registered yet, but the resolve waits for the step.
    assert!(!container.contains(&ServiceKey::from("late")));
    let value = container.resolve::<String>("late").await.unwrap();
    assert_eq!(value.as_str(), "registered late");
}

/// Steps run one after the other, in the order they were added.
#[tokio::test]
async fn steps_are_sequential() {
    let container = Container::new();

    let first = container.clone();
    container.pause_for(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        first.register_value("order", vec!["first"], TagSet::new());
        Ok(())
    });

    let second = container.clone();
    container.pause_for(async move {
        // The first step already ran.
        assert!(second.contains(&ServiceKey::from("order")));
        second.register_value("count", 2_usize, TagSet::new());
        Ok(())
    });

    container.settle().await.unwrap();
    assert_eq!(container.bootstrap_steps(), 2);
    assert_eq!(*container.resolve::<usize>("count").await.unwrap(), 2);
}

/// A failed step fails every resolution that waits on it.
#[tokio::test]
async fn failed_step_poisons_resolution() {
    let container = Container::new();
    container.register_value("ready", 1_u8, TagSet::new());
    container.pause_for(async { Err(ContainerError::custom("loader exploded")) });

    let err = container.resolve::<u8>("ready").await.unwrap_err();
    assert_eq!(err.to_string(), "loader exploded");
    assert!(container.settle().await.is_err());
}

/// Resolution stalls for as long as a step is unfinished.
#[tokio::test]
async fn resolution_blocks_while_a_step_is_pending() {
    let container = Container::new();
    container.register_value("early", 5_u8, TagSet::new());
    container.pause_for(futures::future::pending());

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        container.resolve::<u8>("early"),
    )
    .await;
    assert!(timed_out.is_err());
}

/// Queued steps stay idle until something awaits the barrier.
#[tokio::test]
async fn steps_wait_until_the_barrier_is_awaited() {
    let container = Container::new();
    let registrar = container.clone();
    container.pause_for(async move {
        registrar.register_value("lazy", 1_u8, TagSet::new());
        Ok(())
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!container.contains(&ServiceKey::from("lazy")));

    container.settle().await.unwrap();
    assert!(container.contains(&ServiceKey::from("lazy")));
}
