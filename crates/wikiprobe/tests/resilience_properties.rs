//! Property-based tests for the resilient element layer.
//!
//! Every property runs on a `FakeClock` against a scripted `MockSession`,
//! so timing bounds are checked exactly without sleeping.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use std::time::Duration;
use wikiprobe::mock::{MockEffect, MockElement, MockSession, MockSessionFactory};
use wikiprobe::prelude::*;

fn strategy(index: usize) -> LocatorStrategy {
    match index % 3 {
        0 => LocatorStrategy::stable_id(format!("id-{index}")),
        1 => LocatorStrategy::accessibility_label(format!("label {index}")),
        _ => LocatorStrategy::structural_path(format!("//node[{index}]")),
    }
}

fn element_with(count: usize) -> LogicalElement {
    (1..count).fold(LogicalElement::new("target", strategy(0)), |element, i| {
        element.or(strategy(i))
    })
}

// === Resolver Property Tests ===

proptest! {
    /// The first strategy that matches wins and later ones are never queried.
    #[test]
    fn prop_first_matching_strategy_wins(
        count in 1usize..5,
        hit in 0usize..5,
        timeout_ms in 0u64..5_000,
        poll_ms in 1u64..500,
    ) {
        let hit = hit % count;
        let clock = FakeClock::shared();
        let resolver = ElementResolver::with_clock(clock.clone())
            .with_options(ResolverOptions::new().with_poll_interval(poll_ms));
        let session = MockSession::new().with_element(MockElement::new(strategy(hit)));
        let element = element_with(count);

        let handle = resolver
            .resolve(&session, &element, Duration::from_millis(timeout_ms), InteractionMode::Visible)
            .unwrap();

        prop_assert_eq!(handle.strategy(), &strategy(hit));
        for later in hit + 1..count {
            prop_assert_eq!(session.lookup_count(&strategy(later)), 0);
        }
    }

    /// A missing element fails within its timeout after probing every strategy.
    #[test]
    fn prop_not_found_is_bounded_by_timeout(
        count in 1usize..5,
        timeout_ms in 0u64..5_000,
        poll_ms in 1u64..500,
    ) {
        let clock = FakeClock::shared();
        let resolver = ElementResolver::with_clock(clock.clone())
            .with_options(ResolverOptions::new().with_poll_interval(poll_ms));
        let session = MockSession::new();
        let element = element_with(count);
        let timeout = Duration::from_millis(timeout_ms);

        let err = resolver
            .resolve(&session, &element, timeout, InteractionMode::Presence)
            .unwrap_err();

        match err {
            ProbeError::ElementNotFound { strategies_tried, .. } => {
                prop_assert_eq!(strategies_tried.len(), count);
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
        prop_assert!(clock.elapsed() <= timeout);
        prop_assert!(clock.elapsed() >= timeout.saturating_sub(Duration::from_millis(1)));
        for i in 0..count {
            prop_assert!(session.lookup_count(&strategy(i)) >= 1);
        }
    }

    /// A fixed per-strategy timeout caps the time spent on each strategy.
    #[test]
    fn prop_strategy_timeout_caps_each_strategy(
        count in 2usize..5,
        per_strategy_ms in 1u64..1_000,
        timeout_ms in 0u64..10_000,
    ) {
        let clock = FakeClock::shared();
        let resolver = ElementResolver::with_clock(clock.clone()).with_options(
            ResolverOptions::new()
                .with_poll_interval(50)
                .with_strategy_timeout(per_strategy_ms),
        );
        let session = MockSession::new();
        let timeout = Duration::from_millis(timeout_ms);

        let _ = resolver.resolve(&session, &element_with(count), timeout, InteractionMode::Presence);

        let cap = Duration::from_millis(per_strategy_ms) * u32::try_from(count).unwrap();
        prop_assert!(clock.elapsed() <= timeout.min(cap));
    }
}

// === Wait Property Tests ===

proptest! {
    /// A condition that never holds fails with the configured timeout.
    #[test]
    fn prop_false_condition_times_out(timeout_ms in 0u64..5_000, poll_ms in 1u64..1_000) {
        let clock = FakeClock::shared();
        let waiter = SettleWaiter::with_clock(clock.clone());

        let err = waiter
            .wait_until(
                WaitSpec::new("never", || Ok(false))
                    .with_timeout(Duration::from_millis(timeout_ms))
                    .with_poll_interval(Duration::from_millis(poll_ms)),
            )
            .unwrap_err();

        match err {
            ProbeError::SettleTimeout { elapsed, timeout, .. } => {
                prop_assert_eq!(timeout, Duration::from_millis(timeout_ms));
                prop_assert!(elapsed <= timeout);
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}

// === Overlay Property Tests ===

proptest! {
    /// Dismissal closes exactly the showing overlays, and a second pass closes none.
    #[test]
    fn prop_dismiss_is_idempotent(showing in proptest::collection::vec(any::<bool>(), 4)) {
        let clock = FakeClock::shared();
        let session = MockSession::new();
        let mut registry = OverlayRegistry::new();
        for (i, shown) in showing.iter().enumerate() {
            let locator = LocatorStrategy::stable_id(format!("overlay-{i}"));
            registry.push(OverlaySignature::click(LogicalElement::new(
                format!("overlay {i}"),
                locator.clone(),
            )));
            if *shown {
                session.add(MockElement::new(locator).on_click(MockEffect::RemoveSelf));
            }
        }
        let dismisser = OverlayDismisser::new(
            ElementResolver::with_clock(clock.clone()),
            SettleWaiter::with_clock(clock.clone()),
            registry,
        );

        let expected = showing.iter().filter(|s| **s).count();
        prop_assert_eq!(dismisser.dismiss_all(&session), expected);
        prop_assert_eq!(dismisser.dismiss_all(&session), 0);
        prop_assert_eq!(session.call_count("click:"), expected);
    }
}

// === Runner Property Tests ===

proptest! {
    /// Every created session is closed exactly once, whatever the outcome.
    #[test]
    fn prop_runner_closes_every_session(max_attempts in 1u32..6, failures in 0u32..8) {
        let clock = FakeClock::shared();
        let runner = RetryingOperationRunner::with_clock(clock.clone());
        let mut factory = MockSessionFactory::new();
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(100));
        let mut calls = 0;

        let outcome = runner.run(
            &mut factory,
            |_session| {
                calls += 1;
                if calls <= failures {
                    Err(DriverError::InvalidSession("crashed".into()).into())
                } else {
                    Ok(calls)
                }
            },
            &policy,
        );

        let expected_attempts = (failures + 1).min(max_attempts);
        prop_assert_eq!(factory.created_count(), expected_attempts);
        prop_assert_eq!(factory.closed_count(), expected_attempts);
        if failures < max_attempts {
            prop_assert_eq!(outcome.unwrap(), failures + 1);
        } else {
            let is_exhausted = matches!(
                outcome,
                Err(ProbeError::ExhaustedFailure { attempts, .. }) if attempts == max_attempts
            );
            prop_assert!(is_exhausted);
        }
        prop_assert_eq!(
            clock.elapsed(),
            Duration::from_millis(100) * (expected_attempts - 1)
        );
    }

    /// Refused session creations consume attempts but leave nothing to close.
    #[test]
    fn prop_factory_failures_consume_attempts(max_attempts in 1u32..6, refused in 0u32..8) {
        let clock = FakeClock::shared();
        let runner = RetryingOperationRunner::with_clock(clock.clone());
        let mut factory = MockSessionFactory::failing_first(refused);

        let outcome = runner.run(&mut factory, |_session| Ok(()), &RetryPolicy::new(max_attempts, Duration::ZERO));

        prop_assert_eq!(outcome.is_ok(), refused < max_attempts);
        prop_assert_eq!(factory.created_count(), (refused + 1).min(max_attempts));
        prop_assert_eq!(factory.closed_count(), u32::from(refused < max_attempts));
    }
}
