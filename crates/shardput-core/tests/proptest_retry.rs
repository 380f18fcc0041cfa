//! Property-based tests for retry backoff invariants.
//!
//! Validates:
//! 1. Delay exponential growth (no jitter): delay(n+1) >= delay(n)
//! 2. Delay capped at max_delay (no jitter)
//! 3. Delay at attempt 0 = initial_delay (no jitter)
//! 4. Delay deterministic with zero jitter
//! 5. Delay jitter bounded: within ±jitter_percent of base
//! 6. Delay exponent capped at 31
//! 7. RetryPolicy::new clamps its inputs
//! 8. Default jitter keeps growth strictly increasing below the cap
//! 9. Delay capped at max_delay with jitter
//! 10. Validated policies grow strictly below the cap

use std::time::Duration;

use proptest::prelude::*;

use shardput_core::retry::{MAX_JITTER_PERCENT, RetryPolicy};

// =============================================================================
// Strategies
// =============================================================================

fn arb_initial_delay_ms() -> impl Strategy<Value = u64> {
    1_u64..10_000
}

fn arb_max_delay_ms() -> impl Strategy<Value = u64> {
    1000_u64..100_000
}

fn arb_backoff_factor() -> impl Strategy<Value = f64> {
    1.0_f64..5.0
}

fn arb_attempt() -> impl Strategy<Value = u32> {
    0_u32..50
}

fn arb_no_jitter_policy() -> impl Strategy<Value = RetryPolicy> {
    (
        arb_initial_delay_ms(),
        arb_max_delay_ms(),
        arb_backoff_factor(),
    )
        .prop_filter("max >= initial", |(init, max, _)| max >= init)
        .prop_map(|(init, max, factor)| RetryPolicy {
            initial_delay: Duration::from_millis(init),
            max_delay: Duration::from_millis(max),
            backoff_factor: factor,
            jitter_percent: 0.0,
            max_attempts: 10,
        })
}

fn arb_jitter_policy() -> impl Strategy<Value = RetryPolicy> {
    (
        arb_initial_delay_ms(),
        arb_max_delay_ms(),
        arb_backoff_factor(),
        0.01_f64..MAX_JITTER_PERCENT,
    )
        .prop_filter("max >= initial", |(init, max, _, _)| max >= init)
        .prop_map(|(init, max, factor, jitter)| RetryPolicy {
            initial_delay: Duration::from_millis(init),
            max_delay: Duration::from_millis(max),
            backoff_factor: factor,
            jitter_percent: jitter,
            max_attempts: 10,
        })
}

// =============================================================================
// Property: Delay monotonic growth (no jitter)
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn delay_monotonic_no_jitter(policy in arb_no_jitter_policy()) {
        let mut prev = policy.delay_for_attempt(0);
        for attempt in 1..15_u32 {
            let curr = policy.delay_for_attempt(attempt);
            prop_assert!(curr >= prev,
                "delay not monotonic: attempt {} delay {:?} < attempt {} delay {:?}",
                attempt, curr, attempt - 1, prev);
            prev = curr;
        }
    }
}

// =============================================================================
// Property: Delay capped at max_delay (no jitter)
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn delay_capped_no_jitter(
        policy in arb_no_jitter_policy(),
        attempt in arb_attempt(),
    ) {
        let delay = policy.delay_for_attempt(attempt);
        prop_assert!(delay <= policy.max_delay,
            "delay {:?} exceeds max {:?} at attempt {}", delay, policy.max_delay, attempt);
    }
}

// =============================================================================
// Property: Delay at attempt 0 = initial_delay (no jitter)
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn delay_at_attempt_zero(policy in arb_no_jitter_policy()) {
        prop_assert_eq!(policy.delay_for_attempt(0), policy.initial_delay);
    }

    #[test]
    fn delay_deterministic_no_jitter(
        policy in arb_no_jitter_policy(),
        attempt in arb_attempt(),
    ) {
        prop_assert_eq!(policy.delay_for_attempt(attempt), policy.delay_for_attempt(attempt));
    }
}

// =============================================================================
// Property: Jitter bounded
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn delay_jitter_bounded(
        policy in arb_jitter_policy(),
        attempt in arb_attempt(),
    ) {
        let mut base = policy.clone();
        base.jitter_percent = 0.0;
        let base_ms = base.delay_for_attempt(attempt).as_millis() as f64;
        let delay_ms = policy.delay_for_attempt(attempt).as_millis() as f64;
        let slack = base_ms * policy.jitter_percent + 2.0;
        prop_assert!((delay_ms - base_ms).abs() <= slack,
            "delay {}ms strays more than {}ms from base {}ms", delay_ms, slack, base_ms);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn delay_capped_with_jitter(
        policy in arb_jitter_policy(),
        attempt in arb_attempt(),
    ) {
        let delay = policy.delay_for_attempt(attempt);
        prop_assert!(delay <= policy.max_delay,
            "jittered delay {:?} exceeds max {:?} at attempt {}",
            delay, policy.max_delay, attempt);
    }
}

// =============================================================================
// Property: Validated policies grow strictly below the cap
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn validated_policy_grows_strictly(
        initial_ms in 100_u64..1_000,
        factor in 1.0_f64..4.0,
        jitter in 0.0_f64..MAX_JITTER_PERCENT,
        attempt in 0_u32..4,
    ) {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_secs(3600),
            backoff_factor: factor,
            jitter_percent: jitter,
            max_attempts: 5,
        };
        prop_assume!(policy.validate().is_ok());
        // Millisecond truncation needs a little room above the floor.
        prop_assume!(factor * (1.0 - jitter) >= (1.0 + jitter) * 1.05);
        let earlier = policy.delay_for_attempt(attempt);
        let later = policy.delay_for_attempt(attempt + 1);
        prop_assert!(later > earlier, "{:?} then {:?}", earlier, later);
    }
}

// =============================================================================
// Property: Exponent capped at 31
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn delay_exponent_capped(
        policy in arb_no_jitter_policy(),
        attempt in 31_u32..10_000,
    ) {
        prop_assert_eq!(policy.delay_for_attempt(attempt), policy.delay_for_attempt(31));
    }
}

// =============================================================================
// Property: RetryPolicy::new clamps inputs
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn new_clamps_inputs(
        factor in -10.0_f64..10.0,
        jitter in -2.0_f64..2.0,
        attempts in 0_u32..20,
    ) {
        let policy = RetryPolicy::new(
            Duration::from_millis(10),
            Duration::from_secs(1),
            factor,
            jitter,
            attempts,
        );
        prop_assert!(policy.backoff_factor >= 1.0);
        prop_assert!((0.0..=MAX_JITTER_PERCENT).contains(&policy.jitter_percent));
        prop_assert!(policy.max_attempts >= 1);
        prop_assert!(policy.validate().is_ok());
    }
}

// =============================================================================
// Property: Default policy grows strictly below the cap
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn default_policy_strictly_increasing_below_cap(attempt in 0_u32..5) {
        let policy = RetryPolicy::default();
        let earlier = policy.delay_for_attempt(attempt);
        let later = policy.delay_for_attempt(attempt + 1);
        // 100ms * 2^5 = 3.2s, still under the 5s cap.
        prop_assert!(later > earlier, "{:?} then {:?}", earlier, later);
    }
}
