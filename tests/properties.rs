//! Property tests for counting expectation invariants.

use proptest::prelude::*;
use testkit_wait::{Error, WaitCoordinator};

proptest! {
    #[test]
    fn fulfilled_exactly_at_target(expected in 1usize..20, calls in 0usize..40) {
        let coordinator = WaitCoordinator::new();
        let expectation = coordinator
            .counting("bounded")
            .with_expected_fulfillment_count(expected);

        let mut previous = 0;
        for call in 1..=calls {
            let result = expectation.fulfill();
            if call <= expected {
                prop_assert!(result.is_ok());
            } else {
                let is_already_fulfilled = matches!(result, Err(Error::AlreadyFulfilled { .. }));
                prop_assert!(is_already_fulfilled);
            }
            let count = expectation.fulfillment_count();
            prop_assert!(count >= previous);
            previous = count;
            prop_assert_eq!(expectation.is_fulfilled(), call >= expected);
        }
        prop_assert_eq!(expectation.fulfillment_count(), calls.min(expected));
    }

    #[test]
    fn lenient_mode_counts_past_target(expected in 1usize..10, calls in 0usize..30) {
        let coordinator = WaitCoordinator::new();
        let expectation = coordinator
            .counting("lenient")
            .with_expected_fulfillment_count(expected)
            .with_assert_for_over_fulfill(false);

        for _ in 0..calls {
            prop_assert!(expectation.fulfill().is_ok());
        }
        prop_assert_eq!(expectation.fulfillment_count(), calls);
        prop_assert_eq!(expectation.is_fulfilled(), calls >= expected);
    }

    #[test]
    fn zero_target_always_invalid(assert_over in any::<bool>(), calls in 1usize..10) {
        let coordinator = WaitCoordinator::new();
        let expectation = coordinator
            .counting("misconfigured")
            .with_expected_fulfillment_count(0)
            .with_assert_for_over_fulfill(assert_over);

        for _ in 0..calls {
            let is_invalid = matches!(expectation.fulfill(), Err(Error::InvalidConfiguration(_)));
            prop_assert!(is_invalid);
        }
        prop_assert_eq!(expectation.fulfillment_count(), 0);
        prop_assert!(!expectation.is_fulfilled());
    }
}
