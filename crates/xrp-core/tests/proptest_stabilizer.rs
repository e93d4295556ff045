//! Property tests for burst stabilization.

use std::time::{Duration, Instant};

use proptest::prelude::*;
use xrp_core::stabilizer::{StabilizerConfig, StableValue};

const DELAY_MS: u64 = 1000;

proptest! {
    /// A burst of sets spaced closer than the delay promotes exactly once,
    /// to the final value, `delay` after the last set.
    #[test]
    fn burst_promotes_once_to_final_value(
        steps in proptest::collection::vec((1u32..100, 0u64..DELAY_MS), 1..20)
    ) {
        let mut stab = StableValue::new(0u32, StabilizerConfig::default());
        let start = Instant::now();
        let mut at = start;
        let mut tokens = Vec::new();

        for (value, gap) in &steps {
            at += Duration::from_millis(*gap);
            tokens.push((stab.set(*value, at), at));
            // Every earlier timer fires while the burst is still going.
            for (token, set_at) in &tokens[..tokens.len() - 1] {
                let fire = *set_at + Duration::from_millis(DELAY_MS);
                if fire <= at {
                    prop_assert_eq!(stab.settle(*token, fire), None);
                }
            }
        }

        let last_value = steps[steps.len() - 1].0;
        let (last_token, last_at) = tokens[tokens.len() - 1];
        let fire = last_at + Duration::from_millis(DELAY_MS);

        prop_assert_eq!(stab.settle(last_token, fire - Duration::from_millis(1)), None);
        prop_assert_eq!(stab.settle(last_token, fire).copied(), Some(last_value));
        prop_assert_eq!(stab.promotion_count(), 1);
        for (token, _) in &tokens {
            prop_assert_eq!(stab.settle(*token, fire + Duration::from_secs(10)), None);
        }
    }
}
