#[cfg(test)]
mod tests {
    use crate::block::{contiguous_block, slots_needed};
    use crate::pricing::{format_amount, parse_amount, price_cents};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use coachbook_common::models::Slot;
    use proptest::prelude::*;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 13, 0, 0).unwrap()
    }

    // A run of quarter-hour slots from the anchor with the given taken flags.
    fn run(taken: &[bool]) -> Vec<Slot> {
        taken
            .iter()
            .enumerate()
            .map(|(i, is_taken)| Slot {
                id: i as i64 + 1,
                start_time: anchor() + Duration::minutes(15 * i as i64),
                duration_min: 15,
                is_taken: *is_taken,
                hold_until: None,
                hold_key: None,
            })
            .collect()
    }

    proptest! {
        // A resolved block has exactly the needed number of ids, in order.
        #[test]
        fn block_is_all_or_nothing(live_minutes in 1..240i64, extra in 0..3usize) {
            let need = slots_needed(live_minutes, 15);
            let slots = run(&vec![false; need + extra]);
            let window = &slots[..need];
            let block = contiguous_block(anchor(), window, live_minutes, 15);
            let expected: Vec<i64> = (1..=need as i64).collect();
            prop_assert_eq!(block, Some(expected));

            // Too few candidates never resolves.
            if need > 1 {
                prop_assert!(contiguous_block(anchor(), &slots[..need - 1], live_minutes, 15).is_none());
            }
        }

        // Any taken slot inside the window makes the whole block unavailable.
        #[test]
        fn taken_slot_blocks_everything(live_minutes in 15..180i64, pick in any::<prop::sample::Index>()) {
            let need = slots_needed(live_minutes, 15);
            let mut taken = vec![false; need];
            taken[pick.index(need)] = true;
            prop_assert!(contiguous_block(anchor(), &run(&taken), live_minutes, 15).is_none());
        }

        // Longer sessions and more follow-ups never get cheaper.
        #[test]
        fn price_is_monotonic(minutes in 1..600i64, followups in 0..10i64, more in 0..60i64) {
            let base = price_cents(minutes, followups);
            prop_assert!(price_cents(minutes + more, followups) >= base);
            prop_assert!(price_cents(minutes, followups + 1) > base);
            prop_assert!(base >= 5000);
        }

        #[test]
        fn formatted_amount_parses_back(cents in 0..10_000_000i64) {
            prop_assert_eq!(parse_amount(&format_amount(cents)), Some(cents));
        }
    }
}
