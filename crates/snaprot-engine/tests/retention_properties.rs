//! Property-based tests for the keep-newest-N retention plan.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use snaprot_engine::{plan_retention, Snapshot};
use std::collections::HashSet;

fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

/// Histories with unique ids; start times drawn from a small range so that
/// ties are common.
fn arb_history() -> impl Strategy<Value = Vec<Snapshot>> {
    prop::collection::vec(0i64..20, 0..24).prop_map(|offsets| {
        offsets
            .into_iter()
            .enumerate()
            .map(|(i, offset)| Snapshot {
                snapshot_id: format!("snap-{i:04}"),
                volume_id: "vol-1".to_string(),
                start_time: at(offset),
                state: None,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn candidate_count_is_excess_over_retention(history in arb_history(), retain in 0usize..30) {
        let total = history.len();
        let plan = plan_retention(history, retain);

        prop_assert_eq!(plan.delete.len(), total.saturating_sub(retain));
        prop_assert_eq!(plan.keep.len(), total.min(retain));
    }

    #[test]
    fn kept_snapshots_are_never_older_than_deleted(history in arb_history(), retain in 0usize..30) {
        let plan = plan_retention(history, retain);

        if let (Some(oldest_kept), Some(newest_deleted)) = (
            plan.keep.iter().map(|s| s.start_time).min(),
            plan.delete.iter().map(|s| s.start_time).max(),
        ) {
            prop_assert!(oldest_kept >= newest_deleted);
        }
    }

    #[test]
    fn plan_partitions_the_history(history in arb_history(), retain in 0usize..30) {
        let all: HashSet<String> = history.iter().map(|s| s.snapshot_id.clone()).collect();
        let plan = plan_retention(history, retain);

        let kept: HashSet<String> = plan.keep.iter().map(|s| s.snapshot_id.clone()).collect();
        let deleted: HashSet<String> = plan.delete_ids().into_iter().collect();

        prop_assert!(kept.is_disjoint(&deleted));
        prop_assert_eq!(kept.union(&deleted).cloned().collect::<HashSet<_>>(), all);
    }

    #[test]
    fn plan_ignores_input_order(history in arb_history(), retain in 0usize..30) {
        let mut reversed = history.clone();
        reversed.reverse();

        prop_assert_eq!(plan_retention(history, retain), plan_retention(reversed, retain));
    }

    #[test]
    fn zero_retention_deletes_all(history in arb_history()) {
        let total = history.len();
        let plan = plan_retention(history, 0);

        prop_assert!(plan.keep.is_empty());
        prop_assert_eq!(plan.delete.len(), total);
    }

    #[test]
    fn short_history_is_untouched(history in arb_history()) {
        let total = history.len();
        let plan = plan_retention(history, total);

        prop_assert!(plan.is_noop());
    }
}
