use snaprot_common::Snapshot;
use std::cmp::Ordering;

/// Outcome of applying a retention count to one volume's snapshot history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Snapshots that survive, newest first.
    pub keep: Vec<Snapshot>,
    /// Deletion candidates, newest first.
    pub delete: Vec<Snapshot>,
}

impl RetentionPlan {
    pub fn delete_ids(&self) -> Vec<String> {
        self.delete.iter().map(|s| s.snapshot_id.clone()).collect()
    }

    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Newest first. Identical start times fall back to the snapshot id, the
/// lexically greater id counting as newer, so the order is total.
pub fn newest_first(a: &Snapshot, b: &Snapshot) -> Ordering {
    b.start_time
        .cmp(&a.start_time)
        .then_with(|| b.snapshot_id.cmp(&a.snapshot_id))
}

/// Keep the `retain` most recently started snapshots and mark the rest for
/// deletion. A history no longer than `retain` yields no candidates.
pub fn plan_retention(mut snapshots: Vec<Snapshot>, retain: usize) -> RetentionPlan {
    snapshots.sort_by(newest_first);

    if snapshots.len() <= retain {
        return RetentionPlan {
            keep: snapshots,
            delete: Vec::new(),
        };
    }

    let delete = snapshots.split_off(retain);
    RetentionPlan {
        keep: snapshots,
        delete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn snap(id: &str, minute: u32) -> Snapshot {
        Snapshot {
            snapshot_id: id.to_string(),
            volume_id: "vol-1".to_string(),
            start_time: at(minute),
            state: None,
        }
    }

    #[test]
    fn test_two_oldest_of_five_are_deleted() {
        let history = vec![
            snap("snap-t3", 3),
            snap("snap-t1", 1),
            snap("snap-t5", 5),
            snap("snap-t2", 2),
            snap("snap-t4", 4),
        ];

        let plan = plan_retention(history, 3);

        assert_eq!(plan.delete_ids(), vec!["snap-t2", "snap-t1"]);
        let kept: Vec<&str> = plan.keep.iter().map(|s| s.snapshot_id.as_str()).collect();
        assert_eq!(kept, vec!["snap-t5", "snap-t4", "snap-t3"]);
    }

    #[test]
    fn test_single_fresh_snapshot_is_kept() {
        let plan = plan_retention(vec![snap("snap-new", 10)], 3);
        assert!(plan.is_noop());
        assert_eq!(plan.keep.len(), 1);
    }

    #[test]
    fn test_exactly_at_limit_is_noop() {
        let plan = plan_retention(vec![snap("a", 1), snap("b", 2), snap("c", 3)], 3);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_zero_retention_deletes_everything() {
        let plan = plan_retention(vec![snap("a", 1), snap("b", 2)], 0);
        assert!(plan.keep.is_empty());
        assert_eq!(plan.delete_ids(), vec!["b", "a"]);
    }

    #[test]
    fn test_empty_history() {
        let plan = plan_retention(Vec::new(), 2);
        assert!(plan.keep.is_empty());
        assert!(plan.is_noop());
    }

    #[test]
    fn test_ties_break_on_snapshot_id() {
        let history = vec![snap("snap-a", 7), snap("snap-c", 7), snap("snap-b", 7)];

        let plan = plan_retention(history, 1);

        assert_eq!(plan.keep[0].snapshot_id, "snap-c");
        assert_eq!(plan.delete_ids(), vec!["snap-b", "snap-a"]);
    }
}
