//! Causal traversal over the trigger forest
//!
//! Every activity records the id of the activity whose execution context
//! created it. Those `triggerId` links form a forest (the runtime never
//! produces cycles). Grouping starts at a root activity and walks the forest
//! outward, stopping at a caller-supplied boundary.
//!
//! # Boundary Semantics
//!
//! ```text
//!   1 (root)
//!   ├─ 2            boundary(2) = false → 2 included, children explored
//!   │  └─ 4         included
//!   └─ 3            boundary(3) = true  → 3 included, children pruned
//!      └─ 5         not reached
//! ```
//!
//! The boundary is one predicate so both recurring usages go through the
//! same entry point: marking terminal roles (a shutdown, the next socket)
//! and refusing to descend into activities that hold no role at all.

use crate::activity::{ActivityId, ActivitySnapshot};
use std::collections::{BTreeSet, HashMap};

/// Parent → children adjacency of the trigger forest
#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    children: HashMap<ActivityId, Vec<ActivityId>>,
    known: BTreeSet<ActivityId>,
}

impl TriggerIndex {
    /// Build the adjacency once per snapshot, O(V)
    pub fn from_snapshot(snapshot: &ActivitySnapshot) -> Self {
        let mut children: HashMap<ActivityId, Vec<ActivityId>> = HashMap::new();
        let mut known = BTreeSet::new();

        // Snapshot iterates in id order, so child lists come out sorted
        for activity in snapshot.iter() {
            known.insert(activity.id);
            if let Some(parent) = activity.trigger_id {
                if parent != activity.id {
                    children.entry(parent).or_default().push(activity.id);
                }
            }
        }

        Self { children, known }
    }

    /// Direct children of `id`, ascending
    pub fn children(&self, id: ActivityId) -> &[ActivityId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Root plus everything it transitively triggered, pruned at `boundary`
    ///
    /// The result always contains `root`. An unknown root yields `{root}`.
    pub fn ids_triggered_by<B>(&self, root: ActivityId, boundary: B) -> BTreeSet<ActivityId>
    where
        B: Fn(ActivityId) -> bool,
    {
        let mut visited = BTreeSet::new();
        visited.insert(root);

        if !self.known.contains(&root) {
            return visited;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if boundary(node) {
                continue;
            }
            for &child in self.children(node) {
                if visited.insert(child) {
                    stack.push(child);
                }
            }
        }

        visited
    }
}

/// One-shot traversal that builds its own index
///
/// Prefer [`TriggerIndex::ids_triggered_by`] when traversing many roots of
/// the same snapshot.
pub fn ids_triggered_by<B>(
    snapshot: &ActivitySnapshot,
    root: ActivityId,
    boundary: B,
) -> BTreeSet<ActivityId>
where
    B: Fn(ActivityId) -> bool,
{
    TriggerIndex::from_snapshot(snapshot).ids_triggered_by(root, boundary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityType};

    fn node(id: ActivityId, trigger: Option<ActivityId>) -> Activity {
        let mut a = Activity::new(id, ActivityType::Other);
        a.trigger_id = trigger;
        a
    }

    fn tree() -> ActivitySnapshot {
        // 1 ─┬─ 2 ── 4
        //    └─ 3 ── 5 ── 6
        ActivitySnapshot::from_activities([
            node(1, None),
            node(2, Some(1)),
            node(3, Some(1)),
            node(4, Some(2)),
            node(5, Some(3)),
            node(6, Some(5)),
        ])
    }

    #[test]
    fn test_full_descent() {
        let ids = ids_triggered_by(&tree(), 1, |_| false);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_boundary_includes_node_prunes_children() {
        let ids = ids_triggered_by(&tree(), 1, |id| id == 3);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_boundary_on_root() {
        let ids = ids_triggered_by(&tree(), 1, |_| true);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_unknown_root_is_singleton() {
        let ids = ids_triggered_by(&tree(), 42, |_| false);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![42]);
    }

    #[test]
    fn test_subtree_root() {
        let ids = ids_triggered_by(&tree(), 3, |_| false);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![3, 5, 6]);
    }

    #[test]
    fn test_self_trigger_ignored() {
        let snapshot = ActivitySnapshot::from_activities([node(1, Some(1)), node(2, Some(1))]);
        let index = TriggerIndex::from_snapshot(&snapshot);
        assert_eq!(index.children(1), &[2]);
        let ids = index.ids_triggered_by(1, |_| false);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_trigger_outside_snapshot() {
        // Parent 1 was never captured; 2 and 3 are root-level activities
        let snapshot = ActivitySnapshot::from_activities([node(2, Some(1)), node(3, Some(1))]);
        let index = TriggerIndex::from_snapshot(&snapshot);
        assert_eq!(index.children(1), &[2, 3]);
        assert_eq!(index.ids_triggered_by(2, |_| false).len(), 1);
    }
}
