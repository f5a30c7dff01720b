//! Traversal-based group construction shared by every kind

use crate::activity::ActivityId;
use crate::classify::RoleSets;
use crate::role::{OperationKind, Role};
use crate::traversal::TriggerIndex;
use std::collections::BTreeSet;

/// Where traversal stops for a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRule {
    /// Every node is terminal, groups hold the root alone
    RootOnly,
    /// Stop at shutdowns, at other roots of the kind, and at activities
    /// holding no role for the kind
    Connection,
}

impl BoundaryRule {
    pub fn for_kind(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Listen => BoundaryRule::RootOnly,
            _ => BoundaryRule::Connection,
        }
    }
}

/// Builds groups by traversing from an origin under a boundary rule
///
/// Members reached by traversal but holding no role for the kind are dropped,
/// so every group member except possibly the origin is reducible.
#[derive(Debug, Clone, Copy)]
pub struct GroupBuilder<'a> {
    index: &'a TriggerIndex,
    roles: &'a RoleSets,
    root_role: Role,
    rule: BoundaryRule,
}

impl<'a> GroupBuilder<'a> {
    pub fn new(
        index: &'a TriggerIndex,
        roles: &'a RoleSets,
        root_role: Role,
        rule: BoundaryRule,
    ) -> Self {
        Self {
            index,
            roles,
            root_role,
            rule,
        }
    }

    pub fn for_kind(index: &'a TriggerIndex, roles: &'a RoleSets, kind: OperationKind) -> Self {
        Self::new(index, roles, kind.root_role(), BoundaryRule::for_kind(kind))
    }

    pub fn roles(&self) -> &'a RoleSets {
        self.roles
    }

    /// Whether traversal started at `origin` must not descend below `id`
    pub fn is_boundary(&self, origin: ActivityId, id: ActivityId) -> bool {
        match self.rule {
            BoundaryRule::RootOnly => true,
            BoundaryRule::Connection => {
                if id == origin {
                    return false;
                }
                self.roles.has(Role::Shutdown, id)
                    || self.roles.has(self.root_role, id)
                    || !self.roles.is_classified(id)
            }
        }
    }

    /// `origin` plus every role-tagged activity it reaches
    ///
    /// Other roots of the kind stop traversal and are left out, they head
    /// their own groups.
    pub fn build(&self, origin: ActivityId) -> BTreeSet<ActivityId> {
        let mut reached = self
            .index
            .ids_triggered_by(origin, |id| self.is_boundary(origin, id));
        reached.retain(|&id| id == origin || self.is_member(id));
        reached
    }

    fn is_member(&self, id: ActivityId) -> bool {
        match self.rule {
            BoundaryRule::RootOnly => false,
            BoundaryRule::Connection => {
                self.roles.is_classified(id) && !self.roles.has(self.root_role, id)
            }
        }
    }

    /// Traverse from `origin` and add the result to `group`
    pub fn extend(&self, group: &mut BTreeSet<ActivityId>, origin: ActivityId) {
        group.extend(self.build(origin));
    }
}
