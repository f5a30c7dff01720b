//! Role classification of raw activities
//!
//! For one operation kind, every activity of the snapshot is tested against
//! each role signature that applies to the kind. The result is one id set per
//! role. Sets may overlap: an activity can hold several roles.

use crate::activity::{ActivityId, ActivitySnapshot};
use crate::role::{OperationKind, Role};
use crate::signature::SignatureTable;
use std::collections::{BTreeMap, BTreeSet};

/// Role-tagged id sets produced for one operation kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSets {
    kind: Option<OperationKind>,
    sets: BTreeMap<Role, BTreeSet<ActivityId>>,
    provenance: BTreeMap<Role, usize>,
}

impl RoleSets {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> Option<OperationKind> {
        self.kind
    }

    pub fn insert(&mut self, role: Role, id: ActivityId) {
        self.sets.entry(role).or_default().insert(id);
    }

    /// Ids holding `role`, ascending
    pub fn ids(&self, role: Role) -> impl Iterator<Item = ActivityId> + '_ {
        self.sets.get(&role).into_iter().flatten().copied()
    }

    pub fn has(&self, role: Role, id: ActivityId) -> bool {
        self.sets.get(&role).is_some_and(|s| s.contains(&id))
    }

    /// Whether `id` holds any role for this kind
    pub fn is_classified(&self, id: ActivityId) -> bool {
        self.sets.values().any(|s| s.contains(&id))
    }

    pub fn count(&self, role: Role) -> usize {
        self.sets.get(&role).map_or(0, BTreeSet::len)
    }

    /// Role `id` is reduced as, following the kind's precedence order
    pub fn primary_role(&self, id: ActivityId) -> Option<Role> {
        let order: &[Role] = match self.kind {
            Some(kind) => kind.roles(),
            None => &Role::ALL,
        };
        order.iter().copied().find(|role| self.has(*role, id))
    }

    /// Stack frame holding the operation's call site for `role`
    pub fn provenance_frame(&self, role: Role) -> Option<usize> {
        self.provenance.get(&role).copied()
    }

    pub fn set_provenance_frame(&mut self, role: Role, frame: usize) {
        self.provenance.insert(role, frame);
    }
}

/// Tag every activity of `snapshot` with the roles it plays for `kind`
///
/// Never fails: activities lacking a stack, a resource or the right type are
/// simply left out of the affected sets.
pub fn classify(
    snapshot: &ActivitySnapshot,
    kind: OperationKind,
    table: &SignatureTable,
) -> RoleSets {
    let mut roles = RoleSets::new(kind);

    for sig in table.for_kind(kind) {
        if let Some(frame) = sig.provenance_frame() {
            roles.set_provenance_frame(sig.role(), frame);
        }
        for activity in snapshot.iter() {
            if sig.matches(activity) {
                roles.insert(sig.role(), activity.id);
            }
        }
    }

    tracing::debug!(
        kind = %kind,
        classified = roles.sets.values().map(BTreeSet::len).sum::<usize>(),
        "classified activities"
    );
    roles
}
