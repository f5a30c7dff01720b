//! Link steps run after traversal
//!
//! Traversal alone leaves out members that the trigger forest does not
//! connect to a root. Each kind runs an ordered list of link steps that
//! attach them to an existing group using resource references or the
//! heuristics in [`crate::linker`].

use super::group_builder::{BoundaryRule, GroupBuilder};
use crate::activity::{ActivityId, ActivitySnapshot};
use crate::linker::{
    correlate_by_proximity, immediately_before_id, ProximityMatch, ProximityThresholds,
};
use crate::role::{OperationKind, Role};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub type Groups = BTreeMap<ActivityId, BTreeSet<ActivityId>>;

/// A socket left unlinked because several TLS wraps matched it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub kind: OperationKind,
    pub socket: ActivityId,
    pub candidates: Vec<ActivityId>,
}

/// One post-traversal linking step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    /// Protocol parser whose `resource.socket._asyncId` names a group root
    ParserBySocketRef,
    /// TLS wrap whose `owner._handle._parentId` names a group root
    TlsByParentHandle,
    /// TLS wrap paired by timing, plus the address resolution it triggered
    TlsByProximity,
    /// Unattached members of the role join the group created just before them
    AttachPreceding(Role),
}

/// Read-only inputs shared by every step of one kind
pub struct LinkContext<'a> {
    pub kind: OperationKind,
    pub snapshot: &'a ActivitySnapshot,
    pub builder: GroupBuilder<'a>,
    pub thresholds: &'a ProximityThresholds,
}

fn claimed(groups: &Groups) -> BTreeSet<ActivityId> {
    groups.values().flatten().copied().collect()
}

impl LinkStep {
    pub fn apply(
        &self,
        ctx: &LinkContext<'_>,
        groups: &mut Groups,
        ambiguities: &mut Vec<Ambiguity>,
    ) {
        let roles = ctx.builder.roles();
        match *self {
            LinkStep::ParserBySocketRef => {
                for parser in roles.ids(Role::ProtocolParser) {
                    let socket = ctx
                        .snapshot
                        .get(parser)
                        .and_then(|a| a.resource.as_ref())
                        .and_then(|r| r.socket_async_id());
                    if let Some(group) = socket.and_then(|s| groups.get_mut(&s)) {
                        group.insert(parser);
                    }
                }
            }
            LinkStep::TlsByParentHandle => {
                for wrap in roles.ids(Role::TlsWrap) {
                    let parent = ctx
                        .snapshot
                        .get(wrap)
                        .and_then(|a| a.resource.as_ref())
                        .and_then(|r| r.parent_handle_id());
                    if let Some(group) = parent.and_then(|p| groups.get_mut(&p)) {
                        group.insert(wrap);
                    }
                }
            }
            LinkStep::TlsByProximity => {
                let mut taken = claimed(groups);
                let sockets: Vec<ActivityId> = groups.keys().copied().collect();

                for socket in sockets {
                    let candidates: Vec<ActivityId> = roles
                        .ids(Role::TlsWrap)
                        .filter(|id| !taken.contains(id))
                        .collect();
                    let wrap = match correlate_by_proximity(
                        ctx.snapshot,
                        socket,
                        candidates,
                        ctx.thresholds,
                    ) {
                        ProximityMatch::Unique(wrap) => wrap,
                        ProximityMatch::Ambiguous(candidates) => {
                            ambiguities.push(Ambiguity {
                                kind: ctx.kind,
                                socket,
                                candidates,
                            });
                            continue;
                        }
                        ProximityMatch::Unmatched => continue,
                    };

                    let lookup = roles.ids(Role::AddressResolution).find(|&id| {
                        !taken.contains(&id)
                            && ctx.snapshot.get(id).and_then(|a| a.trigger_id) == Some(wrap)
                    });

                    let Some(group) = groups.get_mut(&socket) else {
                        continue;
                    };
                    group.insert(wrap);
                    taken.insert(wrap);
                    if let Some(lookup) = lookup {
                        let reached = ctx.builder.build(lookup);
                        taken.extend(reached.iter().copied());
                        group.extend(reached);
                    }
                    tracing::debug!(socket, wrap, ?lookup, "linked TLS wrap by proximity");
                }
            }
            LinkStep::AttachPreceding(role) => {
                let mut taken = claimed(groups);
                let members: Vec<ActivityId> =
                    roles.ids(role).filter(|id| !taken.contains(id)).collect();

                for member in members {
                    if taken.contains(&member) {
                        continue;
                    }
                    let Some(root) = immediately_before_id(groups.keys().copied(), member) else {
                        tracing::debug!(
                            role = %role,
                            member,
                            "no group precedes unattached activity"
                        );
                        continue;
                    };
                    let reached = ctx.builder.build(member);
                    taken.extend(reached.iter().copied());
                    if let Some(group) = groups.get_mut(&root) {
                        group.extend(reached);
                    }
                }
            }
        }
    }
}

/// Boundary rule and link steps of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPipeline {
    pub boundary: BoundaryRule,
    pub links: Vec<LinkStep>,
}

impl KindPipeline {
    pub fn for_kind(kind: OperationKind) -> Self {
        let client_links = [
            LinkStep::AttachPreceding(Role::AddressResolution),
            LinkStep::AttachPreceding(Role::Connect),
        ];
        let links = match kind {
            OperationKind::Listen | OperationKind::ServerConnection => Vec::new(),
            OperationKind::HttpServerConnection => vec![LinkStep::ParserBySocketRef],
            OperationKind::TlsServerConnection => vec![LinkStep::TlsByParentHandle],
            OperationKind::ClientConnection => client_links.to_vec(),
            OperationKind::HttpClientConnection => {
                let mut links = client_links.to_vec();
                links.push(LinkStep::ParserBySocketRef);
                links
            }
            OperationKind::TlsClientConnection => {
                let mut links = vec![LinkStep::TlsByProximity];
                links.extend(client_links);
                links
            }
        };

        Self {
            boundary: BoundaryRule::for_kind(kind),
            links,
        }
    }
}
