//! Reduction of role-tagged groups into operation summaries
//!
//! A group is resolved into one [`Record`] per member (its role for the kind
//! plus the raw activity), then folded into an accumulator. Each role handler
//! fills its own fields; the accumulator is finished into an [`Operation`]
//! once all records were seen, so no partially built summary is observable.
//!
//! Record order does not matter: the provenance frame of the socket or
//! listener always wins over the address-resolution fallback, and repeated
//! roles keep the lowest id.

use crate::activity::{Activity, ActivityId, ActivitySnapshot};
use crate::classify::RoleSets;
use crate::error::ReduceError;
use crate::lifecycle::{destroyed_stamp, LifeCycle, Stamp, UNKNOWN};
use crate::projection::{
    connection_key, project_http_parser, project_tls, HttpParserRecord, TlsRecord,
};
use crate::role::{OperationKind, Role};
use crate::user_functions::{
    merge_user_functions, unique_user_functions, FunctionLayout, UserFunction,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Options applied while reducing groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReduceOptions {
    /// Embed raw activities in sub-records
    pub include_raw: bool,
    pub function_layout: FunctionLayout,
}

/// Identity of a group member with no further useful state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRef {
    pub id: ActivityId,
    pub trigger_id: Option<ActivityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

/// Socket or listening handle of an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleRecord {
    pub id: ActivityId,
    pub trigger_id: Option<ActivityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_functions: Vec<UserFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

/// Typed summary of one reconstructed network operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OperationKind,
    pub life_cycle: LifeCycle,
    /// User call site that started the operation, or `<Unknown>`
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<HandleRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<HandleRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub getaddrinfo: Option<ActivityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<ActivityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<ActivityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_parser: Option<HttpParserRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_functions: Vec<UserFunction>,
}

impl Operation {
    pub fn created_at_known(&self) -> bool {
        self.created_at != UNKNOWN
    }
}

/// One group member as seen by the reducer
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub id: ActivityId,
    pub role: Option<Role>,
    pub activity: Option<&'a Activity>,
}

/// A group with every member's role and activity looked up
#[derive(Debug, Clone)]
pub struct ResolvedGroup<'a> {
    pub kind: OperationKind,
    pub root: ActivityId,
    pub records: Vec<Record<'a>>,
    provenance: BTreeMap<Role, usize>,
}

impl<'a> ResolvedGroup<'a> {
    pub fn resolve(
        kind: OperationKind,
        root: ActivityId,
        ids: &BTreeSet<ActivityId>,
        snapshot: &'a ActivitySnapshot,
        roles: &RoleSets,
    ) -> Self {
        let records = ids
            .iter()
            .map(|&id| Record {
                id,
                role: roles.primary_role(id),
                activity: snapshot.get(id),
            })
            .collect();
        let provenance = kind
            .roles()
            .iter()
            .filter_map(|&role| roles.provenance_frame(role).map(|f| (role, f)))
            .collect();

        Self {
            kind,
            root,
            records,
            provenance,
        }
    }

    /// Build a group directly from records
    pub fn from_records(kind: OperationKind, root: ActivityId, records: Vec<Record<'a>>) -> Self {
        Self {
            kind,
            root,
            records,
            provenance: BTreeMap::new(),
        }
    }

    pub fn with_provenance_frame(mut self, role: Role, frame: usize) -> Self {
        self.provenance.insert(role, frame);
        self
    }

    fn provenance_of(&self, role: Role, activity: &Activity) -> Option<String> {
        self.provenance
            .get(&role)
            .and_then(|&frame| activity.frame(frame))
            .map(str::to_string)
    }
}

#[derive(Debug, Default)]
struct OperationAccumulator {
    created: Option<Stamp>,
    destroyed: Option<Stamp>,
    created_at: Option<String>,
    created_at_fallback: Option<String>,
    listen: Option<HandleRecord>,
    socket: Option<HandleRecord>,
    getaddrinfo: Option<ActivityRef>,
    connect: Option<ActivityRef>,
    shutdown: Option<ActivityRef>,
    http_parser: Option<HttpParserRecord>,
    tls: Option<TlsRecord>,
}

fn raw(activity: &Activity, options: &ReduceOptions) -> Option<Activity> {
    options.include_raw.then(|| activity.clone())
}

fn activity_ref(activity: &Activity, options: &ReduceOptions) -> ActivityRef {
    ActivityRef {
        id: activity.id,
        trigger_id: activity.trigger_id,
        activity: raw(activity, options),
    }
}

fn handle_record(activity: &Activity, prefix: &str, options: &ReduceOptions) -> HandleRecord {
    let resource = activity.resource.as_ref();
    HandleRecord {
        id: activity.id,
        trigger_id: activity.trigger_id,
        connection_key: connection_key(resource),
        user_functions: unique_user_functions(resource.and_then(|r| r.functions()), prefix),
        activity: raw(activity, options),
    }
}

fn keep_first<T>(slot: &mut Option<T>, make: impl FnOnce() -> T) {
    if slot.is_none() {
        *slot = Some(make());
    }
}

fn latest(current: Option<Stamp>, candidate: Option<Stamp>) -> Option<Stamp> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn earliest(current: Option<Stamp>, candidate: Option<Stamp>) -> Option<Stamp> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl OperationAccumulator {
    fn apply(
        mut self,
        record: &Record<'_>,
        group: &ResolvedGroup<'_>,
        options: &ReduceOptions,
    ) -> Result<Self, ReduceError> {
        let activity = record.activity.ok_or(ReduceError::MissingActivity {
            root: group.root,
            id: record.id,
        })?;
        let role = record.role.ok_or(ReduceError::MalformedGroup {
            kind: group.kind,
            root: group.root,
            id: record.id,
        })?;

        match role {
            Role::Listener => {
                self.created = earliest(self.created, activity.init.map(Stamp::new));
                // A listening handle only ends when the server closes
                self.destroyed = latest(self.destroyed, activity.destroy.map(Stamp::new));
                if self.created_at.is_none() {
                    self.created_at = group.provenance_of(role, activity);
                }
                keep_first(&mut self.listen, || {
                    handle_record(activity, "listen.resource", options)
                });
            }
            Role::Socket => {
                self.created = earliest(self.created, activity.init.map(Stamp::new));
                if self.created_at.is_none() {
                    self.created_at = group.provenance_of(role, activity);
                }
                keep_first(&mut self.socket, || {
                    handle_record(activity, "socket.resource", options)
                });
            }
            Role::AddressResolution => {
                if self.created_at_fallback.is_none() {
                    self.created_at_fallback = group.provenance_of(role, activity);
                }
                keep_first(&mut self.getaddrinfo, || activity_ref(activity, options));
            }
            Role::Connect => {
                keep_first(&mut self.connect, || activity_ref(activity, options));
            }
            Role::Shutdown => {
                self.destroyed = latest(self.destroyed, destroyed_stamp(activity));
                keep_first(&mut self.shutdown, || activity_ref(activity, options));
            }
            Role::ProtocolParser => {
                keep_first(&mut self.http_parser, || {
                    let mut parser = project_http_parser(activity);
                    parser.activity = raw(activity, options);
                    parser
                });
            }
            Role::TlsWrap => {
                keep_first(&mut self.tls, || {
                    let mut tls = project_tls(activity);
                    tls.activity = raw(activity, options);
                    tls
                });
            }
        }

        Ok(self)
    }

    fn finish(mut self, kind: OperationKind, options: &ReduceOptions) -> Operation {
        let user_functions = match options.function_layout {
            FunctionLayout::Inline => Vec::new(),
            FunctionLayout::Separated => self.take_functions().concat(),
            FunctionLayout::Merged => {
                let lists = self.take_functions();
                merge_user_functions(lists.iter().map(Vec::as_slice))
            }
        };

        Operation {
            kind,
            life_cycle: LifeCycle::new(self.created, self.destroyed),
            created_at: self
                .created_at
                .or(self.created_at_fallback)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            listen: self.listen,
            socket: self.socket,
            getaddrinfo: self.getaddrinfo,
            connect: self.connect,
            shutdown: self.shutdown,
            http_parser: self.http_parser,
            tls: self.tls,
            user_functions,
        }
    }

    /// Move functions off the sub-records: listen, socket, parser, tls
    fn take_functions(&mut self) -> Vec<Vec<UserFunction>> {
        let mut lists = Vec::new();
        if let Some(listen) = self.listen.as_mut() {
            lists.push(std::mem::take(&mut listen.user_functions));
        }
        if let Some(socket) = self.socket.as_mut() {
            lists.push(std::mem::take(&mut socket.user_functions));
        }
        if let Some(parser) = self.http_parser.as_mut() {
            lists.push(std::mem::take(&mut parser.user_functions));
        }
        if let Some(tls) = self.tls.as_mut() {
            lists.push(std::mem::take(&mut tls.user_functions));
        }
        lists
    }
}

/// Fold a resolved group into its operation summary
///
/// # Errors
///
/// [`ReduceError::MalformedGroup`] when a member holds no role for the kind,
/// [`ReduceError::MissingActivity`] when a member is not in the snapshot.
pub fn reduce(group: &ResolvedGroup<'_>, options: &ReduceOptions) -> Result<Operation, ReduceError> {
    let acc = group
        .records
        .iter()
        .try_fold(OperationAccumulator::default(), |acc, record| {
            acc.apply(record, group, options)
        })?;
    Ok(acc.finish(group.kind, options))
}
