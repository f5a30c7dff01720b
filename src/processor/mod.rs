// Per-Kind Operation Processors
//
// Every operation kind runs the same fixed pipeline over a shared snapshot:
//
//   classify → pick roots → traverse into groups → link steps → reduce
//
// Kinds differ only in data: the roles they classify, the boundary rule the
// group builder traverses with, and the link steps that attach members the
// trigger forest does not reach. Processors own their working state and
// never write to the snapshot.

mod group_builder;
mod pipeline;

pub use group_builder::{BoundaryRule, GroupBuilder};
pub use pipeline::{Ambiguity, Groups, KindPipeline, LinkContext, LinkStep};

use crate::activity::{ActivityId, ActivitySnapshot};
use crate::classify::{classify, RoleSets};
use crate::error::ProcessError;
use crate::linker::ProximityThresholds;
use crate::operation::{reduce, Operation, ReduceOptions, ResolvedGroup};
use crate::role::OperationKind;
use crate::signature::SignatureTable;
use crate::traversal::TriggerIndex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Options shared by all processors of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessOptions {
    pub reduce: ReduceOptions,
    pub proximity: ProximityThresholds,
}

/// Groups and operations keyed by root id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessOutput {
    pub groups: Groups,
    pub operations: BTreeMap<ActivityId, Operation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ambiguities: Vec<Ambiguity>,
}

impl ProcessOutput {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Pipeline of one operation kind over one snapshot
pub struct KindProcessor<'a> {
    kind: OperationKind,
    snapshot: &'a ActivitySnapshot,
    index: Cow<'a, TriggerIndex>,
    roles: RoleSets,
    pipeline: KindPipeline,
    options: ProcessOptions,
}

impl<'a> KindProcessor<'a> {
    pub fn new(
        kind: OperationKind,
        snapshot: &'a ActivitySnapshot,
        table: &SignatureTable,
        options: ProcessOptions,
    ) -> Self {
        let index = TriggerIndex::from_snapshot(snapshot);
        Self::build(kind, snapshot, Cow::Owned(index), table, options)
    }

    /// Reuse a trigger index already built for `snapshot`
    pub fn with_index(
        kind: OperationKind,
        snapshot: &'a ActivitySnapshot,
        index: &'a TriggerIndex,
        table: &SignatureTable,
        options: ProcessOptions,
    ) -> Self {
        Self::build(kind, snapshot, Cow::Borrowed(index), table, options)
    }

    fn build(
        kind: OperationKind,
        snapshot: &'a ActivitySnapshot,
        index: Cow<'a, TriggerIndex>,
        table: &SignatureTable,
        options: ProcessOptions,
    ) -> Self {
        Self {
            kind,
            snapshot,
            index,
            roles: classify(snapshot, kind, table),
            pipeline: KindPipeline::for_kind(kind),
            options,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn roles(&self) -> &RoleSets {
        &self.roles
    }

    fn builder(&self) -> GroupBuilder<'_> {
        GroupBuilder::new(
            &self.index,
            &self.roles,
            self.kind.root_role(),
            self.pipeline.boundary,
        )
    }

    /// Traverse from every root, then run the kind's link steps
    pub fn separate_into_groups(&self) -> (Groups, Vec<Ambiguity>) {
        let builder = self.builder();
        let mut groups: Groups = self
            .roles
            .ids(self.kind.root_role())
            .map(|root| (root, builder.build(root)))
            .collect();

        let ctx = LinkContext {
            kind: self.kind,
            snapshot: self.snapshot,
            builder,
            thresholds: &self.options.proximity,
        };
        let mut ambiguities = Vec::new();
        for step in &self.pipeline.links {
            step.apply(&ctx, &mut groups, &mut ambiguities);
        }

        (groups, ambiguities)
    }

    /// Reduce every group into its operation
    ///
    /// # Errors
    ///
    /// Fails on the first group that cannot be reduced.
    pub fn build_operations(
        &self,
        groups: &Groups,
    ) -> Result<BTreeMap<ActivityId, Operation>, ProcessError> {
        groups
            .iter()
            .map(|(&root, ids)| {
                let group = ResolvedGroup::resolve(self.kind, root, ids, self.snapshot, &self.roles);
                reduce(&group, &self.options.reduce)
                    .map(|op| (root, op))
                    .map_err(|source| ProcessError::Reduce {
                        kind: self.kind,
                        source,
                    })
            })
            .collect()
    }

    pub fn process(&self) -> Result<ProcessOutput, ProcessError> {
        let (groups, ambiguities) = self.separate_into_groups();
        let operations = self.build_operations(&groups)?;

        tracing::debug!(
            kind = %self.kind,
            groups = groups.len(),
            ambiguous = ambiguities.len(),
            "processed operation kind"
        );

        Ok(ProcessOutput {
            groups,
            operations,
            ambiguities,
        })
    }
}
