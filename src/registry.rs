//! Runs a list of kind processors over one snapshot and merges their output

use crate::activity::{ActivityId, ActivitySnapshot};
use crate::error::ProcessError;
use crate::processor::{KindProcessor, ProcessOptions, ProcessOutput};
use crate::role::OperationKind;
use crate::signature::SignatureTable;
use crate::traversal::TriggerIndex;
use std::collections::BTreeMap;

/// Kinds run when none are configured
pub const DEFAULT_KINDS: [OperationKind; 2] =
    [OperationKind::Listen, OperationKind::ServerConnection];

/// Merged output with the kind that produced each root
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MergedOutput {
    #[serde(flatten)]
    pub output: ProcessOutput,
    pub kinds: BTreeMap<ActivityId, OperationKind>,
}

#[derive(Debug, Clone)]
pub struct ProcessorRegistry {
    kinds: Vec<OperationKind>,
    table: SignatureTable,
    options: ProcessOptions,
}

impl ProcessorRegistry {
    /// Registry over `kinds`, in order; duplicates are dropped
    pub fn new(kinds: &[OperationKind], table: SignatureTable, options: ProcessOptions) -> Self {
        let mut unique = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self {
            kinds: unique,
            table,
            options,
        }
    }

    pub fn with_defaults(table: SignatureTable, options: ProcessOptions) -> Self {
        Self::new(&DEFAULT_KINDS, table, options)
    }

    pub fn kinds(&self) -> &[OperationKind] {
        &self.kinds
    }

    /// Process every registered kind and merge by root id
    ///
    /// On a root collision the earlier registered kind keeps the root.
    pub fn process(&self, snapshot: &ActivitySnapshot) -> Result<MergedOutput, ProcessError> {
        let index = TriggerIndex::from_snapshot(snapshot);
        let mut merged = MergedOutput::default();

        for &kind in &self.kinds {
            let processor =
                KindProcessor::with_index(kind, snapshot, &index, &self.table, self.options);
            let output = processor.process()?;
            merge_into(&mut merged, kind, output);
        }

        tracing::info!(
            kinds = self.kinds.len(),
            operations = merged.output.operations.len(),
            "correlated snapshot"
        );
        Ok(merged)
    }
}

fn merge_into(merged: &mut MergedOutput, kind: OperationKind, output: ProcessOutput) {
    let ProcessOutput {
        groups,
        mut operations,
        ambiguities,
    } = output;

    for (root, group) in groups {
        if let Some(&owner) = merged.kinds.get(&root) {
            tracing::warn!(
                root,
                kept = %owner,
                dropped = %kind,
                "root claimed by two operation kinds"
            );
            continue;
        }
        if let Some(op) = operations.remove(&root) {
            merged.output.operations.insert(root, op);
        }
        merged.output.groups.insert(root, group);
        merged.kinds.insert(root, kind);
    }
    merged.output.ambiguities.extend(ambiguities);
}
