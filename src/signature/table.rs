use crate::activity::{Activity, ActivityType};
use crate::error::SignatureError;
use crate::role::{OperationKind, Role};
use crate::signature::RoleSignature;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Signature table format version understood by this build
pub const SUPPORTED_VERSION: u32 = 1;

const DEFAULT_TOML: &str = include_str!("../../signatures-default.toml");

#[derive(serde::Deserialize)]
struct SignatureFile {
    version: u32,
    signature: Vec<RoleSignature>,
}

/// A role signature with its frame patterns compiled
#[derive(Debug, Clone)]
pub struct CompiledSignature {
    definition: RoleSignature,
    frames: Vec<(usize, Regex)>,
    min_stack_len: usize,
}

impl CompiledSignature {
    fn compile(definition: RoleSignature) -> Result<Self, SignatureError> {
        let frames = definition
            .frames
            .iter()
            .map(|f| {
                RegexBuilder::new(&f.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|rx| (f.index, rx))
                    .map_err(|source| SignatureError::InvalidPattern {
                        role: definition.role,
                        pattern: f.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            min_stack_len: definition.min_stack_len(),
            definition,
            frames,
        })
    }

    pub fn definition(&self) -> &RoleSignature {
        &self.definition
    }

    pub fn role(&self) -> Role {
        self.definition.role
    }

    pub fn provenance_frame(&self) -> Option<usize> {
        self.definition.provenance_frame
    }

    /// Whether `activity` plays this role
    ///
    /// Missing or too short stacks and missing resources never match.
    pub fn matches(&self, activity: &Activity) -> bool {
        if activity.activity_type != self.definition.activity_type {
            return false;
        }

        if self.min_stack_len > 0 && activity.stack_len() < self.min_stack_len {
            return false;
        }
        let frames_match = self.frames.iter().all(|(index, rx)| {
            activity
                .frame(*index)
                .is_some_and(|frame| rx.is_match(frame))
        });
        if !frames_match {
            return false;
        }

        if let Some(owner) = &self.definition.owner {
            let proto = activity.resource.as_ref().and_then(|r| r.owner_proto());
            if proto != Some(owner.as_str()) {
                return false;
            }
        }

        if self.definition.requires_socket_ref
            && !activity
                .resource
                .as_ref()
                .is_some_and(|r| r.has_socket_ref())
        {
            return false;
        }

        true
    }
}

/// Versioned table of role signatures
///
/// New runtime versions ship a new table instead of touching traversal or
/// reduction code.
///
/// # Example Usage
/// ```
/// use netstitch::signature::SignatureTable;
/// use netstitch::role::{OperationKind, Role};
///
/// let table = SignatureTable::default_table()?;
/// assert!(table.signature(OperationKind::Listen, Role::Listener).is_some());
/// # Ok::<(), netstitch::error::SignatureError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SignatureTable {
    version: u32,
    signatures: Vec<CompiledSignature>,
}

impl SignatureTable {
    /// Parse and validate a table from TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML, an unsupported version, an invalid
    /// regex, an unknown type tag, or a (kind, role) pair defined twice.
    pub fn from_toml_str(content: &str) -> Result<Self, SignatureError> {
        let file: SignatureFile = toml::from_str(content)?;

        if file.version != SUPPORTED_VERSION {
            return Err(SignatureError::VersionMismatch {
                expected: SUPPORTED_VERSION,
                found: file.version,
            });
        }

        let mut seen = HashSet::new();
        for sig in &file.signature {
            if sig.kinds.is_empty() {
                return Err(SignatureError::NoKinds { role: sig.role });
            }
            if sig.activity_type == ActivityType::Other {
                return Err(SignatureError::UnknownType { role: sig.role });
            }
            for kind in &sig.kinds {
                if !seen.insert((*kind, sig.role)) {
                    return Err(SignatureError::Duplicate {
                        kind: *kind,
                        role: sig.role,
                    });
                }
            }
        }

        let signatures = file
            .signature
            .into_iter()
            .map(CompiledSignature::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: file.version,
            signatures,
        })
    }

    /// Load a table from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, SignatureError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|source| SignatureError::Read {
                path: path.as_ref().display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    /// Embedded table for the runtime versions the engine was built against
    pub fn default_table() -> Result<Self, SignatureError> {
        Self::from_toml_str(DEFAULT_TOML)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Signature assigning `role` for `kind`, if the table defines one
    pub fn signature(&self, kind: OperationKind, role: Role) -> Option<&CompiledSignature> {
        self.signatures
            .iter()
            .find(|s| s.role() == role && s.definition.applies_to(kind))
    }

    /// All signatures that apply to `kind`
    pub fn for_kind(&self, kind: OperationKind) -> impl Iterator<Item = &CompiledSignature> {
        self.signatures
            .iter()
            .filter(move |s| s.definition.applies_to(kind))
    }

    pub fn signatures(&self) -> &[CompiledSignature] {
        &self.signatures
    }
}
