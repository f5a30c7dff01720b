use crate::activity::ActivityType;
use crate::role::{OperationKind, Role};
use serde::{Deserialize, Serialize};

/// One stack frame check: the frame at `index` must match `pattern`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FramePattern {
    /// Frame index, 0 = innermost
    pub index: usize,

    /// Case-insensitive regex over the literal frame text
    pub pattern: String,
}

/// Role definition loaded from a signature table
///
/// # Example TOML
/// ```toml
/// [[signature]]
/// kinds = ["client-connection"]
/// role = "socket"
/// type = "TCPWRAP"
/// owner = "Socket"
/// provenance_frame = 2
/// frames = [{ index = 0, pattern = "at Socket\\.connect" }]
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RoleSignature {
    /// Operation kinds this definition applies to
    pub kinds: Vec<OperationKind>,

    pub role: Role,

    /// Runtime type tag the activity must carry
    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    /// Frame checks; the stack must be deep enough for all of them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<FramePattern>,

    /// Required constructor name of the resource's owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Resource must reference the socket it serves
    #[serde(default)]
    pub requires_socket_ref: bool,

    /// Init stack frame holding the user call site that started the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance_frame: Option<usize>,
}

impl RoleSignature {
    /// Minimum init stack length required by the frame checks
    pub fn min_stack_len(&self) -> usize {
        self.frames.iter().map(|f| f.index + 1).max().unwrap_or(0)
    }

    pub fn applies_to(&self, kind: OperationKind) -> bool {
        self.kinds.contains(&kind)
    }
}
