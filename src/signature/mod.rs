// Role Signature Tables
//
// Roles are recognized by type tag, call-stack frame patterns and resource
// shape. The frame text is specific to the runtime version that produced the
// trace, so the patterns live in a versioned data table (TOML) instead of
// being compiled into the classifier. The embedded default table covers the
// runtime versions the engine was built against; a replacement table can be
// loaded at startup without touching traversal or reduction.

mod definition;
mod table;

pub use definition::{FramePattern, RoleSignature};
pub use table::{CompiledSignature, SignatureTable, SUPPORTED_VERSION};

#[cfg(test)]
mod tests;
