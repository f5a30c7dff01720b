//! netstitch - network operation reconstruction from async activity traces
//!
//! An instrumented runtime records every asynchronous resource it creates
//! (sockets, DNS lookups, connect requests, parsers, TLS wraps) together with
//! the id of the activity that caused it, a call stack and a few timestamps.
//! No event says which network operation it belongs to. This crate classifies
//! activities into roles, stitches them into per-operation groups along the
//! trigger forest (plus heuristic links where the forest is silent) and folds
//! each group into a timestamped [`Operation`] summary.
//!
//! # Example
//!
//! ```
//! use netstitch::{ActivitySnapshot, OperationKind, ProcessOptions, ProcessorRegistry, SignatureTable};
//!
//! let snapshot = ActivitySnapshot::from_json_str("[]").unwrap();
//! let registry = ProcessorRegistry::new(
//!     &[OperationKind::ClientConnection],
//!     SignatureTable::default_table().unwrap(),
//!     ProcessOptions::default(),
//! );
//! let merged = registry.process(&snapshot).unwrap();
//! assert!(merged.output.operations.is_empty());
//! ```

pub mod activity;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod linker;
pub mod operation;
pub mod processor;
pub mod projection;
pub mod registry;
pub mod role;
pub mod signature;
pub mod text_output;
pub mod traversal;
pub mod user_functions;

pub use activity::{Activity, ActivityId, ActivitySnapshot, ActivityType};
pub use config::AnalysisConfig;
pub use error::{ProcessError, ReduceError, SignatureError};
pub use operation::Operation;
pub use processor::{KindProcessor, ProcessOptions, ProcessOutput};
pub use registry::{MergedOutput, ProcessorRegistry};
pub use role::{OperationKind, Role};
pub use signature::SignatureTable;
pub use text_output::render_text;
