//! Attribution of user callbacks attached to captured resources
//!
//! Capture tools record every function reachable from a resource as a
//! `functions` entry holding the property chain that led to it and the
//! function's source location:
//!
//! ```text
//! { "path": ["owner", "_events", "end"], "key": 1,
//!   "info": { "file": "client.js", "line": 27, "column": 14, "name": "onend", ... } }
//! ```
//!
//! Each operation sub-record labels its functions with a path prefix
//! (`socket.resource`, `tls.resource`, ...), so the same callback reached
//! through different resources can later be merged into one entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How user functions are laid out in operation summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionLayout {
    /// Functions stay on the sub-record they were found on
    Inline,
    /// Functions are hoisted to the operation, one entry per sub-record
    Separated,
    /// Hoisted and deduplicated by location, property paths unioned
    #[default]
    Merged,
}

/// A user callback with its source location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFunction {
    pub file: String,
    pub line: u64,
    pub column: u64,
    #[serde(default)]
    pub inferred_name: String,
    #[serde(default)]
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub args: Option<Value>,
    pub property_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    key: Option<Value>,
    info: FunctionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionInfo {
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: u64,
    #[serde(default)]
    column: u64,
    #[serde(default)]
    inferred_name: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    args: Option<Value>,
}

fn property_path(prefix: &str, path: &[String], key: Option<&Value>) -> String {
    let mut out = String::from(prefix);
    for segment in path {
        out.push('.');
        out.push_str(segment);
    }
    match key {
        Some(Value::Number(n)) => out.push_str(&format!("[{}]", n)),
        Some(Value::String(s)) => {
            out.push('.');
            out.push_str(s);
        }
        _ => {}
    }
    out
}

/// Deduplicated user functions found in a raw `functions` list
///
/// Entries that don't have the expected shape are skipped. Functions sharing
/// a location are collapsed and their property paths collected.
pub fn unique_user_functions(functions: Option<&Value>, path_prefix: &str) -> Vec<UserFunction> {
    let Some(Value::Array(entries)) = functions else {
        return Vec::new();
    };

    let mut unique: Vec<UserFunction> = Vec::new();
    for raw in entries {
        let Ok(entry) = serde_json::from_value::<FunctionEntry>(raw.clone()) else {
            tracing::debug!("Skipping malformed function entry under {}", path_prefix);
            continue;
        };
        let path = property_path(path_prefix, &entry.path, entry.key.as_ref());
        let info = entry.info;

        if let Some(existing) = unique.iter_mut().find(|f| f.location == info.location) {
            if !existing.property_paths.contains(&path) {
                existing.property_paths.push(path);
            }
            continue;
        }

        unique.push(UserFunction {
            file: info.file,
            line: info.line,
            column: info.column,
            inferred_name: info.inferred_name,
            name: info.name,
            location: info.location,
            args: info.args,
            property_paths: vec![path],
        });
    }
    unique
}

/// Merge function lists from several sub-records, keyed by location
///
/// Order follows first appearance; property paths are unioned.
pub fn merge_user_functions<'a, I>(lists: I) -> Vec<UserFunction>
where
    I: IntoIterator<Item = &'a [UserFunction]>,
{
    let mut order: Vec<String> = Vec::new();
    let mut merged: BTreeMap<String, UserFunction> = BTreeMap::new();

    for list in lists {
        for func in list {
            match merged.get_mut(&func.location) {
                Some(existing) => {
                    for path in &func.property_paths {
                        if !existing.property_paths.contains(path) {
                            existing.property_paths.push(path.clone());
                        }
                    }
                }
                None => {
                    order.push(func.location.clone());
                    merged.insert(func.location.clone(), func.clone());
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|location| merged.remove(&location))
        .collect()
}
