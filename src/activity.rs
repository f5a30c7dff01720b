//! Activity snapshot: the immutable input of the correlation engine
//!
//! An instrumented runtime records one [`Activity`] per asynchronous resource
//! (socket handle, DNS request, connect request, ...). Each activity knows its
//! own id, the id of the activity whose execution context created it
//! (`triggerId`), the call stack captured at creation and a deeply nested
//! snapshot of the resource's internal state.
//!
//! # Input Layouts
//!
//! [`ActivitySnapshot::from_json_str`] accepts three layouts:
//!
//! ```text
//! [[2, {"id": 2, "type": "TCPWRAP", ...}], ...]   entries of a serialized map
//! [{"id": 2, "type": "TCPWRAP", ...}, ...]        plain list of activities
//! {"2": {"id": 2, "type": "TCPWRAP", ...}, ...}   object keyed by id
//! ```
//!
//! The snapshot is never mutated once loaded.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Activity ids are assigned by the runtime in creation order
pub type ActivityId = u64;

/// Resource kind tag recorded by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    #[serde(rename = "TCPWRAP")]
    TcpWrap,
    #[serde(rename = "GETADDRINFOREQWRAP")]
    GetAddrInfoReqWrap,
    #[serde(rename = "TCPCONNECTWRAP")]
    TcpConnectWrap,
    #[serde(rename = "SHUTDOWNWRAP")]
    ShutdownWrap,
    #[serde(rename = "HTTPPARSER")]
    HttpParser,
    #[serde(rename = "TLSWRAP")]
    TlsWrap,
    #[serde(rename = "WRITEWRAP")]
    WriteWrap,
    #[serde(rename = "Timeout")]
    Timeout,
    #[serde(rename = "TIMERWRAP")]
    TimerWrap,
    #[serde(rename = "FSREQWRAP")]
    FsReqWrap,
    #[serde(rename = "PROMISE")]
    Promise,
    #[serde(rename = "TickObject")]
    TickObject,
    #[serde(rename = "Immediate")]
    Immediate,
    /// Any tag the engine never classifies
    #[serde(other)]
    Other,
}

impl ActivityType {
    /// Parse the runtime's literal tag (e.g. "TCPWRAP")
    pub fn from_tag(tag: &str) -> Self {
        serde_json::from_value(Value::String(tag.to_string())).unwrap_or(Self::Other)
    }
}

/// Snapshot of a resource's internal state
///
/// The shape is runtime-defined and free-form, so accessors return `None`
/// instead of failing when a path is missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(pub Value);

impl Resource {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Follow a chain of object keys
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.0, |node, key| node.get(key))
            .filter(|v| !v.is_null())
    }

    pub fn owner(&self) -> Option<&Value> {
        self.lookup(&["owner"])
    }

    /// Constructor name of the owning domain object ("Socket", "TLSSocket", ...)
    pub fn owner_proto(&self) -> Option<&str> {
        self.lookup(&["owner", "proto"]).and_then(Value::as_str)
    }

    /// Connection key of a listening handle or of the server owning a socket
    pub fn connection_key(&self) -> Option<String> {
        self.lookup(&["_connectionKey"])
            .or_else(|| self.lookup(&["owner", "server", "_connectionKey"]))
            .and_then(captured_string)
    }

    /// Async id of the socket an HTTP parser is attached to
    pub fn socket_async_id(&self) -> Option<ActivityId> {
        self.lookup(&["socket", "_asyncId"]).and_then(Value::as_u64)
    }

    pub fn has_socket_ref(&self) -> bool {
        self.lookup(&["socket"]).is_some()
    }

    /// Id of the socket handle a TLS wrap was layered on
    pub fn parent_handle_id(&self) -> Option<ActivityId> {
        self.lookup(&["owner", "_handle", "_parentId"])
            .and_then(Value::as_u64)
    }

    /// Raw `functions` list describing attached user callbacks
    pub fn functions(&self) -> Option<&Value> {
        self.lookup(&["functions"])
    }
}

/// Strings are captured either raw or wrapped as `{ "val": "..." }`
pub fn captured_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("val").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// A single lifecycle event record of an asynchronous resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,

    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<ActivityId>,

    /// Call stack at creation, index 0 = innermost frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_stack: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,

    /// Creation instant (ns)
    #[serde(
        default,
        deserialize_with = "first_stamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub init: Option<u64>,

    /// One entry per callback invocation, paired with `after`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<u64>,

    /// Disposal instant (ns)
    #[serde(
        default,
        deserialize_with = "first_stamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub destroy: Option<u64>,
}

impl Activity {
    pub fn new(id: ActivityId, activity_type: ActivityType) -> Self {
        Self {
            id,
            activity_type,
            trigger_id: None,
            init_stack: None,
            resource: None,
            init: None,
            before: Vec::new(),
            after: Vec::new(),
            destroy: None,
        }
    }

    /// Stack frame at `index`, if the stack was captured deep enough
    pub fn frame(&self, index: usize) -> Option<&str> {
        self.init_stack
            .as_ref()
            .and_then(|stack| stack.get(index))
            .map(String::as_str)
    }

    pub fn stack_len(&self) -> usize {
        self.init_stack.as_ref().map_or(0, Vec::len)
    }
}

/// Timestamps are recorded either as a bare number or as an array of samples
fn first_stamp<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(u64),
        Many(Vec<u64>),
    }

    Ok(
        match Option::<OneOrMany>::deserialize(deserializer)? {
            Some(OneOrMany::One(ns)) => Some(ns),
            Some(OneOrMany::Many(samples)) => samples.first().copied(),
            None => None,
        },
    )
}

/// Immutable mapping from activity id to activity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivitySnapshot {
    activities: BTreeMap<ActivityId, Activity>,
}

impl ActivitySnapshot {
    pub fn from_activities<I: IntoIterator<Item = Activity>>(activities: I) -> Self {
        Self {
            activities: activities.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    /// Parse a snapshot in any of the accepted JSON layouts
    pub fn from_json_str(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Layout {
            Entries(Vec<(ActivityId, Activity)>),
            List(Vec<Activity>),
            Keyed(HashMap<String, Activity>),
        }

        let layout: Layout = serde_json::from_str(json)
            .context("Invalid activity snapshot JSON (expected entries, list or keyed object)")?;

        let activities: Vec<Activity> = match layout {
            Layout::Entries(entries) => {
                for (key, activity) in &entries {
                    if *key != activity.id {
                        bail!(
                            "Snapshot entry key {} does not match activity id {}",
                            key,
                            activity.id
                        );
                    }
                }
                entries.into_iter().map(|(_, a)| a).collect()
            }
            Layout::List(list) => list,
            Layout::Keyed(map) => map.into_values().collect(),
        };

        Ok(Self::from_activities(activities))
    }

    /// Load a snapshot from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            bail!("Snapshot file not found: {}", path_ref.display());
        }
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read snapshot file: {}", path_ref.display()))?;
        Self::from_json_str(&contents)
    }

    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    pub fn contains(&self, id: ActivityId) -> bool {
        self.activities.contains_key(&id)
    }

    /// Activities in ascending id (creation) order
    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_type_tags() {
        assert_eq!(ActivityType::from_tag("TCPWRAP"), ActivityType::TcpWrap);
        assert_eq!(
            ActivityType::from_tag("GETADDRINFOREQWRAP"),
            ActivityType::GetAddrInfoReqWrap
        );
        assert_eq!(ActivityType::from_tag("PIPEWRAP"), ActivityType::Other);
    }

    #[test]
    fn test_init_accepts_array_or_number() {
        let a: Activity = serde_json::from_value(json!({
            "id": 2, "type": "TCPWRAP", "triggerId": 1,
            "init": [2605000], "destroy": 3000000
        }))
        .unwrap();
        assert_eq!(a.init, Some(2_605_000));
        assert_eq!(a.destroy, Some(3_000_000));
        assert!(a.before.is_empty());
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let a: Activity = serde_json::from_value(json!({ "id": 7, "type": "Timeout" })).unwrap();
        assert_eq!(a.trigger_id, None);
        assert_eq!(a.init, None);
        assert_eq!(a.stack_len(), 0);
        assert_eq!(a.frame(0), None);
    }

    #[test]
    fn test_resource_accessors() {
        let r = Resource::new(json!({
            "owner": {
                "proto": "Socket",
                "server": { "_connectionKey": { "val": "6::::8080" } },
                "_handle": { "_parentId": 4 }
            },
            "socket": { "_asyncId": 4 }
        }));
        assert_eq!(r.owner_proto(), Some("Socket"));
        assert_eq!(r.connection_key().as_deref(), Some("6::::8080"));
        assert_eq!(r.socket_async_id(), Some(4));
        assert_eq!(r.parent_handle_id(), Some(4));
        assert!(r.has_socket_ref());
        assert!(r.functions().is_none());
    }

    #[test]
    fn test_null_path_is_absent() {
        let r = Resource::new(json!({ "owner": null, "socket": null }));
        assert!(r.owner().is_none());
        assert!(!r.has_socket_ref());
    }

    #[test]
    fn test_snapshot_layouts() {
        let entries = r#"[[2, {"id": 2, "type": "TCPWRAP"}], [3, {"id": 3, "type": "SHUTDOWNWRAP"}]]"#;
        let list = r#"[{"id": 2, "type": "TCPWRAP"}, {"id": 3, "type": "SHUTDOWNWRAP"}]"#;
        let keyed = r#"{"2": {"id": 2, "type": "TCPWRAP"}, "3": {"id": 3, "type": "SHUTDOWNWRAP"}}"#;

        for json in [entries, list, keyed] {
            let snapshot = ActivitySnapshot::from_json_str(json).unwrap();
            assert_eq!(snapshot.len(), 2);
            let ids: Vec<_> = snapshot.iter().map(|a| a.id).collect();
            assert_eq!(ids, vec![2, 3]);
        }
    }

    #[test]
    fn test_snapshot_entry_key_mismatch() {
        let json = r#"[[9, {"id": 2, "type": "TCPWRAP"}]]"#;
        let err = ActivitySnapshot::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_snapshot_invalid_json() {
        assert!(ActivitySnapshot::from_json_str("not json").is_err());
    }
}
