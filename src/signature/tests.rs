use super::*;
use crate::activity::{Activity, ActivityType, Resource};
use crate::error::SignatureError;
use crate::role::{OperationKind, Role};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

fn activity(activity_type: ActivityType, stack: &[&str], resource: serde_json::Value) -> Activity {
    let mut a = Activity::new(10, activity_type);
    a.init_stack = Some(stack.iter().map(|s| s.to_string()).collect());
    a.resource = Some(Resource::new(resource));
    a
}

#[test]
fn test_default_table_loads() {
    let table = SignatureTable::default_table().unwrap();
    assert_eq!(table.version(), SUPPORTED_VERSION);

    for kind in OperationKind::ALL {
        for role in kind.roles() {
            assert!(
                table.signature(kind, *role).is_some(),
                "missing {} signature for {}",
                role,
                kind
            );
        }
    }
}

#[test]
fn test_listener_signature() {
    let table = SignatureTable::default_table().unwrap();
    let sig = table.signature(OperationKind::Listen, Role::Listener).unwrap();

    let listen = activity(
        ActivityType::TcpWrap,
        &["at createServerHandle (net.js:1200:14)"],
        json!({}),
    );
    assert!(sig.matches(&listen));
    assert_eq!(sig.provenance_frame(), Some(4));

    // Case-insensitive
    let upper = activity(
        ActivityType::TcpWrap,
        &["AT CREATESERVERHANDLE (net.js:1200:14)"],
        json!({}),
    );
    assert!(sig.matches(&upper));

    let other = activity(ActivityType::TcpWrap, &["at Socket.connect"], json!({}));
    assert!(!sig.matches(&other));
}

#[test]
fn test_missing_stack_never_matches() {
    let table = SignatureTable::default_table().unwrap();
    let sig = table.signature(OperationKind::Listen, Role::Listener).unwrap();

    let mut bare = Activity::new(3, ActivityType::TcpWrap);
    assert!(!sig.matches(&bare));

    bare.init_stack = Some(Vec::new());
    assert!(!sig.matches(&bare));
}

#[test]
fn test_owner_predicate_separates_socket_kinds() {
    let table = SignatureTable::default_table().unwrap();
    let plain = table
        .signature(OperationKind::ClientConnection, Role::Socket)
        .unwrap();
    let tls = table
        .signature(OperationKind::TlsClientConnection, Role::Socket)
        .unwrap();

    let tls_socket = activity(
        ActivityType::TcpWrap,
        &["at TLSSocket._wrapHandle (_tls_wrap.js:372:42)"],
        json!({ "owner": { "proto": "TLSSocket" } }),
    );
    assert!(tls.matches(&tls_socket));
    assert!(!plain.matches(&tls_socket));

    let no_resource = {
        let mut a = tls_socket.clone();
        a.resource = None;
        a
    };
    assert!(!tls.matches(&no_resource));
}

#[test]
fn test_tls_connect_frames_are_shifted() {
    let table = SignatureTable::default_table().unwrap();
    let plain = table
        .signature(OperationKind::ClientConnection, Role::Connect)
        .unwrap();
    let tls = table
        .signature(OperationKind::TlsClientConnection, Role::Connect)
        .unwrap();

    let connect = activity(
        ActivityType::TcpConnectWrap,
        &[
            "at TLSWrap.methodProxy [as connect6] (_tls_wrap.js:327:33)",
            "at connect (net.js:923:26)",
            "at emitLookup (net.js:1072:7)",
        ],
        json!({}),
    );
    assert!(tls.matches(&connect));
    assert!(!plain.matches(&connect));
}

#[test]
fn test_socket_ref_predicate() {
    let table = SignatureTable::default_table().unwrap();
    let sig = table
        .signature(OperationKind::HttpClientConnection, Role::ProtocolParser)
        .unwrap();

    let with_socket = activity(ActivityType::HttpParser, &[], json!({ "socket": { "_asyncId": 2 } }));
    let without = activity(ActivityType::HttpParser, &[], json!({ "socket": null }));
    assert!(sig.matches(&with_socket));
    assert!(!sig.matches(&without));
}

#[test]
fn test_custom_table_from_file() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
version = 1

[[signature]]
kinds = ["listen"]
role = "listener"
type = "TCPWRAP"
provenance_frame = 2
frames = [{{ index = 0, pattern = "at Server\\.listen" }}]
"#
    )?;
    file.flush()?;

    let table = SignatureTable::from_toml(file.path())?;
    assert_eq!(table.signatures().len(), 1);
    assert!(table
        .signature(OperationKind::ClientConnection, Role::Socket)
        .is_none());
    Ok(())
}

#[test]
fn test_version_mismatch() {
    let err = SignatureTable::from_toml_str("version = 2\nsignature = []\n").unwrap_err();
    assert!(matches!(
        err,
        SignatureError::VersionMismatch { expected: 1, found: 2 }
    ));
}

#[test]
fn test_invalid_pattern() {
    let toml = r#"
version = 1
[[signature]]
kinds = ["listen"]
role = "listener"
type = "TCPWRAP"
frames = [{ index = 0, pattern = "at (unclosed" }]
"#;
    let err = SignatureTable::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, SignatureError::InvalidPattern { .. }));
}

#[test]
fn test_duplicate_kind_role() {
    let toml = r#"
version = 1
[[signature]]
kinds = ["server-connection"]
role = "socket"
type = "TCPWRAP"

[[signature]]
kinds = ["client-connection", "server-connection"]
role = "socket"
type = "TCPWRAP"
"#;
    let err = SignatureTable::from_toml_str(toml).unwrap_err();
    assert!(err.to_string().contains("Duplicate socket signature"));
}

#[test]
fn test_unknown_type_tag_rejected() {
    let toml = r#"
version = 1
[[signature]]
kinds = ["listen"]
role = "listener"
type = "PIPEWRAP"
"#;
    let err = SignatureTable::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, SignatureError::UnknownType { role: Role::Listener }));
}

#[test]
fn test_missing_file() {
    let err = SignatureTable::from_toml("/nonexistent/signatures.toml").unwrap_err();
    assert!(matches!(err, SignatureError::Read { .. }));
}
