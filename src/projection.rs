//! Field projection of protocol resources into summary sub-records
//!
//! HTTP parsers and TLS wraps carry large internal state. Only a fixed
//! allow-list of fields is copied into operation summaries.

use crate::activity::{captured_string, Activity, ActivityId, Resource};
use crate::user_functions::{unique_user_functions, UserFunction};
use serde::Serialize;
use serde_json::Value;

fn bool_at(v: &Value, key: &str) -> Option<bool> {
    v.get(key).and_then(Value::as_bool)
}

fn u64_at(v: &Value, key: &str) -> Option<u64> {
    v.get(key).and_then(Value::as_u64)
}

fn string_at(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(captured_string)
}

/// Request as seen by the parser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub http_version: Option<String>,
    pub headers_host: Option<String>,
    pub headers_connection: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub complete: Option<bool>,
    pub upgrade: Option<bool>,
    pub status_code: Option<u64>,
    pub status_message: Option<String>,
}

impl IncomingMessage {
    fn project(incoming: &Value) -> Self {
        let headers = incoming.get("headers").cloned().unwrap_or(Value::Null);
        Self {
            http_version: string_at(incoming, "httpVersion"),
            headers_host: string_at(&headers, "host"),
            headers_connection: string_at(&headers, "connection"),
            url: string_at(incoming, "url"),
            method: string_at(incoming, "method"),
            complete: bool_at(incoming, "complete"),
            upgrade: bool_at(incoming, "upgrade"),
            status_code: u64_at(incoming, "statusCode"),
            status_message: string_at(incoming, "statusMessage"),
        }
    }
}

/// Response being written on the parser's socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub header: Option<String>,
    pub status_code: Option<u64>,
    pub status_message: Option<String>,
    pub finished: Option<bool>,
    pub header_sent: Option<bool>,
    pub upgrading: Option<bool>,
    pub chunked_encoding: Option<bool>,
    pub should_keep_alive: Option<bool>,
    pub send_date: Option<bool>,
    pub has_body: Option<bool>,
    pub sent100: Option<bool>,
}

impl OutgoingMessage {
    fn project(message: &Value) -> Self {
        Self {
            header: string_at(message, "_header"),
            status_code: u64_at(message, "statusCode"),
            status_message: string_at(message, "statusMessage"),
            finished: bool_at(message, "finished"),
            header_sent: bool_at(message, "_headerSent"),
            upgrading: bool_at(message, "upgrading"),
            chunked_encoding: bool_at(message, "chunkedEncoding"),
            should_keep_alive: bool_at(message, "shouldKeepAlive"),
            send_date: bool_at(message, "sendDate"),
            has_body: bool_at(message, "_hasBody"),
            sent100: bool_at(message, "_sent100"),
        }
    }
}

/// Summary of the HTTP parser serving a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpParserRecord {
    pub id: ActivityId,
    pub trigger_id: Option<ActivityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<IncomingMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<OutgoingMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_functions: Vec<UserFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

pub fn project_http_parser(activity: &Activity) -> HttpParserRecord {
    let mut record = HttpParserRecord {
        id: activity.id,
        trigger_id: activity.trigger_id,
        incoming: None,
        outgoing: None,
        user_functions: Vec::new(),
        activity: None,
    };
    let Some(resource) = &activity.resource else {
        return record;
    };

    record.incoming = resource.lookup(&["incoming"]).map(IncomingMessage::project);
    record.outgoing = resource
        .lookup(&["socket", "_httpMessage"])
        .map(OutgoingMessage::project);
    record.user_functions = unique_user_functions(resource.functions(), "httpParser.resource");
    record
}

/// Summary of a TLS wrap: options, handle counters and socket state
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsRecord {
    pub id: ActivityId,
    pub trigger_id: Option<ActivityId>,

    pub opts_request_cert: Option<bool>,
    pub opts_reject_unauthorized: Option<bool>,
    pub opts_handshake_timeout: Option<u64>,

    pub write_queue_size: Option<u64>,
    pub fd: Option<i64>,
    pub bytes_read: Option<u64>,
    pub last_handshake_time: Option<u64>,
    pub handshakes: Option<u64>,

    pub contexts: Option<u64>,
    pub request_cert: Option<bool>,
    pub reject_unauthorized: Option<bool>,
    pub honor_cipher_order: Option<bool>,
    pub ciphers: Option<String>,
    pub session_id_context: Option<String>,
    pub connection_key: Option<String>,

    pub secure_established: Option<bool>,
    pub secure_pending: Option<bool>,
    pub new_session_pending: Option<bool>,
    pub control_released: Option<bool>,
    pub servername: Option<String>,
    pub npn_protocol: Option<String>,
    pub alpn_protocol: Option<String>,
    pub authorized: Option<bool>,
    pub authorization_error: Option<String>,
    pub encrypted: Option<bool>,
    pub had_error: Option<bool>,
    pub socket_request_cert: Option<bool>,
    pub socket_reject_unauthorized: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_functions: Vec<UserFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

pub fn project_tls(activity: &Activity) -> TlsRecord {
    let mut tls = TlsRecord {
        id: activity.id,
        trigger_id: activity.trigger_id,
        ..TlsRecord::default()
    };
    let Some(resource) = &activity.resource else {
        return tls;
    };

    if let Some(owner) = resource.owner() {
        project_owner(&mut tls, owner);
    }
    tls.user_functions = unique_user_functions(resource.functions(), "tls.resource");
    tls
}

fn project_owner(tls: &mut TlsRecord, owner: &Value) {
    if let Some(opts) = owner.get("_tlsOptions") {
        tls.opts_request_cert = bool_at(opts, "requestCert");
        tls.opts_reject_unauthorized = bool_at(opts, "rejectUnauthorized");
        tls.opts_handshake_timeout = u64_at(opts, "handshakeTimeout");
    }

    if let Some(handle) = owner.get("_handle") {
        tls.write_queue_size = u64_at(handle, "writeQueueSize");
        tls.fd = handle.get("fd").and_then(Value::as_i64);
        tls.bytes_read = u64_at(handle, "bytesRead");
        tls.last_handshake_time = u64_at(handle, "lastHandshakeTime");
        tls.handshakes = u64_at(handle, "handshakes");
    }

    if let Some(server) = owner.get("server").filter(|s| !s.is_null()) {
        tls.contexts = u64_at(server, "_contexts");
        tls.request_cert = bool_at(server, "requestCert");
        tls.reject_unauthorized = bool_at(server, "rejectUnauthorized");
        tls.honor_cipher_order = bool_at(server, "honorCipherOrder");
        tls.ciphers = string_at(server, "ciphers");
        tls.session_id_context = string_at(server, "sessionIdContext");
        tls.connection_key = string_at(server, "_connectionKey");
    }

    tls.secure_established = bool_at(owner, "_secureEstablished");
    tls.secure_pending = bool_at(owner, "_securePending");
    tls.new_session_pending = bool_at(owner, "_newSessionPending");
    tls.control_released = bool_at(owner, "_controlReleased");
    tls.servername = string_at(owner, "servername");
    tls.npn_protocol = string_at(owner, "npnProtocol");
    tls.alpn_protocol = string_at(owner, "alpnProtocol");
    tls.authorized = bool_at(owner, "authorized");
    tls.authorization_error = string_at(owner, "authorizationError");
    tls.encrypted = bool_at(owner, "encrypted");
    tls.had_error = bool_at(owner, "_hadError");
    tls.socket_request_cert = bool_at(owner, "_requestCert");
    tls.socket_reject_unauthorized = bool_at(owner, "_rejectUnauthorized");
}

/// Connection key of the server a socket belongs to, if strings were captured
pub fn connection_key(resource: Option<&Resource>) -> Option<String> {
    resource.and_then(Resource::connection_key)
}
