// Integration Test Utilities
//
// Builders for activity snapshots shaped like real captures: stacks, owners
// and timestamps that the default signature table recognizes.

#![allow(dead_code)]

use netstitch::activity::{Activity, ActivityId, ActivitySnapshot, ActivityType, Resource};
use serde_json::{json, Value};

pub fn activity(id: ActivityId, t: ActivityType, trigger: ActivityId, stack: &[&str]) -> Activity {
    let mut a = Activity::new(id, t);
    a.trigger_id = Some(trigger);
    a.init_stack = Some(stack.iter().map(|s| s.to_string()).collect());
    a
}

pub fn with_resource(mut a: Activity, resource: Value) -> Activity {
    a.resource = Some(Resource::new(resource));
    a
}

pub fn with_times(mut a: Activity, init: u64, before: &[u64], after: &[u64]) -> Activity {
    a.init = Some(init);
    a.before = before.to_vec();
    a.after = after.to_vec();
    a
}

pub fn listener(id: ActivityId, trigger: ActivityId) -> Activity {
    let a = activity(
        id,
        ActivityType::TcpWrap,
        trigger,
        &[
            "at createServerHandle (net.js:1200:14)",
            "at Server._listen2 (net.js:1244:14)",
            "at listen (net.js:1312:10)",
            "at Server.listen (net.js:1391:9)",
            "at Test.<anonymous> (/dev/test/one-tcp-server.listen+close.js:30:6)",
        ],
    );
    with_resource(
        with_times(a, 26_129_000, &[], &[]),
        json!({ "_connectionKey": { "val": "6::::3000" } }),
    )
}

/// Socket created by core for an accepted connection (empty stack)
pub fn server_socket(id: ActivityId, trigger: ActivityId, init: u64) -> Activity {
    let mut a = Activity::new(id, ActivityType::TcpWrap);
    a.trigger_id = Some(trigger);
    a.init_stack = Some(Vec::new());
    a.init = Some(init);
    with_resource(
        a,
        json!({ "owner": { "proto": "Socket", "server": { "_connectionKey": "6::::3000" } } }),
    )
}

pub fn shutdown(id: ActivityId, trigger: ActivityId, init: u64, after: u64) -> Activity {
    let a = activity(
        id,
        ActivityType::ShutdownWrap,
        trigger,
        &[
            "at Socket.onSocketFinish (net.js:240:26)",
            "at emitNone (events.js:86:13)",
        ],
    );
    with_times(a, init, &[after - 100], &[after])
}

pub fn client_socket(id: ActivityId, trigger: ActivityId) -> Activity {
    let a = activity(
        id,
        ActivityType::TcpWrap,
        trigger,
        &[
            "at Socket.connect (net.js:932:40)",
            "at Object.exports.connect.exports.createConnection (net.js:75:35)",
            "at Object.<anonymous> (/dev/scenarios/one-connection/client:19:4)",
        ],
    );
    with_resource(
        with_times(a, 2_600_000, &[5_000_000], &[5_200_000]),
        json!({ "owner": { "proto": "Socket" } }),
    )
}

pub fn getaddrinfo(id: ActivityId, trigger: ActivityId) -> Activity {
    activity(
        id,
        ActivityType::GetAddrInfoReqWrap,
        trigger,
        &[
            "at lookup (dns.js:182:19)",
            "at lookupAndConnect (net.js:1053:3)",
            "at Socket.connect (net.js:948:5)",
            "at Object.exports.connect.exports.createConnection (net.js:75:35)",
            "at Object.<anonymous> (/dev/scenarios/one-connection/client:19:4)",
        ],
    )
}

pub fn connect(id: ActivityId, trigger: ActivityId) -> Activity {
    activity(
        id,
        ActivityType::TcpConnectWrap,
        trigger,
        &[
            "at internalConnect (net.js:918:26)",
            "at GetAddrInfoReqWrap.emitLookup [as callback] (net.js:1077:7)",
        ],
    )
}

pub fn timer(id: ActivityId, trigger: ActivityId) -> Activity {
    activity(id, ActivityType::Timeout, trigger, &["at setTimeout (timers.js:386:19)"])
}

/// socket 2 → shutdown 6; gai 3 → connect 5; timer 4 under the socket
pub fn client_snapshot() -> ActivitySnapshot {
    ActivitySnapshot::from_activities([
        client_socket(2, 1),
        getaddrinfo(3, 1),
        timer(4, 2),
        connect(5, 3),
        shutdown(6, 2, 20_000_000, 21_460_000),
    ])
}

pub const TLS_ORIGIN: &str = "at Socket.onserverListening (/dev/test/tls-one-connection.client.js:91:10)";

fn tls_client_stack(origin: &str) -> Vec<String> {
    [
        "at TLSSocket._wrapHandle (_tls_wrap.js:372:42)",
        "at new TLSSocket (_tls_wrap.js:290:18)",
        "at Object.exports.connect (_tls_wrap.js:1051:16)",
        origin,
        "at emitOne (events.js:126:20)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn tls_client_socket(id: ActivityId, trigger: ActivityId) -> Activity {
    let mut a = Activity::new(id, ActivityType::TcpWrap);
    a.trigger_id = Some(trigger);
    a.init_stack = Some(tls_client_stack(TLS_ORIGIN));
    with_resource(
        with_times(a, 148_565_595, &[157_863_372], &[158_064_014]),
        json!({ "owner": { "proto": "TLSSocket" } }),
    )
}

pub fn tls_wrap(id: ActivityId, trigger: ActivityId, init: u64, before: u64, after: u64) -> Activity {
    let mut a = Activity::new(id, ActivityType::TlsWrap);
    a.trigger_id = Some(trigger);
    a.init_stack = Some(tls_client_stack(TLS_ORIGIN));
    with_resource(
        with_times(a, init, &[before], &[after]),
        json!({ "owner": { "proto": "TLSSocket", "_tlsOptions": { "requestCert": false } } }),
    )
}

pub fn tls_connect(id: ActivityId, trigger: ActivityId) -> Activity {
    activity(
        id,
        ActivityType::TcpConnectWrap,
        trigger,
        &[
            "at TLSWrap.methodProxy [as connect6] (_tls_wrap.js:327:33)",
            "at connect (net.js:923:26)",
            "at emitLookup (net.js:1072:7)",
        ],
    )
}

/// TLS socket 10 and wrap 11 share parent 1; gai 12 → connect 13; shutdown 14
pub fn tls_client_snapshot(wrap: Activity) -> ActivitySnapshot {
    ActivitySnapshot::from_activities([
        tls_client_socket(10, 1),
        wrap,
        getaddrinfo(12, 11),
        tls_connect(13, 12),
        shutdown(14, 10, 160_000_000, 161_000_000),
    ])
}

pub fn observed_tls_wrap() -> Activity {
    tls_wrap(11, 1, 149_439_787, 153_352_646, 153_461_245)
}
