//! Text rendering of correlated operations

use crate::lifecycle::{Stamp, TimeAlive, UNKNOWN};
use crate::operation::Operation;
use crate::registry::MergedOutput;
use std::fmt::Write;

fn stamp(s: Option<Stamp>) -> String {
    s.map_or_else(|| UNKNOWN.to_string(), |s| s.pretty())
}

fn time_alive(t: TimeAlive) -> String {
    stamp(t.stamp())
}

fn member(out: &mut String, label: &str, id: Option<u64>) {
    if let Some(id) = id {
        let _ = writeln!(out, "  {:<12} {}", label, id);
    }
}

fn render_operation(out: &mut String, root: u64, op: &Operation, members: usize) {
    let _ = writeln!(out, "{} [{}] ({} activities)", op.kind, root, members);
    let _ = writeln!(out, "  {:<12} {}", "created at", op.created_at);
    let _ = writeln!(
        out,
        "  {:<12} created {} destroyed {} alive {}",
        "lifecycle",
        stamp(op.life_cycle.created),
        stamp(op.life_cycle.destroyed),
        time_alive(op.life_cycle.time_alive)
    );
    member(out, "listen", op.listen.as_ref().map(|r| r.id));
    member(out, "socket", op.socket.as_ref().map(|r| r.id));
    member(out, "getaddrinfo", op.getaddrinfo.as_ref().map(|r| r.id));
    member(out, "connect", op.connect.as_ref().map(|r| r.id));
    member(out, "shutdown", op.shutdown.as_ref().map(|r| r.id));
    member(out, "http parser", op.http_parser.as_ref().map(|r| r.id));
    member(out, "tls", op.tls.as_ref().map(|r| r.id));

    let key = op
        .listen
        .as_ref()
        .or(op.socket.as_ref())
        .and_then(|h| h.connection_key.as_deref());
    if let Some(key) = key {
        let _ = writeln!(out, "  {:<12} {}", "address", key);
    }
    for func in &op.user_functions {
        let _ = writeln!(out, "  {:<12} {}", "function", func.location);
    }
}

/// One block per operation in root id order, then ambiguous links
pub fn render_text(merged: &MergedOutput) -> String {
    let mut out = String::new();
    let output = &merged.output;

    if output.operations.is_empty() {
        out.push_str("No operations found\n");
    }
    for (&root, op) in &output.operations {
        let members = output.groups.get(&root).map_or(0, |g| g.len());
        render_operation(&mut out, root, op, members);
    }

    for ambiguity in &output.ambiguities {
        let _ = writeln!(
            out,
            "ambiguous {} TLS link for socket {}: candidates {:?}",
            ambiguity.kind, ambiguity.socket, ambiguity.candidates
        );
    }
    out
}
