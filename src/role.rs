//! Roles and operation kinds
//!
//! A role is the part an activity plays within one kind of operation. The same
//! runtime type tag can mean different things for different kinds (a
//! `TCPWRAP` is the listener of a listen operation but the socket of a
//! connection), so roles are always assigned per kind.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Listener,
    Socket,
    AddressResolution,
    Connect,
    Shutdown,
    ProtocolParser,
    TlsWrap,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Listener,
        Role::Socket,
        Role::AddressResolution,
        Role::Connect,
        Role::Shutdown,
        Role::ProtocolParser,
        Role::TlsWrap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Listener => "listener",
            Role::Socket => "socket",
            Role::AddressResolution => "address-resolution",
            Role::Connect => "connect",
            Role::Shutdown => "shutdown",
            Role::ProtocolParser => "protocol-parser",
            Role::TlsWrap => "tls-wrap",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of network operation reconstructed from activities
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// `server.listen()`
    Listen,
    /// A connection accepted by a TCP server
    ServerConnection,
    HttpServerConnection,
    TlsServerConnection,
    /// A connection dialed out by a TCP client
    ClientConnection,
    HttpClientConnection,
    TlsClientConnection,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Listen,
        OperationKind::ServerConnection,
        OperationKind::HttpServerConnection,
        OperationKind::TlsServerConnection,
        OperationKind::ClientConnection,
        OperationKind::HttpClientConnection,
        OperationKind::TlsClientConnection,
    ];

    /// Human-readable operation name, e.g. "tcp:client connection"
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Listen => "tcp:listen",
            OperationKind::ServerConnection => "tcp:server connection",
            OperationKind::HttpServerConnection => "http:server connection",
            OperationKind::TlsServerConnection => "tls:server connection",
            OperationKind::ClientConnection => "tcp:client connection",
            OperationKind::HttpClientConnection => "http:client connection",
            OperationKind::TlsClientConnection => "tls:client connection",
        }
    }

    /// Roles this kind classifies, in reduction precedence order
    ///
    /// When an activity holds several roles for one kind, the earliest role
    /// listed here is the one it is reduced as.
    pub fn roles(&self) -> &'static [Role] {
        match self {
            OperationKind::Listen => &[Role::Listener],
            OperationKind::ServerConnection => &[Role::Socket, Role::Shutdown],
            OperationKind::HttpServerConnection => {
                &[Role::Socket, Role::Shutdown, Role::ProtocolParser]
            }
            OperationKind::TlsServerConnection => &[Role::Socket, Role::Shutdown, Role::TlsWrap],
            OperationKind::ClientConnection => &[
                Role::Socket,
                Role::AddressResolution,
                Role::Connect,
                Role::Shutdown,
            ],
            OperationKind::HttpClientConnection => &[
                Role::Socket,
                Role::AddressResolution,
                Role::Connect,
                Role::Shutdown,
                Role::ProtocolParser,
            ],
            OperationKind::TlsClientConnection => &[
                Role::Socket,
                Role::AddressResolution,
                Role::Connect,
                Role::Shutdown,
                Role::TlsWrap,
            ],
        }
    }

    /// Role whose members become group roots
    pub fn root_role(&self) -> Role {
        match self {
            OperationKind::Listen => Role::Listener,
            _ => Role::Socket,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
