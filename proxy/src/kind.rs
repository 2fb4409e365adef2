// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use nix::sys::socket::SockType;
use std::fmt::Display;
use std::str::FromStr;

use crate::ProxyError;

/// The type of unix socket a proxy relays between
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketKind {
    /// `SOCK_STREAM`, known as the `unix` network
    Stream,
    /// `SOCK_SEQPACKET`, known as the `unixpacket` network. Message boundaries are kept, which
    /// is what memif peers use.
    #[default]
    SeqPacket,
}

impl SocketKind {
    pub(crate) fn sock_type(self) -> SockType {
        match self {
            SocketKind::Stream => SockType::Stream,
            SocketKind::SeqPacket => SockType::SeqPacket,
        }
    }

    #[must_use]
    pub fn network(self) -> &'static str {
        match self {
            SocketKind::Stream => "unix",
            SocketKind::SeqPacket => "unixpacket",
        }
    }
}

impl FromStr for SocketKind {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unix" => Ok(SocketKind::Stream),
            "unixpacket" => Ok(SocketKind::SeqPacket),
            other => Err(ProxyError::UnknownNetwork(other.to_owned())),
        }
    }
}

impl Display for SocketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.network())
    }
}
