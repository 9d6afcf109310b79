// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control events dispatched on the plugin thread

use std::fmt::Display;
use std::net::SocketAddr;

/// The table a finished replay walk covered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WalkSource {
    Lsp,
    Nhg,
    Rib,
    Rmac,
}

impl Display for WalkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkSource::Lsp => write!(f, "LSP"),
            WalkSource::Nhg => write!(f, "next hop groups"),
            WalkSource::Rib => write!(f, "RIB"),
            WalkSource::Rmac => write!(f, "RMAC"),
        }
    }
}

/// External and internal events handled by the event dispatcher. Dispatch is
/// strictly single-threaded on the plugin thread; the CLI side only ever
/// enqueues.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FpmEvent {
    /// Store the peer address, clear the disabled flag and reconnect. This
    /// is the user "configure" event.
    SetAddress(SocketAddr),
    /// Stop talking to the peer until the next [`FpmEvent::SetAddress`].
    Disable,
    /// Zero the statistics counters.
    ResetCounters,
    /// Flip next-hop-group support and reconnect so the replay reflects the
    /// new policy.
    ToggleNhg,
    /// Reconnect request issued by our own code to avoid races.
    InternalReconnect,
    /// A replay walk completed (log-only marker).
    WalkFinished(WalkSource),
}
