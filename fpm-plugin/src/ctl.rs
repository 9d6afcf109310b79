// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control surface exposed to the CLI node
//!
//! Commands never touch the session state directly: they enqueue events
//! that the plugin thread dispatches, keeping all mutation single-threaded.
//! Counter reads go straight to the shared atomics.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::errors::FpmError;
use crate::events::FpmEvent;
use crate::session::{FpmCore, SessionMsg};
use crate::stats::CountersSnapshot;
use crate::FPM_DEFAULT_PORT;

#[derive(Clone)]
pub struct FpmCtl {
    tx: UnboundedSender<SessionMsg>,
    core: Arc<FpmCore>,
}

impl FpmCtl {
    pub(crate) fn new(tx: UnboundedSender<SessionMsg>, core: Arc<FpmCore>) -> Self {
        FpmCtl { tx, core }
    }

    fn send(&self, event: FpmEvent) -> Result<(), FpmError> {
        self.tx
            .send(SessionMsg::Event(event))
            .map_err(|_| FpmError::PluginGone)
    }

    /// "fpm address A.B.C.D|X:X::X:X [port N]": set the peer and (re)enable
    /// the plugin.
    pub fn set_address(&self, address: IpAddr, port: Option<u16>) -> Result<(), FpmError> {
        let port = port.unwrap_or(FPM_DEFAULT_PORT);
        self.send(FpmEvent::SetAddress(SocketAddr::new(address, port)))
    }

    /// "no fpm address": disable the plugin until the next `set_address`.
    pub fn disable(&self) -> Result<(), FpmError> {
        self.send(FpmEvent::Disable)
    }

    /// "[no] fpm use-next-hop-groups". A request matching the current state
    /// is a no-op.
    pub fn use_nhg(&self, enable: bool) -> Result<(), FpmError> {
        if self.core.use_nhg() == enable {
            return Ok(());
        }
        self.send(FpmEvent::ToggleNhg)
    }

    /// "clear fpm counters".
    pub fn reset_counters(&self) -> Result<(), FpmError> {
        self.send(FpmEvent::ResetCounters)
    }

    /// "show fpm counters [json]" reads from this snapshot.
    #[must_use]
    pub fn counters(&self) -> CountersSnapshot {
        self.core.counters.snapshot()
    }

    /// Render the lines this plugin contributes to the running config.
    #[must_use]
    pub fn running_config(&self) -> String {
        let mut out = String::new();
        if self.core.disabled() {
            return out;
        }
        if let Some(address) = self.core.address() {
            out.push_str(&format!("fpm address {}", address.ip()));
            if address.port() != FPM_DEFAULT_PORT {
                out.push_str(&format!(" port {}", address.port()));
            }
            out.push('\n');
        }
        if !self.core.use_nhg() {
            out.push_str("no fpm use-next-hop-groups\n");
        }
        out
    }
}
