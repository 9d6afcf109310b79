// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reconciliation walker
//!
//! Runs once per connection establishment, in strict order LSPs -> nexthop
//! groups -> RIB -> router MACs. Each phase clears the per-object sent
//! flags, then replays every unsent object. A full output buffer suspends
//! the phase; the resume timer re-enters it and the sent flags make the walk
//! pick up exactly where it stopped.

use std::time::Duration;

use ipnet::IpNet;
use tokio::time::Instant;
use tracing::debug;

use crate::ctx::{DplaneCtx, DplaneOp};
use crate::events::{FpmEvent, WalkSource};
use crate::session::{FpmSession, SessionMsg};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum WalkPhase {
    LspReset,
    LspSend,
    NhgReset,
    NhgSend,
    RibReset,
    RibSend,
    RmacReset,
    RmacSend,
    /// Targeted reset: only RIB entries carrying an SRv6 VPN SID.
    Srv6RouteReset,
}

#[derive(Debug, Default)]
pub(super) struct WalkState {
    phase: Option<WalkPhase>,
    deadline: Option<Instant>,
}

impl WalkState {
    pub(super) fn start(&mut self) {
        self.schedule(WalkPhase::LspReset, Duration::ZERO);
    }

    pub(super) fn cancel(&mut self) {
        self.phase = None;
        self.deadline = None;
    }

    pub(super) fn schedule(&mut self, phase: WalkPhase, delay: Duration) {
        self.phase = Some(phase);
        self.deadline = Some(Instant::now() + delay);
    }

    pub(super) fn schedule_srv6_reset(&mut self) {
        self.schedule(WalkPhase::Srv6RouteReset, Duration::ZERO);
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(super) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

impl FpmSession {
    /// Execute the due walker phase.
    pub(super) fn walker_step(&mut self) {
        self.walk.deadline = None;
        let Some(phase) = self.walk.phase else { return };
        if self.sock.is_none() {
            self.walk.cancel();
            return;
        }
        match phase {
            WalkPhase::LspReset => {
                for entry in self.core.engine.tables().lsps.values_mut() {
                    entry.fpm_sent = false;
                }
                self.walk.schedule(WalkPhase::LspSend, Duration::ZERO);
            }
            WalkPhase::LspSend => self.lsp_send(),
            WalkPhase::NhgReset => {
                for entry in self.core.engine.tables().nhgs.values_mut() {
                    entry.fpm_sent = false;
                }
                self.walk.schedule(WalkPhase::NhgSend, Duration::ZERO);
            }
            WalkPhase::NhgSend => self.nhg_send(),
            WalkPhase::RibReset => {
                for dest in self.core.engine.tables().rib.values_mut() {
                    dest.fpm_sent = false;
                }
                self.walk.schedule(WalkPhase::RibSend, Duration::ZERO);
            }
            WalkPhase::RibSend => self.rib_send(),
            WalkPhase::RmacReset => {
                for rmacs in self.core.engine.tables().l3vnis.values_mut() {
                    for entry in rmacs.values_mut() {
                        entry.fpm_sent = false;
                    }
                }
                self.walk.schedule(WalkPhase::RmacSend, Duration::ZERO);
            }
            WalkPhase::RmacSend => self.rmac_send(),
            WalkPhase::Srv6RouteReset => {
                self.core.engine.tables().reset_srv6_route_flags();
                self.walk.schedule(WalkPhase::RibSend, Duration::ZERO);
            }
        }
    }

    fn finish_walk(&self, source: WalkSource) {
        let _ = self
            .core
            .tx
            .send(SessionMsg::Event(FpmEvent::WalkFinished(source)));
    }

    fn lsp_send(&mut self) {
        let core = std::sync::Arc::clone(&self.core);
        let mut tables = core.engine.tables();
        let pending: Vec<u32> = tables
            .lsps
            .iter()
            .filter(|(_, entry)| !entry.fpm_sent)
            .map(|(label, _)| *label)
            .collect();
        for label in pending {
            let ctx = DplaneCtx::lsp(DplaneOp::LspInstall, tables.lsps[&label].lsp.clone());
            match core.enqueue(&tables, &ctx) {
                Err(_) => {
                    drop(tables);
                    self.walk.schedule(WalkPhase::LspSend, Duration::ZERO);
                    return;
                }
                Ok(sent) => {
                    if sent {
                        tables.lsps.get_mut(&label).unwrap().fpm_sent = true;
                    }
                }
            }
        }
        drop(tables);
        self.finish_walk(WalkSource::Lsp);
        // Now move onto the nexthop groups.
        self.walk.schedule(WalkPhase::NhgReset, Duration::ZERO);
    }

    fn nhg_send(&mut self) {
        let core = std::sync::Arc::clone(&self.core);
        if core.use_nhg() {
            let mut tables = core.engine.tables();
            let pending: Vec<u32> = tables
                .nhgs
                .iter()
                .filter(|(_, entry)| !entry.fpm_sent)
                .map(|(id, _)| *id)
                .collect();
            for id in pending {
                let ctx = DplaneCtx::nexthop(
                    DplaneOp::NexthopInstall,
                    tables.nhgs[&id].nexthop.clone(),
                );
                match core.enqueue(&tables, &ctx) {
                    Err(_) => {
                        // Our buffers are full, give it some cycles.
                        drop(tables);
                        self.walk.schedule(WalkPhase::NhgSend, Duration::ZERO);
                        return;
                    }
                    Ok(sent) => {
                        if sent {
                            tables.nhgs.get_mut(&id).unwrap().fpm_sent = true;
                        }
                    }
                }
            }
        }
        self.finish_walk(WalkSource::Nhg);
        // Done with the nexthop groups, install the routes now.
        self.walk.schedule(WalkPhase::RibReset, Duration::ZERO);
    }

    fn rib_send(&mut self) {
        let core = std::sync::Arc::clone(&self.core);
        let mut tables = core.engine.tables();
        let pending: Vec<(u32, IpNet)> = tables
            .rib
            .iter()
            .filter(|(_, dest)| dest.selected.is_some() && !dest.fpm_sent)
            .map(|(key, _)| *key)
            .collect();
        for key in pending {
            let route = tables.rib[&key].selected.clone().unwrap();
            let ctx = DplaneCtx::route(DplaneOp::RouteInstall, route);
            match core.enqueue(&tables, &ctx) {
                Err(_) => {
                    drop(tables);
                    let delay = self.rib_resume_delay;
                    self.walk.schedule(WalkPhase::RibSend, delay);
                    return;
                }
                Ok(sent) => {
                    if sent {
                        tables.rib.get_mut(&key).unwrap().fpm_sent = true;
                    }
                }
            }
        }
        drop(tables);
        self.finish_walk(WalkSource::Rib);
        self.walk.schedule(WalkPhase::RmacReset, Duration::ZERO);
    }

    fn rmac_send(&mut self) {
        let core = std::sync::Arc::clone(&self.core);
        let mut tables = core.engine.tables();
        let pending: Vec<(u32, [u8; 6])> = tables
            .l3vnis
            .iter()
            .flat_map(|(vni, rmacs)| {
                rmacs
                    .iter()
                    .filter(|(_, entry)| !entry.fpm_sent)
                    .map(|(mac, _)| (*vni, *mac))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (vni, mac) in pending {
            let ctx = DplaneCtx::mac(DplaneOp::MacInstall, tables.l3vnis[&vni][&mac].mac);
            match core.enqueue(&tables, &ctx) {
                Err(_) => {
                    drop(tables);
                    let delay = self.rib_resume_delay;
                    self.walk.schedule(WalkPhase::RmacSend, delay);
                    return;
                }
                Ok(sent) => {
                    if sent {
                        tables
                            .l3vnis
                            .get_mut(&vni)
                            .unwrap()
                            .get_mut(&mac)
                            .unwrap()
                            .fpm_sent = true;
                    }
                }
            }
        }
        drop(tables);
        self.finish_walk(WalkSource::Rmac);
        debug!("replay complete, entering steady state");
        self.walk.cancel();
    }
}
