// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Engine tables and lookups

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv6Addr};

use ahash::RandomState;
use ipnet::IpNet;
use tracing::debug;

use crate::ctx::{CtxBody, DplaneCtx, DplaneOp, LspCtx, MacCtx, NexthopCtx, RouteCtx};

#[derive(Clone, Debug)]
pub struct VrfInfo {
    pub id: u32,
    pub name: String,
    pub table_id: u32,
}

#[derive(Clone, Debug)]
pub struct EngineInterface {
    pub name: String,
    pub ifindex: u32,
    pub addresses: Vec<IpNet>,
}

#[derive(Clone, Debug)]
pub struct Srv6Locator {
    pub name: String,
    pub prefix: IpNet,
    pub block_bits: u8,
    pub node_bits: u8,
    pub func_bits: u8,
    pub arg_bits: u8,
    pub usid: bool,
}

#[derive(Clone, Debug)]
pub struct LspEntry {
    pub lsp: LspCtx,
    pub fpm_sent: bool,
}

#[derive(Clone, Debug)]
pub struct NhgEntry {
    pub nexthop: NexthopCtx,
    pub fpm_sent: bool,
}

#[derive(Clone, Debug)]
pub struct RibDest {
    /// The route selected for installation; walks skip destinations without
    /// one.
    pub selected: Option<RouteCtx>,
    pub fpm_sent: bool,
}

#[derive(Clone, Debug)]
pub struct RmacEntry {
    pub mac: MacCtx,
    pub fpm_sent: bool,
}

/// All engine state the plugin reads or flags. The replayable tables are
/// ordered maps: a suspended walk resumes in iteration order without
/// re-visiting sent entries.
#[derive(Debug, Default)]
pub struct EngineTables {
    pub vrfs: BTreeMap<u32, VrfInfo>,
    pub interfaces: HashMap<String, EngineInterface, RandomState>,
    pub locators: Vec<Srv6Locator>,
    pub lsps: BTreeMap<u32, LspEntry>,
    pub nhgs: BTreeMap<u32, NhgEntry>,
    pub rib: BTreeMap<(u32, IpNet), RibDest>,
    pub l3vnis: BTreeMap<u32, BTreeMap<[u8; 6], RmacEntry>>,
}

impl EngineTables {
    #[must_use]
    pub fn new() -> Self {
        EngineTables::default()
    }

    pub fn add_vrf(&mut self, id: u32, name: &str, table_id: u32) {
        self.vrfs.insert(
            id,
            VrfInfo {
                id,
                name: name.to_string(),
                table_id,
            },
        );
    }

    #[must_use]
    pub fn vrf_by_table_id(&self, table_id: u32) -> Option<&VrfInfo> {
        self.vrfs.values().find(|vrf| vrf.table_id == table_id)
    }

    pub fn add_interface(&mut self, name: &str, ifindex: u32, addresses: Vec<IpNet>) {
        self.interfaces.insert(
            name.to_string(),
            EngineInterface {
                name: name.to_string(),
                ifindex,
                addresses,
            },
        );
    }

    /// The SRv6 encap source address candidate: the first global (neither
    /// loopback nor link-local) IPv6 address on interface "lo", or the
    /// unspecified address when there is none.
    #[must_use]
    pub fn encap_source_addr(&self) -> Ipv6Addr {
        let Some(lo) = self.interfaces.get("lo") else {
            return Ipv6Addr::UNSPECIFIED;
        };
        lo.addresses
            .iter()
            .find_map(|net| match net.addr() {
                IpAddr::V6(addr)
                    if !addr.is_loopback() && !addr.is_unicast_link_local() =>
                {
                    Some(addr)
                }
                _ => None,
            })
            .unwrap_or(Ipv6Addr::UNSPECIFIED)
    }

    pub fn add_locator(&mut self, locator: Srv6Locator) {
        self.locators.push(locator);
    }

    /// First locator whose prefix covers `sid`.
    #[must_use]
    pub fn matching_locator(&self, sid: &IpNet) -> Option<&Srv6Locator> {
        self.locators
            .iter()
            .find(|locator| locator.prefix.contains(&sid.addr()))
    }

    pub fn install_lsp(&mut self, lsp: LspCtx) {
        self.lsps.insert(
            lsp.in_label,
            LspEntry {
                lsp,
                fpm_sent: false,
            },
        );
    }

    pub fn install_nhg(&mut self, nexthop: NexthopCtx) {
        self.nhgs.insert(
            nexthop.id,
            NhgEntry {
                nexthop,
                fpm_sent: false,
            },
        );
    }

    pub fn install_route(&mut self, route: RouteCtx) {
        self.rib.insert(
            (route.table_id, route.prefix),
            RibDest {
                selected: Some(route),
                fpm_sent: false,
            },
        );
    }

    pub fn remove_route(&mut self, table_id: u32, prefix: IpNet) {
        self.rib.remove(&(table_id, prefix));
    }

    pub fn install_rmac(&mut self, vni: u32, mac: MacCtx) {
        self.l3vnis.entry(vni).or_default().insert(
            mac.mac,
            RmacEntry {
                mac,
                fpm_sent: false,
            },
        );
    }

    /// A steady-state update reached the peer through the context queue, so
    /// a replay walk in progress must not send the object again: flag it as
    /// sent. Deletes are left alone, the engine removes the objects itself.
    pub(crate) fn note_refreshed(&mut self, ctx: &DplaneCtx) {
        match (ctx.op, &ctx.body) {
            (DplaneOp::RouteInstall | DplaneOp::RouteUpdate, CtxBody::Route(rc)) => {
                if let Some(dest) = self.rib.get_mut(&(rc.table_id, rc.prefix)) {
                    dest.fpm_sent = true;
                }
            }
            (DplaneOp::NexthopInstall | DplaneOp::NexthopUpdate, CtxBody::Nexthop(nc)) => {
                if let Some(entry) = self.nhgs.get_mut(&nc.id) {
                    entry.fpm_sent = true;
                }
            }
            (DplaneOp::LspInstall | DplaneOp::LspUpdate, CtxBody::Lsp(lc)) => {
                if let Some(entry) = self.lsps.get_mut(&lc.in_label) {
                    entry.fpm_sent = true;
                }
            }
            (DplaneOp::MacInstall, CtxBody::Mac(mc)) => {
                for rmacs in self.l3vnis.values_mut() {
                    if let Some(entry) = rmacs.get_mut(&mc.mac) {
                        entry.fpm_sent = true;
                    }
                }
            }
            _ => {}
        }
    }

    /// Clear the sent flag on RIB destinations whose selected route carries
    /// an SRv6 VPN SID, so they are sent again with a fresh encap source
    /// address.
    pub(crate) fn reset_srv6_route_flags(&mut self) {
        let mut cleared = 0usize;
        for dest in self.rib.values_mut() {
            let has_vpn_sid = dest
                .selected
                .as_ref()
                .and_then(|route| route.nexthops.first())
                .and_then(|nh| nh.srv6.as_ref())
                .is_some_and(crate::ctx::Srv6Info::has_vpn_sid);
            if has_vpn_sid {
                dest.fpm_sent = false;
                cleared += 1;
            }
        }
        debug!("cleared the sent flag on {cleared} SRv6 VPN routes");
    }
}
