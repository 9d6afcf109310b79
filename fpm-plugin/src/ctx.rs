// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dataplane operation contexts as handed over by the host engine.
//!
//! A context is tagged by a [`DplaneOp`] and carries the payload for that
//! operation kind. The engine owns contexts before they are dequeued by the
//! provider and after they are returned to its output queue.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use fpm_wire::rtnl;

/// Operation kinds the plugin receives. Kinds outside the handled set are
/// accepted and completed without emitting anything to the peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DplaneOp {
    RouteInstall,
    RouteUpdate,
    RouteDelete,
    NexthopInstall,
    NexthopUpdate,
    NexthopDelete,
    LspInstall,
    LspUpdate,
    LspDelete,
    MacInstall,
    MacDelete,
    AddrInstall,
    AddrUninstall,
    RouteNotify,
    /* received but never framed */
    NeighInstall,
    NeighDelete,
    VtepAdd,
    VtepDelete,
}

/// Completion status stamped on a context before it is returned to the
/// engine.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CtxStatus {
    #[default]
    Pending,
    Success,
    Failure,
}

/// Route protocols, with their `rtm_protocol` wire values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RouteProtocol {
    Kernel,
    Connected,
    Static,
    Rip,
    Ospf,
    Isis,
    Bgp,
    Eigrp,
    Nhrp,
    Babel,
    Sharp,
    #[default]
    Zebra,
}

impl RouteProtocol {
    #[must_use]
    pub fn rtm_protocol(self) -> u8 {
        match self {
            RouteProtocol::Kernel | RouteProtocol::Connected => rtnl::RTPROT_KERNEL,
            RouteProtocol::Static => rtnl::RTPROT_ZSTATIC,
            RouteProtocol::Rip => rtnl::RTPROT_RIP,
            RouteProtocol::Ospf => rtnl::RTPROT_OSPF,
            RouteProtocol::Isis => rtnl::RTPROT_ISIS,
            RouteProtocol::Bgp => rtnl::RTPROT_BGP,
            RouteProtocol::Eigrp => rtnl::RTPROT_EIGRP,
            RouteProtocol::Nhrp => rtnl::RTPROT_NHRP,
            RouteProtocol::Babel => rtnl::RTPROT_BABEL,
            RouteProtocol::Sharp => rtnl::RTPROT_SHARP,
            RouteProtocol::Zebra => rtnl::RTPROT_ZEBRA,
        }
    }
}

/// SRv6 endpoint behaviors. `Unspec` means the nexthop carries no localsid.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Seg6LocalAction {
    #[default]
    Unspec,
    End,
    EndX,
    EndT,
    EndDx2,
    EndDx6,
    EndDx4,
    EndDt6,
    EndDt4,
    EndDt46,
}

/// Arguments of a seg6local action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Seg6LocalCtx {
    pub nh4: Ipv4Addr,
    pub nh6: Ipv6Addr,
    pub table: u32,
}

impl Default for Seg6LocalCtx {
    fn default() -> Self {
        Self {
            nh4: Ipv4Addr::UNSPECIFIED,
            nh6: Ipv6Addr::UNSPECIFIED,
            table: u32::default(),
        }
    }
}

/// SRv6 state attached to a nexthop. A zero `seg6_segs` means the nexthop
/// carries no VPN SID.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Srv6Info {
    pub seg6local_action: Seg6LocalAction,
    pub seg6local_ctx: Seg6LocalCtx,
    pub seg6_segs: Ipv6Addr,
}

impl Default for Srv6Info {
    fn default() -> Self {
        Self {
            seg6local_action: Seg6LocalAction::default(),
            seg6local_ctx: Seg6LocalCtx::default(),
            seg6_segs: Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl Srv6Info {
    #[must_use]
    pub fn has_vpn_sid(&self) -> bool {
        !self.seg6_segs.is_unspecified()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Nexthop {
    pub gateway: Option<IpAddr>,
    pub ifindex: Option<u32>,
    pub weight: u8,
    pub blackhole: bool,
    pub srv6: Option<Srv6Info>,
}

impl Nexthop {
    #[must_use]
    pub fn gateway(addr: IpAddr, ifindex: u32) -> Self {
        Nexthop {
            gateway: Some(addr),
            ifindex: Some(ifindex),
            weight: 1,
            ..Nexthop::default()
        }
    }

    #[must_use]
    pub fn blackhole() -> Self {
        Nexthop {
            blackhole: true,
            weight: 1,
            ..Nexthop::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteCtx {
    pub prefix: IpNet,
    pub table_id: u32,
    pub vrf_id: u32,
    pub protocol: RouteProtocol,
    pub old_protocol: RouteProtocol,
    pub metric: u32,
    /// Nexthop-group id, 0 when the route does not reference a group.
    pub nhg_id: u32,
    pub nexthops: Vec<Nexthop>,
}

impl RouteCtx {
    #[must_use]
    pub fn new(prefix: IpNet, table_id: u32, vrf_id: u32) -> Self {
        RouteCtx {
            prefix,
            table_id,
            vrf_id,
            protocol: RouteProtocol::default(),
            old_protocol: RouteProtocol::default(),
            metric: 20,
            nhg_id: 0,
            nexthops: Vec::new(),
        }
    }

    /// First nexthop's SRv6 state, if any. Selects between the plain,
    /// localsid and VPN route encodings.
    #[must_use]
    pub fn srv6(&self) -> Option<&Srv6Info> {
        self.nexthops.first().and_then(|nh| nh.srv6.as_ref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NexthopCtx {
    pub id: u32,
    pub protocol: RouteProtocol,
    /// Members as (nexthop id, weight); empty for a standalone nexthop.
    pub group: Vec<(u32, u8)>,
    pub nexthop: Nexthop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LspNexthop {
    pub out_labels: Vec<u32>,
    pub gateway: IpAddr,
    pub ifindex: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LspCtx {
    pub in_label: u32,
    pub nexthops: Vec<LspNexthop>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacCtx {
    pub mac: [u8; 6],
    pub vtep_ip: Ipv4Addr,
    pub vxlan_ifindex: u32,
    pub bridge_ifindex: u32,
    pub vid: u16,
    pub sticky: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrCtx {
    pub ifname: String,
    pub address: IpNet,
}

/// Route notification decoded from an inbound `RTM_NEWROUTE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteNotifyCtx {
    pub prefix: IpNet,
    pub table_id: u32,
    pub rtm_protocol: u8,
    pub metric: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CtxBody {
    Route(RouteCtx),
    Nexthop(NexthopCtx),
    Lsp(LspCtx),
    Mac(MacCtx),
    Addr(AddrCtx),
    RouteNotify(RouteNotifyCtx),
    None,
}

/// One dataplane operation in flight between engine and plugin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DplaneCtx {
    pub op: DplaneOp,
    pub body: CtxBody,
    pub status: CtxStatus,
}

impl DplaneCtx {
    #[must_use]
    pub fn route(op: DplaneOp, route: RouteCtx) -> Self {
        DplaneCtx {
            op,
            body: CtxBody::Route(route),
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn nexthop(op: DplaneOp, nexthop: NexthopCtx) -> Self {
        DplaneCtx {
            op,
            body: CtxBody::Nexthop(nexthop),
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn lsp(op: DplaneOp, lsp: LspCtx) -> Self {
        DplaneCtx {
            op,
            body: CtxBody::Lsp(lsp),
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn mac(op: DplaneOp, mac: MacCtx) -> Self {
        DplaneCtx {
            op,
            body: CtxBody::Mac(mac),
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn addr(op: DplaneOp, addr: AddrCtx) -> Self {
        DplaneCtx {
            op,
            body: CtxBody::Addr(addr),
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn route_notify(notify: RouteNotifyCtx) -> Self {
        DplaneCtx {
            op: DplaneOp::RouteNotify,
            body: CtxBody::RouteNotify(notify),
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn other(op: DplaneOp) -> Self {
        DplaneCtx {
            op,
            body: CtxBody::None,
            status: CtxStatus::Pending,
        }
    }

    #[must_use]
    pub fn route_ctx(&self) -> Option<&RouteCtx> {
        match &self.body {
            CtxBody::Route(rc) => Some(rc),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_wire_values() {
        assert_eq!(RouteProtocol::Bgp.rtm_protocol(), 186);
        assert_eq!(RouteProtocol::Static.rtm_protocol(), 196);
        assert_eq!(RouteProtocol::Sharp.rtm_protocol(), 194);
        assert_eq!(RouteProtocol::Zebra.rtm_protocol(), 11);
        assert_eq!(RouteProtocol::Kernel.rtm_protocol(), 2);
    }

    #[test]
    fn zero_segs_means_no_vpn_sid() {
        let mut info = Srv6Info::default();
        assert!(!info.has_vpn_sid());
        info.seg6_segs = "fc00::1".parse().unwrap();
        assert!(info.has_vpn_sid());
    }
}
