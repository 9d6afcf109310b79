// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-operation netlink encoders
//!
//! [`encode_ctx`] turns one dataplane context into zero, one or two netlink
//! messages: route updates become a delete followed by an install, the
//! ignored operation kinds and policy-suppressed ones become nothing.
//! Encoding failures are reported to the caller, which logs and drops the
//! operation without marking the object as sent.

mod lsp;
mod mac;
mod nexthop;
mod route;
mod srv6;

use std::net::IpAddr;

use bytes::Bytes;
use ipnet::IpNet;
use tracing::debug;

use fpm_wire::message::{NlMsgWriter, NoSpace};
use fpm_wire::rtnl;

use crate::ctx::{CtxBody, DplaneCtx, DplaneOp, Seg6LocalAction};
use crate::engine::EngineTables;

/// Encoding policy derived from the plugin configuration.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EncodeOpts {
    pub use_nhg: bool,
    pub v6_replace_semantics: bool,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum EncodeError {
    #[error("message does not fit the netlink scratch buffer")]
    TooBig,
    #[error("invalid srv6 nexthop")]
    InvalidSrv6Nexthop,
    #[error("srv6 localsid prefix must be IPv6, got {0}")]
    NotIpv6(IpNet),
    #[error("no vrf has table id {0}")]
    UnknownVrf(u32),
    #[error("unsupported seg6local action {0:?}")]
    UnsupportedAction(Seg6LocalAction),
}

impl From<NoSpace> for EncodeError {
    fn from(_: NoSpace) -> Self {
        EncodeError::TooBig
    }
}

/// Encode `ctx` into the netlink messages to frame, in emission order.
pub(crate) fn encode_ctx(
    tables: &EngineTables,
    ctx: &DplaneCtx,
    opts: EncodeOpts,
) -> Result<Vec<Bytes>, EncodeError> {
    match (ctx.op, &ctx.body) {
        (DplaneOp::RouteInstall | DplaneOp::RouteUpdate | DplaneOp::RouteDelete, CtxBody::Route(rc)) => {
            // Never forward routes from the default table: when the
            // management port goes down the engine withdraws its default
            // route, and relaying that would blackhole the management path.
            if rc.table_id == rtnl::RT_TABLE_DEFAULT {
                debug!("discarding default table route {}", rc.prefix);
                return Ok(Vec::new());
            }
            match ctx.op {
                DplaneOp::RouteInstall => {
                    Ok(vec![route::encode(tables, rc, rtnl::RTM_NEWROUTE, opts)?])
                }
                DplaneOp::RouteDelete => {
                    Ok(vec![route::encode(tables, rc, rtnl::RTM_DELROUTE, opts)?])
                }
                _ => Ok(vec![
                    route::encode(tables, rc, rtnl::RTM_DELROUTE, opts)?,
                    route::encode(tables, rc, rtnl::RTM_NEWROUTE, opts)?,
                ]),
            }
        }
        (DplaneOp::NexthopInstall | DplaneOp::NexthopUpdate | DplaneOp::NexthopDelete, CtxBody::Nexthop(nc)) => {
            // Quit as soon as possible when next hop groups are disabled.
            if !opts.use_nhg {
                return Ok(Vec::new());
            }
            let cmd = if ctx.op == DplaneOp::NexthopDelete {
                rtnl::RTM_DELNEXTHOP
            } else {
                rtnl::RTM_NEWNEXTHOP
            };
            Ok(vec![nexthop::encode(nc, cmd)?])
        }
        (DplaneOp::LspInstall | DplaneOp::LspUpdate | DplaneOp::LspDelete, CtxBody::Lsp(lc)) => {
            let cmd = if ctx.op == DplaneOp::LspDelete {
                rtnl::RTM_DELROUTE
            } else {
                rtnl::RTM_NEWROUTE
            };
            Ok(vec![lsp::encode(lc, cmd)?])
        }
        (DplaneOp::MacInstall | DplaneOp::MacDelete, CtxBody::Mac(mc)) => {
            let cmd = if ctx.op == DplaneOp::MacDelete {
                rtnl::RTM_DELNEIGH
            } else {
                rtnl::RTM_NEWNEIGH
            };
            Ok(vec![mac::encode(mc, cmd)?])
        }
        /* address events only feed the SRv6 encap-source tracking */
        _ => Ok(Vec::new()),
    }
}

/// Write an address attribute with the full 4/16 byte payload.
fn put_addr(w: &mut NlMsgWriter, ty: u16, addr: IpAddr) -> Result<(), NoSpace> {
    match addr {
        IpAddr::V4(a) => w.put_attr(ty, &a.octets()),
        IpAddr::V6(a) => w.put_attr(ty, &a.octets()),
    }
}

/// The table field carries the VRF id: small values inline in `rtm_table`,
/// larger ones as an `RTA_TABLE` attribute next to `RT_TABLE_UNSPEC`.
fn vrf_table_fields(vrf_id: u32) -> (u8, Option<u32>) {
    if vrf_id < 256 {
        (vrf_id as u8, None)
    } else {
        (rtnl::RT_TABLE_UNSPEC, Some(vrf_id))
    }
}

/// Header flags for route-shaped messages: installs are creations, and
/// replacements for IPv4 (or IPv6 when the engine runs with replace
/// semantics).
fn route_flags(install: bool, v4: bool, opts: EncodeOpts) -> u16 {
    let mut flags = rtnl::NLM_F_REQUEST;
    if install {
        flags |= rtnl::NLM_F_CREATE;
        if v4 || opts.v6_replace_semantics {
            flags |= rtnl::NLM_F_REPLACE;
        }
    }
    flags
}
