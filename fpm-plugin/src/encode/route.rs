// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Unicast route encoding

use bytes::Bytes;
use ipnet::IpNet;

use fpm_wire::message::{NlMsgWriter, RtMsg};
use fpm_wire::rtnl;

use crate::ctx::{RouteCtx, Seg6LocalAction};
use crate::encode::{put_addr, route_flags, srv6, vrf_table_fields, EncodeError, EncodeOpts};
use crate::engine::EngineTables;
use crate::NL_PKT_BUF_SIZE;

/// Encode one route message. SRv6 nexthops take the localsid or VPN
/// encodings; everything else is a plain (possibly multipath) route.
pub(super) fn encode(
    tables: &EngineTables,
    rc: &RouteCtx,
    cmd: u16,
    opts: EncodeOpts,
) -> Result<Bytes, EncodeError> {
    if let Some(srv6_info) = rc.srv6() {
        if srv6_info.seg6local_action != Seg6LocalAction::Unspec {
            return srv6::localsid(tables, rc, srv6_info, cmd, opts);
        }
        if srv6_info.has_vpn_sid() {
            return srv6::vpn_route(tables, rc, srv6_info, cmd, opts);
        }
        return Err(EncodeError::InvalidSrv6Nexthop);
    }
    plain(rc, cmd, opts)
}

fn plain(rc: &RouteCtx, cmd: u16, opts: EncodeOpts) -> Result<Bytes, EncodeError> {
    let install = cmd == rtnl::RTM_NEWROUTE;
    let v4 = matches!(rc.prefix, IpNet::V4(_));
    let (table, table_attr) = vrf_table_fields(rc.vrf_id);

    let blackhole = rc.nexthops.iter().any(|nh| nh.blackhole);
    let protocol = if install { rc.protocol } else { rc.old_protocol };

    let mut w = NlMsgWriter::new(NL_PKT_BUF_SIZE, cmd, route_flags(install, v4, opts));
    w.put_rtmsg(RtMsg {
        family: if v4 { rtnl::AF_INET } else { rtnl::AF_INET6 },
        dst_len: rc.prefix.prefix_len(),
        table,
        protocol: protocol.rtm_protocol(),
        scope: rtnl::RT_SCOPE_UNIVERSE,
        rtype: if blackhole {
            rtnl::RTN_BLACKHOLE
        } else {
            rtnl::RTN_UNICAST
        },
        ..RtMsg::default()
    })?;

    put_addr(&mut w, rtnl::RTA_DST, rc.prefix.addr())?;
    if let Some(vrf_id) = table_attr {
        w.put_u32(rtnl::RTA_TABLE, vrf_id)?;
    }

    // Deletes match on the destination alone.
    if !install {
        return Ok(w.finish());
    }

    w.put_u32(rtnl::RTA_PRIORITY, rc.metric)?;

    if opts.use_nhg && rc.nhg_id != 0 {
        w.put_u32(rtnl::RTA_NH_ID, rc.nhg_id)?;
        return Ok(w.finish());
    }

    let nexthops: Vec<_> = rc.nexthops.iter().filter(|nh| !nh.blackhole).collect();
    match nexthops[..] {
        [] => {}
        [nh] => {
            if let Some(gateway) = nh.gateway {
                put_addr(&mut w, rtnl::RTA_GATEWAY, gateway)?;
            }
            if let Some(oif) = nh.ifindex {
                w.put_u32(rtnl::RTA_OIF, oif)?;
            }
        }
        _ => {
            let nest = w.begin_nest(rtnl::RTA_MULTIPATH)?;
            for nh in &nexthops {
                let ifindex = nh.ifindex.unwrap_or(0) as i32;
                let entry = w.begin_rtnh(ifindex, nh.weight.saturating_sub(1))?;
                if let Some(gateway) = nh.gateway {
                    put_addr(&mut w, rtnl::RTA_GATEWAY, gateway)?;
                }
                w.end_rtnh(entry);
            }
            w.end_nest(nest);
        }
    }

    Ok(w.finish())
}
