// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! SRv6 localsid and VPN route encodings
//!
//! Localsids travel as the custom message types 1000/1001 with the FPM
//! localsid TLV set; VPN routes are regular `RTM_NEWROUTE`s carrying an
//! `RTA_ENCAP` nest of type 101 with the VPN SID and the encap source
//! address.

use bytes::Bytes;
use ipnet::IpNet;

use fpm_wire::message::{NlMsgWriter, RtMsg};
use fpm_wire::rtnl;

use crate::ctx::{RouteCtx, Seg6LocalAction, Srv6Info};
use crate::encode::{put_addr, route_flags, vrf_table_fields, EncodeError, EncodeOpts};
use crate::engine::EngineTables;
use crate::NL_PKT_BUF_SIZE;

pub(super) fn localsid(
    tables: &EngineTables,
    rc: &RouteCtx,
    srv6: &Srv6Info,
    cmd: u16,
    opts: EncodeOpts,
) -> Result<Bytes, EncodeError> {
    let cmd = match cmd {
        rtnl::RTM_NEWROUTE => rtnl::RTM_NEWSRV6LOCALSID,
        _ => rtnl::RTM_DELSRV6LOCALSID,
    };
    let install = cmd == rtnl::RTM_NEWSRV6LOCALSID;

    let IpNet::V6(sid) = rc.prefix else {
        return Err(EncodeError::NotIpv6(rc.prefix));
    };

    let protocol = if install { rc.protocol } else { rc.old_protocol };
    let (table, table_attr) = vrf_table_fields(rc.vrf_id);

    // Localsids are IPv6 objects: the replace rule is gated on the v6
    // replace semantics alone.
    let mut w = NlMsgWriter::new(NL_PKT_BUF_SIZE, cmd, route_flags(install, false, opts));
    w.put_rtmsg(RtMsg {
        family: rtnl::AF_INET6,
        dst_len: sid.prefix_len(),
        table,
        protocol: protocol.rtm_protocol(),
        scope: rtnl::RT_SCOPE_UNIVERSE,
        ..RtMsg::default()
    })?;

    w.put_attr(rtnl::FPM_SRV6_LOCALSID_SID_VALUE, &sid.addr().octets())?;
    if let Some(vrf_id) = table_attr {
        w.put_u32(rtnl::RTA_TABLE, vrf_id)?;
    }

    let locator = tables.matching_locator(&rc.prefix);
    if let Some(locator) = locator {
        let nest = w.begin_nest(rtnl::FPM_SRV6_LOCALSID_FORMAT)?;
        if locator.block_bits != 0 {
            w.put_u8(rtnl::FPM_SRV6_LOCALSID_FORMAT_BLOCK_LEN, locator.block_bits)?;
        }
        if locator.node_bits != 0 {
            w.put_u8(rtnl::FPM_SRV6_LOCALSID_FORMAT_NODE_LEN, locator.node_bits)?;
        }
        if locator.func_bits != 0 {
            w.put_u8(rtnl::FPM_SRV6_LOCALSID_FORMAT_FUNC_LEN, locator.func_bits)?;
        }
        if locator.arg_bits != 0 {
            w.put_u8(rtnl::FPM_SRV6_LOCALSID_FORMAT_ARG_LEN, locator.arg_bits)?;
        }
        w.end_nest(nest);
    }

    // Deletes match on the SID alone.
    if !install {
        return Ok(w.finish());
    }

    let usid = locator.is_some_and(|locator| locator.usid);
    let seg6local_ctx = &srv6.seg6local_ctx;

    match srv6.seg6local_action {
        Seg6LocalAction::End => {
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UN
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
        }
        Seg6LocalAction::EndX => {
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UA
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_X
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
            w.put_attr(rtnl::FPM_SRV6_LOCALSID_NH6, &seg6local_ctx.nh6.octets())?;
        }
        Seg6LocalAction::EndT => {
            let vrf = lookup_vrf(tables, seg6local_ctx.table)?;
            w.put_u32(
                rtnl::FPM_SRV6_LOCALSID_ACTION,
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_T,
            )?;
            put_vrfname(&mut w, &vrf)?;
        }
        Seg6LocalAction::EndDx6 => {
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UDX6
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_DX6
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
            w.put_attr(rtnl::FPM_SRV6_LOCALSID_NH6, &seg6local_ctx.nh6.octets())?;
        }
        Seg6LocalAction::EndDx4 => {
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UDX4
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_DX4
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
            w.put_attr(rtnl::FPM_SRV6_LOCALSID_NH4, &seg6local_ctx.nh4.octets())?;
        }
        Seg6LocalAction::EndDt6 => {
            let vrf = lookup_vrf(tables, seg6local_ctx.table)?;
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UDT6
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_DT6
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
            put_vrfname(&mut w, &vrf)?;
        }
        Seg6LocalAction::EndDt4 => {
            let vrf = lookup_vrf(tables, seg6local_ctx.table)?;
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UDT4
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_DT4
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
            put_vrfname(&mut w, &vrf)?;
        }
        Seg6LocalAction::EndDt46 => {
            let vrf = lookup_vrf(tables, seg6local_ctx.table)?;
            let action = if usid {
                rtnl::FPM_SRV6_LOCALSID_ACTION_UDT46
            } else {
                rtnl::FPM_SRV6_LOCALSID_ACTION_END_DT46
            };
            w.put_u32(rtnl::FPM_SRV6_LOCALSID_ACTION, action)?;
            put_vrfname(&mut w, &vrf)?;
        }
        action @ (Seg6LocalAction::Unspec | Seg6LocalAction::EndDx2) => {
            return Err(EncodeError::UnsupportedAction(action));
        }
    }

    Ok(w.finish())
}

pub(super) fn vpn_route(
    tables: &EngineTables,
    rc: &RouteCtx,
    srv6: &Srv6Info,
    cmd: u16,
    opts: EncodeOpts,
) -> Result<Bytes, EncodeError> {
    let install = cmd == rtnl::RTM_NEWROUTE;
    let v4 = matches!(rc.prefix, IpNet::V4(_));
    let protocol = if install { rc.protocol } else { rc.old_protocol };
    let (table, table_attr) = vrf_table_fields(rc.vrf_id);

    let mut w = NlMsgWriter::new(NL_PKT_BUF_SIZE, cmd, route_flags(install, v4, opts));
    w.put_rtmsg(RtMsg {
        family: if v4 { rtnl::AF_INET } else { rtnl::AF_INET6 },
        dst_len: rc.prefix.prefix_len(),
        table,
        protocol: protocol.rtm_protocol(),
        scope: rtnl::RT_SCOPE_UNIVERSE,
        rtype: rtnl::RTN_UNICAST,
        ..RtMsg::default()
    })?;

    put_addr(&mut w, rtnl::RTA_DST, rc.prefix.addr())?;
    if let Some(vrf_id) = table_attr {
        w.put_u32(rtnl::RTA_TABLE, vrf_id)?;
    }

    w.put_u16(rtnl::RTA_ENCAP_TYPE, rtnl::FPM_ROUTE_ENCAP_SRV6)?;
    let nest = w.begin_nest(rtnl::RTA_ENCAP)?;
    w.put_attr(
        rtnl::FPM_ROUTE_ENCAP_SRV6_ENCAP_SRC_ADDR,
        &tables.encap_source_addr().octets(),
    )?;
    w.put_attr(
        rtnl::FPM_ROUTE_ENCAP_SRV6_VPN_SID,
        &srv6.seg6_segs.octets(),
    )?;
    w.end_nest(nest);

    Ok(w.finish())
}

fn lookup_vrf(tables: &EngineTables, table_id: u32) -> Result<String, EncodeError> {
    tables
        .vrf_by_table_id(table_id)
        .map(|vrf| vrf.name.clone())
        .ok_or(EncodeError::UnknownVrf(table_id))
}

fn put_vrfname(w: &mut NlMsgWriter, name: &str) -> Result<(), EncodeError> {
    let mut payload = name.as_bytes().to_vec();
    payload.push(0);
    w.put_attr(rtnl::FPM_SRV6_LOCALSID_VRFNAME, &payload)?;
    Ok(())
}
