// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Nexthop group encoding (`RTM_NEWNEXTHOP`/`RTM_DELNEXTHOP`)

use bytes::Bytes;
use std::net::IpAddr;

use fpm_wire::message::{NhMsg, NlMsgWriter};
use fpm_wire::rtnl;

use crate::ctx::NexthopCtx;
use crate::encode::{put_addr, EncodeError};
use crate::NL_PKT_BUF_SIZE;

pub(super) fn encode(nc: &NexthopCtx, cmd: u16) -> Result<Bytes, EncodeError> {
    let install = cmd == rtnl::RTM_NEWNEXTHOP;
    let flags = if install {
        rtnl::NLM_F_REQUEST | rtnl::NLM_F_CREATE | rtnl::NLM_F_REPLACE
    } else {
        rtnl::NLM_F_REQUEST
    };

    let family = if nc.group.is_empty() {
        match nc.nexthop.gateway {
            Some(IpAddr::V4(_)) => rtnl::AF_INET,
            Some(IpAddr::V6(_)) => rtnl::AF_INET6,
            None => 0,
        }
    } else {
        0
    };

    let mut w = NlMsgWriter::new(NL_PKT_BUF_SIZE, cmd, flags);
    w.put_nhmsg(NhMsg {
        family,
        scope: rtnl::RT_SCOPE_UNIVERSE,
        protocol: nc.protocol.rtm_protocol(),
        flags: 0,
    })?;

    w.put_u32(rtnl::NHA_ID, nc.id)?;

    // Deletes reference the id alone.
    if !install {
        return Ok(w.finish());
    }

    if nc.group.is_empty() {
        if nc.nexthop.blackhole {
            w.put_attr(rtnl::NHA_BLACKHOLE, &[])?;
        } else {
            if let Some(oif) = nc.nexthop.ifindex {
                w.put_u32(rtnl::NHA_OIF, oif)?;
            }
            if let Some(gateway) = nc.nexthop.gateway {
                put_addr(&mut w, rtnl::NHA_GATEWAY, gateway)?;
            }
        }
    } else {
        // struct nexthop_grp: id(u32) weight(u8, minus one) resvd(3)
        let mut payload = Vec::with_capacity(nc.group.len() * 8);
        for (id, weight) in &nc.group {
            payload.extend_from_slice(&id.to_ne_bytes());
            payload.push(weight.saturating_sub(1));
            payload.extend_from_slice(&[0, 0, 0]);
        }
        w.put_attr(rtnl::NHA_GROUP, &payload)?;
    }

    Ok(w.finish())
}
