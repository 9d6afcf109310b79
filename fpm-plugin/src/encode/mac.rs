// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! EVPN router-MAC FDB encoding (`RTM_NEWNEIGH`/`RTM_DELNEIGH` on
//! `AF_BRIDGE`)

use bytes::Bytes;

use fpm_wire::message::{NdMsg, NlMsgWriter};
use fpm_wire::rtnl;

use crate::ctx::MacCtx;
use crate::encode::EncodeError;
use crate::NL_PKT_BUF_SIZE;

pub(super) fn encode(mc: &MacCtx, cmd: u16) -> Result<Bytes, EncodeError> {
    let install = cmd == rtnl::RTM_NEWNEIGH;
    let flags = if install {
        rtnl::NLM_F_REQUEST | rtnl::NLM_F_CREATE | rtnl::NLM_F_REPLACE
    } else {
        rtnl::NLM_F_REQUEST
    };

    let mut ntf_flags = rtnl::NTF_SELF;
    if mc.sticky {
        ntf_flags |= rtnl::NTF_STICKY;
    }

    let mut w = NlMsgWriter::new(NL_PKT_BUF_SIZE, cmd, flags);
    w.put_ndmsg(NdMsg {
        family: rtnl::AF_BRIDGE,
        ifindex: mc.vxlan_ifindex as i32,
        state: rtnl::NUD_NOARP | rtnl::NUD_REACHABLE,
        flags: ntf_flags,
        ndm_type: 0,
    })?;

    w.put_attr(rtnl::NDA_LLADDR, &mc.mac)?;
    w.put_attr(rtnl::NDA_DST, &mc.vtep_ip.octets())?;
    w.put_u32(rtnl::NDA_MASTER, mc.bridge_ifindex)?;
    if mc.vid != 0 {
        w.put_u16(rtnl::NDA_VLAN, mc.vid)?;
    }

    Ok(w.finish())
}
