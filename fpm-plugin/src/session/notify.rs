// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Decoding of inbound `RTM_NEWROUTE` notifications

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use fpm_wire::message::{parse_rtmsg, AttrIter, NlMsgHdr, NLMSG_HDRLEN};
use fpm_wire::rtnl;

use crate::ctx::RouteNotifyCtx;

/// Decode the parts of a route notification the engine cares about. `msg`
/// is one complete netlink message.
pub(super) fn decode_route_notify(msg: &[u8]) -> Option<RouteNotifyCtx> {
    let _ = NlMsgHdr::parse(msg)?;
    let (rtm, attrs) = parse_rtmsg(&msg[NLMSG_HDRLEN..])?;

    let mut dst: Option<IpAddr> = None;
    let mut table_id = u32::from(rtm.table);
    let mut metric = 0u32;
    for (ty, payload) in AttrIter::new(attrs) {
        match ty {
            rtnl::RTA_DST => {
                dst = match (rtm.family, payload.len()) {
                    (rtnl::AF_INET, 4) => {
                        let octets: [u8; 4] = payload.try_into().ok()?;
                        Some(IpAddr::V4(Ipv4Addr::from(octets)))
                    }
                    (rtnl::AF_INET6, 16) => {
                        let octets: [u8; 16] = payload.try_into().ok()?;
                        Some(IpAddr::V6(Ipv6Addr::from(octets)))
                    }
                    _ => return None,
                };
            }
            rtnl::RTA_TABLE => {
                table_id = u32::from_ne_bytes(payload.try_into().ok()?);
            }
            rtnl::RTA_PRIORITY => {
                metric = u32::from_ne_bytes(payload.try_into().ok()?);
            }
            _ => {}
        }
    }

    // A default route carries no RTA_DST.
    let addr = dst.unwrap_or(match rtm.family {
        rtnl::AF_INET => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        rtnl::AF_INET6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        _ => return None,
    });
    let prefix = IpNet::new(addr, rtm.dst_len).ok()?;

    Some(RouteNotifyCtx {
        prefix,
        table_id,
        rtm_protocol: rtm.protocol,
        metric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpm_wire::message::{NlMsgWriter, RtMsg};
    use crate::NL_PKT_BUF_SIZE;

    #[test]
    fn decodes_v4_notification() {
        let mut w = NlMsgWriter::new(
            NL_PKT_BUF_SIZE,
            rtnl::RTM_NEWROUTE,
            rtnl::NLM_F_REQUEST,
        );
        w.put_rtmsg(RtMsg {
            family: rtnl::AF_INET,
            dst_len: 24,
            table: 5,
            protocol: rtnl::RTPROT_BGP,
            ..RtMsg::default()
        })
        .unwrap();
        w.put_attr(rtnl::RTA_DST, &[10, 1, 2, 0]).unwrap();
        w.put_u32(rtnl::RTA_PRIORITY, 20).unwrap();
        let msg = w.finish();

        let notify = decode_route_notify(&msg).unwrap();
        assert_eq!(notify.prefix, "10.1.2.0/24".parse::<IpNet>().unwrap());
        assert_eq!(notify.table_id, 5);
        assert_eq!(notify.rtm_protocol, rtnl::RTPROT_BGP);
        assert_eq!(notify.metric, 20);
    }

    #[test]
    fn table_attr_overrides_header_field() {
        let mut w = NlMsgWriter::new(
            NL_PKT_BUF_SIZE,
            rtnl::RTM_NEWROUTE,
            rtnl::NLM_F_REQUEST,
        );
        w.put_rtmsg(RtMsg {
            family: rtnl::AF_INET6,
            dst_len: 64,
            table: rtnl::RT_TABLE_UNSPEC,
            ..RtMsg::default()
        })
        .unwrap();
        let addr: Ipv6Addr = "2001:db8::".parse().unwrap();
        w.put_attr(rtnl::RTA_DST, &addr.octets()).unwrap();
        w.put_u32(rtnl::RTA_TABLE, 1000).unwrap();
        let msg = w.finish();

        let notify = decode_route_notify(&msg).unwrap();
        assert_eq!(notify.prefix, "2001:db8::/64".parse::<IpNet>().unwrap());
        assert_eq!(notify.table_id, 1000);
    }

    #[test]
    fn default_route_has_no_dst_attr() {
        let mut w = NlMsgWriter::new(
            NL_PKT_BUF_SIZE,
            rtnl::RTM_NEWROUTE,
            rtnl::NLM_F_REQUEST,
        );
        w.put_rtmsg(RtMsg {
            family: rtnl::AF_INET,
            dst_len: 0,
            table: 254,
            ..RtMsg::default()
        })
        .unwrap();
        let msg = w.finish();

        let notify = decode_route_notify(&msg).unwrap();
        assert_eq!(notify.prefix, "0.0.0.0/0".parse::<IpNet>().unwrap());
    }

    #[test]
    fn rejects_runt_messages() {
        assert!(decode_route_notify(&[0u8; 10]).is_none());
    }
}
