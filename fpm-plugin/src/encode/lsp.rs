// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MPLS LSP encoding
//!
//! LSPs travel as `AF_MPLS` route messages: the incoming label is the
//! destination (one label-stack entry), each nexthop contributes a via
//! address, an outgoing interface and the outgoing label stack.

use bytes::Bytes;
use std::net::IpAddr;

use fpm_wire::message::{NlMsgWriter, NoSpace, RtMsg};
use fpm_wire::rtnl;

use crate::ctx::{LspCtx, LspNexthop};
use crate::encode::EncodeError;
use crate::NL_PKT_BUF_SIZE;

/// MPLS address length in bits, as carried in `rtm_dst_len`.
const MPLS_DST_LEN: u8 = 20;

fn label_stack_entry(label: u32, bottom: bool) -> [u8; 4] {
    let lse = (label << rtnl::MPLS_LS_LABEL_SHIFT) | (u32::from(bottom) << rtnl::MPLS_LS_S_SHIFT);
    lse.to_be_bytes()
}

/// Outgoing label stack, implicit-null labels elided. Empty means "pop".
fn out_label_stack(nh: &LspNexthop) -> Vec<u8> {
    let labels: Vec<u32> = nh
        .out_labels
        .iter()
        .copied()
        .filter(|label| *label != rtnl::MPLS_LABEL_IMPLICIT_NULL)
        .collect();
    let mut stack = Vec::with_capacity(labels.len() * 4);
    for (i, label) in labels.iter().enumerate() {
        stack.extend_from_slice(&label_stack_entry(*label, i == labels.len() - 1));
    }
    stack
}

fn put_via(w: &mut NlMsgWriter, gateway: IpAddr) -> Result<(), NoSpace> {
    // struct rtvia: sa_family (u16) followed by the raw address
    let mut payload = Vec::with_capacity(18);
    match gateway {
        IpAddr::V4(a) => {
            payload.extend_from_slice(&u16::from(rtnl::AF_INET).to_ne_bytes());
            payload.extend_from_slice(&a.octets());
        }
        IpAddr::V6(a) => {
            payload.extend_from_slice(&u16::from(rtnl::AF_INET6).to_ne_bytes());
            payload.extend_from_slice(&a.octets());
        }
    }
    w.put_attr(rtnl::RTA_VIA, &payload)
}

fn put_nexthop_attrs(w: &mut NlMsgWriter, nh: &LspNexthop) -> Result<(), NoSpace> {
    put_via(w, nh.gateway)?;
    w.put_u32(rtnl::RTA_OIF, nh.ifindex)?;
    let stack = out_label_stack(nh);
    if !stack.is_empty() {
        w.put_attr(rtnl::RTA_NEWDST, &stack)?;
    }
    Ok(())
}

pub(super) fn encode(lc: &LspCtx, cmd: u16) -> Result<Bytes, EncodeError> {
    let install = cmd == rtnl::RTM_NEWROUTE;
    let flags = if install {
        rtnl::NLM_F_REQUEST | rtnl::NLM_F_CREATE
    } else {
        rtnl::NLM_F_REQUEST
    };

    let mut w = NlMsgWriter::new(NL_PKT_BUF_SIZE, cmd, flags);
    w.put_rtmsg(RtMsg {
        family: rtnl::AF_MPLS,
        dst_len: MPLS_DST_LEN,
        table: rtnl::RT_TABLE_MAIN as u8,
        protocol: rtnl::RTPROT_ZEBRA,
        scope: rtnl::RT_SCOPE_UNIVERSE,
        rtype: rtnl::RTN_UNICAST,
        ..RtMsg::default()
    })?;

    w.put_attr(rtnl::RTA_DST, &label_stack_entry(lc.in_label, true))?;

    // Deletes match on the incoming label alone.
    if !install {
        return Ok(w.finish());
    }

    match lc.nexthops[..] {
        [] => {}
        [ref nh] => put_nexthop_attrs(&mut w, nh)?,
        _ => {
            let nest = w.begin_nest(rtnl::RTA_MULTIPATH)?;
            for nh in &lc.nexthops {
                let entry = w.begin_rtnh(nh.ifindex as i32, 0)?;
                put_nexthop_attrs(&mut w, nh)?;
                w.end_rtnh(entry);
            }
            w.end_nest(nest);
        }
    }

    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpm_wire::message::{AttrIter, NlMsgHdr, NLMSG_HDRLEN, RTMSG_LEN};

    fn lsp(out_labels: Vec<u32>) -> LspCtx {
        LspCtx {
            in_label: 1000,
            nexthops: vec![LspNexthop {
                out_labels,
                gateway: "10.1.1.2".parse().unwrap(),
                ifindex: 3,
            }],
        }
    }

    #[test]
    fn via_carries_family_and_address() {
        let msg = encode(&lsp(vec![2000]), rtnl::RTM_NEWROUTE).unwrap();
        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN + RTMSG_LEN..]).collect();
        let via = attrs
            .iter()
            .find(|(ty, _)| *ty == rtnl::RTA_VIA)
            .map(|(_, p)| *p)
            .unwrap();
        assert_eq!(
            u16::from_ne_bytes(via[0..2].try_into().unwrap()),
            u16::from(rtnl::AF_INET)
        );
        assert_eq!(&via[2..], &[10, 1, 1, 2]);
    }

    #[test]
    fn implicit_null_elides_newdst() {
        let msg = encode(&lsp(vec![rtnl::MPLS_LABEL_IMPLICIT_NULL]), rtnl::RTM_NEWROUTE).unwrap();
        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN + RTMSG_LEN..]).collect();
        assert!(!attrs.iter().any(|(ty, _)| *ty == rtnl::RTA_NEWDST));
    }

    #[test]
    fn delete_matches_on_label_only() {
        let msg = encode(&lsp(vec![2000]), rtnl::RTM_DELROUTE).unwrap();
        let hdr = NlMsgHdr::parse(&msg).unwrap();
        assert_eq!(hdr.flags, rtnl::NLM_F_REQUEST);
        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN + RTMSG_LEN..]).collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, rtnl::RTA_DST);
    }

    #[test]
    fn multipath_lsp_wraps_nexthops() {
        let lc = LspCtx {
            in_label: 1000,
            nexthops: vec![
                LspNexthop {
                    out_labels: vec![2000],
                    gateway: "10.1.1.2".parse().unwrap(),
                    ifindex: 3,
                },
                LspNexthop {
                    out_labels: vec![3000, 3001],
                    gateway: "10.1.2.2".parse().unwrap(),
                    ifindex: 4,
                },
            ],
        };
        let msg = encode(&lc, rtnl::RTM_NEWROUTE).unwrap();
        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN + RTMSG_LEN..]).collect();
        assert!(attrs.iter().any(|(ty, _)| *ty == rtnl::RTA_MULTIPATH));
    }
}
