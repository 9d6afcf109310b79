// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Rtnetlink constants used on the FPM wire. Values mirror the Linux uapi
//! headers; the `FPM_*` and `RTM_*SRV6LOCALSID` values are the custom
//! extensions understood by the FPM peer.

/* address families */
pub const AF_INET: u8 = 2;
pub const AF_BRIDGE: u8 = 7;
pub const AF_INET6: u8 = 10;
pub const AF_MPLS: u8 = 28;

/* netlink message types */
pub const RTM_NEWROUTE: u16 = 24;
pub const RTM_DELROUTE: u16 = 25;
pub const RTM_NEWNEIGH: u16 = 28;
pub const RTM_DELNEIGH: u16 = 29;
pub const RTM_NEWNEXTHOP: u16 = 104;
pub const RTM_DELNEXTHOP: u16 = 105;

/* custom message types for SRv6 localsids */
pub const RTM_NEWSRV6LOCALSID: u16 = 1000;
pub const RTM_DELSRV6LOCALSID: u16 = 1001;

/* netlink header flags */
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_CREATE: u16 = 0x400;

/* route attributes */
pub const RTA_DST: u16 = 1;
pub const RTA_OIF: u16 = 4;
pub const RTA_GATEWAY: u16 = 5;
pub const RTA_PRIORITY: u16 = 6;
pub const RTA_MULTIPATH: u16 = 9;
pub const RTA_TABLE: u16 = 15;
pub const RTA_VIA: u16 = 18;
pub const RTA_NEWDST: u16 = 19;
pub const RTA_ENCAP_TYPE: u16 = 21;
pub const RTA_ENCAP: u16 = 22;
pub const RTA_NH_ID: u16 = 30;

/* route tables, scopes and types */
pub const RT_TABLE_UNSPEC: u8 = 0;
pub const RT_TABLE_DEFAULT: u32 = 253;
pub const RT_TABLE_MAIN: u32 = 254;
pub const RT_SCOPE_UNIVERSE: u8 = 0;
pub const RTN_UNICAST: u8 = 1;
pub const RTN_BLACKHOLE: u8 = 6;

/* route origin protocols (rt_protos registry values) */
pub const RTPROT_KERNEL: u8 = 2;
pub const RTPROT_ZEBRA: u8 = 11;
pub const RTPROT_BABEL: u8 = 42;
pub const RTPROT_BGP: u8 = 186;
pub const RTPROT_ISIS: u8 = 187;
pub const RTPROT_OSPF: u8 = 188;
pub const RTPROT_RIP: u8 = 189;
pub const RTPROT_NHRP: u8 = 191;
pub const RTPROT_EIGRP: u8 = 192;
pub const RTPROT_SHARP: u8 = 194;
pub const RTPROT_ZSTATIC: u8 = 196;

/* nexthop object attributes */
pub const NHA_ID: u16 = 1;
pub const NHA_GROUP: u16 = 2;
pub const NHA_BLACKHOLE: u16 = 3;
pub const NHA_OIF: u16 = 4;
pub const NHA_GATEWAY: u16 = 5;

/* neighbour (FDB) attributes and states */
pub const NDA_DST: u16 = 1;
pub const NDA_LLADDR: u16 = 2;
pub const NDA_VLAN: u16 = 5;
pub const NDA_MASTER: u16 = 9;
pub const NUD_REACHABLE: u16 = 0x02;
pub const NUD_NOARP: u16 = 0x40;
pub const NTF_SELF: u8 = 0x02;
pub const NTF_STICKY: u8 = 0x40;

/* MPLS label stack entry fields */
pub const MPLS_LS_LABEL_SHIFT: u32 = 12;
pub const MPLS_LS_S_SHIFT: u32 = 8;
pub const MPLS_LABEL_IMPLICIT_NULL: u32 = 3;

/* custom FPM route encapsulation */
pub const FPM_ROUTE_ENCAP_SRV6: u16 = 101;

/* custom FPM SRv6 VPN encap nest contents */
pub const FPM_ROUTE_ENCAP_SRV6_VPN_SID: u16 = 1;
pub const FPM_ROUTE_ENCAP_SRV6_ENCAP_SRC_ADDR: u16 = 2;

/* custom FPM SRv6 localsid attributes */
pub const FPM_SRV6_LOCALSID_SID_VALUE: u16 = 1;
pub const FPM_SRV6_LOCALSID_FORMAT: u16 = 2;
pub const FPM_SRV6_LOCALSID_ACTION: u16 = 3;
pub const FPM_SRV6_LOCALSID_VRFNAME: u16 = 4;
pub const FPM_SRV6_LOCALSID_NH6: u16 = 5;
pub const FPM_SRV6_LOCALSID_NH4: u16 = 6;
pub const FPM_SRV6_LOCALSID_IIF: u16 = 7;
pub const FPM_SRV6_LOCALSID_OIF: u16 = 8;
pub const FPM_SRV6_LOCALSID_BPF: u16 = 9;
pub const FPM_SRV6_LOCALSID_SIDLIST: u16 = 10;
pub const FPM_SRV6_LOCALSID_ENCAP_SRC_ADDR: u16 = 11;

/* custom FPM SRv6 localsid FORMAT nest contents */
pub const FPM_SRV6_LOCALSID_FORMAT_BLOCK_LEN: u16 = 1;
pub const FPM_SRV6_LOCALSID_FORMAT_NODE_LEN: u16 = 2;
pub const FPM_SRV6_LOCALSID_FORMAT_FUNC_LEN: u16 = 3;
pub const FPM_SRV6_LOCALSID_FORMAT_ARG_LEN: u16 = 4;

/* custom FPM SRv6 localsid ACTION values */
pub const FPM_SRV6_LOCALSID_ACTION_END: u32 = 1;
pub const FPM_SRV6_LOCALSID_ACTION_END_X: u32 = 2;
pub const FPM_SRV6_LOCALSID_ACTION_END_T: u32 = 3;
pub const FPM_SRV6_LOCALSID_ACTION_END_DX2: u32 = 4;
pub const FPM_SRV6_LOCALSID_ACTION_END_DX6: u32 = 5;
pub const FPM_SRV6_LOCALSID_ACTION_END_DX4: u32 = 6;
pub const FPM_SRV6_LOCALSID_ACTION_END_DT6: u32 = 7;
pub const FPM_SRV6_LOCALSID_ACTION_END_DT4: u32 = 8;
pub const FPM_SRV6_LOCALSID_ACTION_END_DT46: u32 = 9;
pub const FPM_SRV6_LOCALSID_ACTION_B6_ENCAPS: u32 = 10;
pub const FPM_SRV6_LOCALSID_ACTION_B6_ENCAPS_RED: u32 = 11;
pub const FPM_SRV6_LOCALSID_ACTION_B6_INSERT: u32 = 12;
pub const FPM_SRV6_LOCALSID_ACTION_B6_INSERT_RED: u32 = 13;
pub const FPM_SRV6_LOCALSID_ACTION_UN: u32 = 14;
pub const FPM_SRV6_LOCALSID_ACTION_UA: u32 = 15;
pub const FPM_SRV6_LOCALSID_ACTION_UDX2: u32 = 16;
pub const FPM_SRV6_LOCALSID_ACTION_UDX6: u32 = 17;
pub const FPM_SRV6_LOCALSID_ACTION_UDX4: u32 = 18;
pub const FPM_SRV6_LOCALSID_ACTION_UDT6: u32 = 19;
pub const FPM_SRV6_LOCALSID_ACTION_UDT4: u32 = 20;
pub const FPM_SRV6_LOCALSID_ACTION_UDT46: u32 = 21;
