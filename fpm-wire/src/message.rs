// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Netlink message building and parsing.
//!
//! [`NlMsgWriter`] assembles one message in a bounded scratch buffer:
//! native-endian `nlmsghdr`, one fixed header (`rtmsg`, `nhmsg` or `ndmsg`)
//! and a sequence of 4-byte aligned `rtattr` TLVs, with support for nested
//! attributes and `rtnexthop` multipath entries. The read side is the
//! minimal counterpart needed to decode route notifications coming back
//! from the peer.

use bytes::Bytes;

/// Length of `struct nlmsghdr`.
pub const NLMSG_HDRLEN: usize = 16;
/// Length of the `rtattr` header preceding every TLV payload.
pub const RTATTR_HDRLEN: usize = 4;
/// Length of `struct rtmsg`.
pub const RTMSG_LEN: usize = 12;

const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// The message under construction outgrew the scratch buffer. Callers treat
/// this as "drop the message", never as a partial write.
#[derive(Debug, thiserror::Error)]
#[error("netlink message does not fit in {0}-byte scratch buffer")]
pub struct NoSpace(pub usize);

/// `struct rtmsg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RtMsg {
    pub family: u8,
    pub dst_len: u8,
    pub src_len: u8,
    pub tos: u8,
    pub table: u8,
    pub protocol: u8,
    pub scope: u8,
    pub rtype: u8,
    pub flags: u32,
}

/// `struct nhmsg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NhMsg {
    pub family: u8,
    pub scope: u8,
    pub protocol: u8,
    pub flags: u32,
}

/// `struct ndmsg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NdMsg {
    pub family: u8,
    pub ifindex: i32,
    pub state: u16,
    pub flags: u8,
    pub ndm_type: u8,
}

/// Marker returned by [`NlMsgWriter::begin_nest`], consumed when the nest is
/// closed so the attribute length can be patched.
#[must_use]
pub struct Nest(usize);

/// Marker for an open `rtnexthop` entry inside an `RTA_MULTIPATH` nest.
#[must_use]
pub struct RtnhEntry(usize);

pub struct NlMsgWriter {
    buf: Vec<u8>,
    cap: usize,
}

impl NlMsgWriter {
    /// Start a message with the given type and flags. `cap` bounds the final
    /// encoded size.
    pub fn new(cap: usize, msg_type: u16, flags: u16) -> Self {
        let mut w = NlMsgWriter {
            buf: Vec::with_capacity(256),
            cap,
        };
        // nlmsg_len is patched in finish(); seq and pid stay zero.
        w.buf.extend_from_slice(&0u32.to_ne_bytes());
        w.buf.extend_from_slice(&msg_type.to_ne_bytes());
        w.buf.extend_from_slice(&flags.to_ne_bytes());
        w.buf.extend_from_slice(&0u32.to_ne_bytes());
        w.buf.extend_from_slice(&0u32.to_ne_bytes());
        w
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), NoSpace> {
        if self.buf.len() + bytes.len() > self.cap {
            return Err(NoSpace(self.cap));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn pad(&mut self) -> Result<(), NoSpace> {
        while self.buf.len() % 4 != 0 {
            self.put(&[0])?;
        }
        Ok(())
    }

    pub fn put_rtmsg(&mut self, m: RtMsg) -> Result<(), NoSpace> {
        self.put(&[
            m.family, m.dst_len, m.src_len, m.tos, m.table, m.protocol, m.scope, m.rtype,
        ])?;
        self.put(&m.flags.to_ne_bytes())
    }

    pub fn put_nhmsg(&mut self, m: NhMsg) -> Result<(), NoSpace> {
        self.put(&[m.family, m.scope, m.protocol, 0])?;
        self.put(&m.flags.to_ne_bytes())
    }

    pub fn put_ndmsg(&mut self, m: NdMsg) -> Result<(), NoSpace> {
        self.put(&[m.family, 0, 0, 0])?;
        self.put(&m.ifindex.to_ne_bytes())?;
        self.put(&m.state.to_ne_bytes())?;
        self.put(&[m.flags, m.ndm_type])
    }

    pub fn put_attr(&mut self, ty: u16, payload: &[u8]) -> Result<(), NoSpace> {
        self.pad()?;
        let len = (RTATTR_HDRLEN + payload.len()) as u16;
        self.put(&len.to_ne_bytes())?;
        self.put(&ty.to_ne_bytes())?;
        self.put(payload)?;
        self.pad()
    }

    pub fn put_u8(&mut self, ty: u16, value: u8) -> Result<(), NoSpace> {
        self.put_attr(ty, &[value])
    }

    pub fn put_u16(&mut self, ty: u16, value: u16) -> Result<(), NoSpace> {
        self.put_attr(ty, &value.to_ne_bytes())
    }

    pub fn put_u32(&mut self, ty: u16, value: u32) -> Result<(), NoSpace> {
        self.put_attr(ty, &value.to_ne_bytes())
    }

    pub fn begin_nest(&mut self, ty: u16) -> Result<Nest, NoSpace> {
        self.pad()?;
        let start = self.buf.len();
        self.put(&0u16.to_ne_bytes())?;
        self.put(&ty.to_ne_bytes())?;
        Ok(Nest(start))
    }

    pub fn end_nest(&mut self, nest: Nest) {
        let len = (self.buf.len() - nest.0) as u16;
        self.buf[nest.0..nest.0 + 2].copy_from_slice(&len.to_ne_bytes());
    }

    /// Open an `rtnexthop` entry (inside an `RTA_MULTIPATH` nest). `hops` is
    /// the weight minus one, as on the kernel wire.
    pub fn begin_rtnh(&mut self, ifindex: i32, hops: u8) -> Result<RtnhEntry, NoSpace> {
        self.pad()?;
        let start = self.buf.len();
        self.put(&0u16.to_ne_bytes())?;
        self.put(&[0, hops])?;
        self.put(&ifindex.to_ne_bytes())?;
        Ok(RtnhEntry(start))
    }

    pub fn end_rtnh(&mut self, entry: RtnhEntry) {
        let len = (self.buf.len() - entry.0) as u16;
        self.buf[entry.0..entry.0 + 2].copy_from_slice(&len.to_ne_bytes());
    }

    /// Seal the message: patch `nlmsg_len` and hand out the bytes.
    #[must_use]
    pub fn finish(mut self) -> Bytes {
        let total = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&total.to_ne_bytes());
        Bytes::from(self.buf)
    }
}

/// Parsed `struct nlmsghdr`.
#[derive(Clone, Copy, Debug)]
pub struct NlMsgHdr {
    pub len: u32,
    pub msg_type: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

impl NlMsgHdr {
    /// Read a header from the start of `buf`. Returns `None` when fewer than
    /// 16 bytes are available; any length claims are left to the caller.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<NlMsgHdr> {
        if buf.len() < NLMSG_HDRLEN {
            return None;
        }
        Some(NlMsgHdr {
            len: u32::from_ne_bytes(buf[0..4].try_into().ok()?),
            msg_type: u16::from_ne_bytes(buf[4..6].try_into().ok()?),
            flags: u16::from_ne_bytes(buf[6..8].try_into().ok()?),
            seq: u32::from_ne_bytes(buf[8..12].try_into().ok()?),
            pid: u32::from_ne_bytes(buf[12..16].try_into().ok()?),
        })
    }
}

/// Split an `rtmsg` off the front of a message body.
#[must_use]
pub fn parse_rtmsg(body: &[u8]) -> Option<(RtMsg, &[u8])> {
    if body.len() < RTMSG_LEN {
        return None;
    }
    let m = RtMsg {
        family: body[0],
        dst_len: body[1],
        src_len: body[2],
        tos: body[3],
        table: body[4],
        protocol: body[5],
        scope: body[6],
        rtype: body[7],
        flags: u32::from_ne_bytes(body[8..12].try_into().ok()?),
    };
    Some((m, &body[RTMSG_LEN..]))
}

/// Iterator over `rtattr` TLVs. Stops at the first structurally invalid
/// attribute.
pub struct AttrIter<'a> {
    buf: &'a [u8],
}

impl<'a> AttrIter<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        AttrIter { buf }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<(u16, &'a [u8])> {
        if self.buf.len() < RTATTR_HDRLEN {
            return None;
        }
        let len = u16::from_ne_bytes(self.buf[0..2].try_into().ok()?) as usize;
        let ty = u16::from_ne_bytes(self.buf[2..4].try_into().ok()?);
        if len < RTATTR_HDRLEN || len > self.buf.len() {
            return None;
        }
        let payload = &self.buf[RTATTR_HDRLEN..len];
        self.buf = &self.buf[align4(len).min(self.buf.len())..];
        Some((ty, payload))
    }
}
