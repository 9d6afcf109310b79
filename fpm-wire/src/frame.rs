// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The FPM frame header: `{version: u8, type: u8, len: u16 BE}` where `len`
//! covers the header itself. Every frame carries exactly one netlink
//! message.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the FPM header prepended to every netlink message.
pub const FPM_HEADER_SIZE: usize = 4;
/// The only protocol version we speak.
pub const FPM_PROTO_VERSION: u8 = 1;
/// The only payload type we speak (netlink).
pub const FPM_MSG_TYPE_NETLINK: u8 = 1;
/// Largest payload a 16-bit frame length can describe.
pub const FPM_MAX_PAYLOAD: usize = u16::MAX as usize - FPM_HEADER_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Both header bytes must be exactly 1; a frame where either differs is
    /// unrecoverable and the connection must be dropped.
    #[error("received version/msg_type {version}/{kind}, expected 1/1")]
    BadHeader { version: u8, kind: u8 },
    #[error("received message length {0} that does not even fill the FPM header")]
    ShortLength(u16),
    #[error("payload of {0} bytes exceeds the 16-bit frame length")]
    Oversize(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Framed reader/writer for the FPM stream.
///
/// Decode never consumes a partial frame: until the full `len` bytes are
/// buffered it returns `None` and leaves the buffer positioned at the frame
/// start.
#[derive(Debug, Default)]
pub struct FpmFrameCodec;

impl Decoder for FpmFrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if src.len() < FPM_HEADER_SIZE {
            return Ok(None);
        }
        let version = src[0];
        let kind = src[1];
        if version != FPM_PROTO_VERSION || kind != FPM_MSG_TYPE_NETLINK {
            return Err(FrameError::BadHeader { version, kind });
        }
        let len = u16::from_be_bytes([src[2], src[3]]);
        if (len as usize) < FPM_HEADER_SIZE {
            return Err(FrameError::ShortLength(len));
        }
        if src.len() < len as usize {
            src.reserve(len as usize - src.len());
            return Ok(None);
        }
        src.advance(FPM_HEADER_SIZE);
        Ok(Some(src.split_to(len as usize - FPM_HEADER_SIZE).freeze()))
    }
}

impl Encoder<&[u8]> for FpmFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
        let total = payload.len() + FPM_HEADER_SIZE;
        if total > u16::MAX as usize {
            return Err(FrameError::Oversize(payload.len()));
        }
        dst.reserve(total);
        dst.put_u8(FPM_PROTO_VERSION);
        dst.put_u8(FPM_MSG_TYPE_NETLINK);
        dst.put_u16(total as u16);
        dst.put_slice(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        FpmFrameCodec.encode(payload, &mut buf).unwrap();
        buf
    }

    #[test]
    fn encode_prepends_header() {
        let buf = frame(b"abcd");
        assert_eq!(&buf[..], &[1, 1, 0, 8, b'a', b'b', b'c', b'd']);
    }

    #[test]
    fn decode_round_trip() {
        let mut buf = frame(b"hello");
        let got = FpmFrameCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&got[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_full_frame() {
        let full = frame(&[0xab; 32]);
        let mut partial = BytesMut::from(&full[..10]);
        assert!(FpmFrameCodec.decode(&mut partial).unwrap().is_none());
        // the partial frame must not be consumed
        assert_eq!(partial.len(), 10);
        partial.extend_from_slice(&full[10..]);
        let got = FpmFrameCodec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(got.len(), 32);
    }

    #[test]
    fn decode_waits_for_header() {
        let mut buf = BytesMut::from(&[1u8, 1][..]);
        assert!(FpmFrameCodec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_bad_version() {
        let mut buf = BytesMut::from(&[2u8, 1, 0, 4][..]);
        assert!(matches!(
            FpmFrameCodec.decode(&mut buf),
            Err(FrameError::BadHeader { version: 2, kind: 1 })
        ));
    }

    #[test]
    fn decode_rejects_bad_type_even_with_good_version() {
        let mut buf = BytesMut::from(&[1u8, 2, 0, 4][..]);
        assert!(matches!(
            FpmFrameCodec.decode(&mut buf),
            Err(FrameError::BadHeader { version: 1, kind: 2 })
        ));
    }

    #[test]
    fn decode_rejects_length_below_header() {
        let mut buf = BytesMut::from(&[1u8, 1, 0, 3][..]);
        assert!(matches!(
            FpmFrameCodec.decode(&mut buf),
            Err(FrameError::ShortLength(3))
        ));
    }

    #[test]
    fn decode_consumes_back_to_back_frames() {
        let mut buf = frame(b"one");
        buf.extend_from_slice(&frame(b"three"));
        assert_eq!(
            &FpmFrameCodec.decode(&mut buf).unwrap().unwrap()[..],
            b"one"
        );
        assert_eq!(
            &FpmFrameCodec.decode(&mut buf).unwrap().unwrap()[..],
            b"three"
        );
        assert!(FpmFrameCodec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn encode_rejects_oversize_payload() {
        let big = vec![0u8; u16::MAX as usize];
        let mut buf = BytesMut::new();
        assert!(matches!(
            FpmFrameCodec.encode(&big[..], &mut buf),
            Err(FrameError::Oversize(_))
        ));
    }
}
