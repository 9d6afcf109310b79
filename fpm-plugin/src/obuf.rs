// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Output buffer holding framed messages pending write
//!
//! The buffer is a byte stream behind a mutex, shared between the engine
//! thread (framing encoded messages in) and the plugin thread (draining to
//! the socket). Frames are appended all-or-nothing: if the messages of one
//! operation do not fit, nothing is written and the caller gets
//! [`BufferFull`].

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use fpm_wire::{FpmFrameCodec, FPM_HEADER_SIZE};

use crate::NL_PKT_BUF_SIZE;

/// Default buffer capacity.
pub(crate) const OBUF_CAPACITY: usize = NL_PKT_BUF_SIZE * 128;

/// Not an error in the protocol sense: the caller suspends and retries once
/// the writer has drained some bytes.
#[derive(Debug, thiserror::Error)]
#[error("output buffer full")]
pub(crate) struct BufferFull;

#[derive(Debug)]
pub(crate) struct OutputBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl OutputBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        OutputBuffer {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn writable(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Frame `msgs` into the buffer. Returns the number of bytes appended
    /// (payloads plus one FPM header each).
    pub(crate) fn push_frames(&mut self, msgs: &[Bytes]) -> Result<u32, BufferFull> {
        let total: usize = msgs.iter().map(|m| m.len() + FPM_HEADER_SIZE).sum();
        if total > self.writable() {
            return Err(BufferFull);
        }
        for msg in msgs {
            FpmFrameCodec
                .encode(&msg[..], &mut self.buf)
                .map_err(|_| BufferFull)?;
        }
        Ok(total as u32)
    }

    /// Contiguous view of the bytes pending write.
    pub(crate) fn chunk(&self) -> &[u8] {
        &self.buf[..]
    }

    /// Discard `n` bytes from the front after a successful socket write.
    pub(crate) fn advance(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Drop everything pending (reconnect / teardown).
    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_prefixed_and_accounted() {
        let mut obuf = OutputBuffer::new(1024);
        let queued = obuf
            .push_frames(&[Bytes::from_static(b"abcd"), Bytes::from_static(b"ef")])
            .unwrap();
        assert_eq!(queued, 4 + 4 + 4 + 2);
        assert_eq!(obuf.pending(), queued as usize);
        assert_eq!(&obuf.chunk()[..8], &[1, 1, 0, 8, b'a', b'b', b'c', b'd']);
        assert_eq!(&obuf.chunk()[8..], &[1, 1, 0, 6, b'e', b'f']);
    }

    #[test]
    fn full_buffer_rejects_without_partial_write() {
        let mut obuf = OutputBuffer::new(16);
        obuf.push_frames(&[Bytes::from_static(b"0123456789")]).unwrap();
        let before = obuf.pending();
        // 4 + 4 bytes wanted, only 2 writable
        assert!(obuf.push_frames(&[Bytes::from_static(b"abcd")]).is_err());
        assert_eq!(obuf.pending(), before);
    }

    #[test]
    fn multi_message_push_is_all_or_nothing() {
        let mut obuf = OutputBuffer::new(20);
        // first frame alone fits (12 bytes), both together (24) do not
        let msgs = [Bytes::from_static(b"12345678"), Bytes::from_static(b"12345678")];
        assert!(obuf.push_frames(&msgs).is_err());
        assert_eq!(obuf.pending(), 0);
    }

    #[test]
    fn advance_frees_writable_space() {
        let mut obuf = OutputBuffer::new(32);
        obuf.push_frames(&[Bytes::from_static(b"abcdefgh")]).unwrap();
        let writable = obuf.writable();
        obuf.advance(6);
        assert_eq!(obuf.writable(), writable + 6);
    }
}
