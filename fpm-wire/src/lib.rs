// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Wire formats spoken to a Forwarding Plane Manager peer: the 4-byte FPM
//! frame header and the netlink messages carried inside it.

#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation
)]

pub mod frame;
pub mod message;
pub mod rtnl;

pub use frame::{FpmFrameCodec, FrameError, FPM_HEADER_SIZE};
pub use message::{AttrIter, NdMsg, NhMsg, NlMsgHdr, NlMsgWriter, NoSpace, RtMsg};
