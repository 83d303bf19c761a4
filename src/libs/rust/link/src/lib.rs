/*
 * Copyright (C) 2024 The HPSC-TRCH authors
 *
 * This file is part of HPSC-TRCH (firmware core of the HPSC chiplet's trusted control processor).
 *
 * HPSC-TRCH is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * HPSC-TRCH is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

//! Links: named request/reply channels between the TRCH and the other subsystems
//!
//! A [`Link`] is implemented either on top of a hardware mailbox ([`MboxLink`]) or on top of a
//! pair of buffers in shared memory ([`ShmemLink`]). All operations are synchronous for the
//! caller, but internally wait for state that is changed by interrupt handlers or by the peer.
//! The links of a processor image are kept in the fixed pool [`Links`].

#![no_std]

pub mod cmd;
mod links;
mod mbox;
mod mboxlink;
mod shmem;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use base::cpu;
use base::errors::{Code, Error};
use base::time::Clock;

pub use self::links::{LinkId, LinkObj, Links, MAX_LINKS};
pub use self::mbox::{MboxClaim, MboxDev, MboxDir, MboxEvent, MboxLinkDev};
pub use self::mboxlink::{MboxLink, MboxLinkParams, MboxLinkPool, Role, MAX_MBOX_LINKS};
pub use self::shmem::{ShmBuf, ShmemLink, SHMEM_MSG_SIZE};

/// The timeout of a link operation in milliseconds; `None` waits forever
pub type Timeout = Option<u32>;

/// The transport contract shared by all link variants
pub trait Link {
    /// Returns the name of the link (for diagnostics)
    fn name(&self) -> &str;

    /// Sends `msg` to the peer without waiting for an acknowledgement
    ///
    /// Waits at most `timeout` until the channel can take the message and returns the number of
    /// bytes sent.
    fn send(&self, timeout: Timeout, msg: &[u8]) -> Result<usize, Error>;

    /// Returns true if the peer has acknowledged the last sent message
    fn is_send_acked(&self) -> bool;

    /// Sends `req` and waits for the acknowledgement and the reply
    ///
    /// The acknowledgement wait is bounded by `wtimeout`, the reply wait by `rtimeout`. The reply
    /// is stored in `reply` and the number of received bytes is returned. Only one request can be
    /// in flight per link; overlapping requests fail with [`Code::Busy`].
    fn request(
        &self,
        wtimeout: Timeout,
        req: &[u8],
        rtimeout: Timeout,
        reply: &mut [u8],
    ) -> Result<usize, Error>;

    /// Polls for an incoming message and stores it in `buf`
    ///
    /// Returns 0 if there is no message. An empty message is consumed and fails with
    /// [`Code::RecvFailed`]. Links that deliver incoming messages via interrupts do
    /// not support polling and fail with [`Code::NotSup`].
    fn recv(&self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Releases the resources of the link
    fn disconnect(self) -> Result<(), Error>
    where
        Self: Sized;
}

/// Spins until `flag` is set or `timeout` has passed
pub(crate) fn wait_for(clock: &Clock, flag: &AtomicBool, timeout: Timeout) -> Result<(), Error> {
    let deadline = timeout.map(|ms| clock.deadline(ms));
    while !flag.load(Ordering::Acquire) {
        if let Some(end) = deadline {
            if end.is_reached(clock.now()) {
                return Err(Error::new(Code::Timeout));
            }
        }
        cpu::relax();
    }
    Ok(())
}

/// Stores `bytes` into `words` in little-endian order, padding the last word with zeros
pub(crate) fn store_words(words: &[AtomicU32], bytes: &[u8]) {
    for (w, chunk) in words.iter().zip(bytes.chunks(4)) {
        let mut raw = [0u8; 4];
        raw[..chunk.len()].copy_from_slice(chunk);
        w.store(u32::from_le_bytes(raw), Ordering::Relaxed);
    }
}

/// Loads `bytes.len()` bytes from `words` in little-endian order
pub(crate) fn load_words(words: &[AtomicU32], bytes: &mut [u8]) {
    for (w, chunk) in words.iter().zip(bytes.chunks_mut(4)) {
        let raw = w.load(Ordering::Relaxed).to_le_bytes();
        chunk.copy_from_slice(&raw[..chunk.len()]);
    }
}
