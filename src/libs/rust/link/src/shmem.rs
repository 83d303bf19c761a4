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

//! The shared-memory implementation of links
//!
//! Each direction uses one [`ShmBuf`] in memory that is shared with the peer. The sender fills the
//! buffer and sets the NEW bit; the receiver copies the message out and replaces NEW by ACK. There
//! are no interrupts involved: incoming messages are found by polling via [`Link::recv`].

use core::cmp;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use base::cpu;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::time::Clock;

use crate::{load_words, store_words, Link, Timeout};

/// The maximum size of a message in a shared-memory buffer
pub const SHMEM_MSG_SIZE: usize = 64;

const MSG_WORDS: usize = SHMEM_MSG_SIZE / 4;

const STATUS_NEW: u32 = 1 << 0;
const STATUS_ACK: u32 = 1 << 1;

/// One direction of a shared-memory link
#[repr(C)]
pub struct ShmBuf {
    status: AtomicU32,
    len: AtomicU32,
    data: [AtomicU32; MSG_WORDS],
}

impl ShmBuf {
    /// Creates an empty buffer
    pub const fn new() -> Self {
        Self {
            status: AtomicU32::new(0),
            len: AtomicU32::new(0),
            data: [const { AtomicU32::new(0) }; MSG_WORDS],
        }
    }

    fn status(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }
}

impl Default for ShmBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShmBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShmBuf[status={:#x}, len={}]",
            self.status(),
            self.len.load(Ordering::Relaxed)
        )
    }
}

/// A link over two shared-memory buffers
pub struct ShmemLink<'a> {
    pub(crate) name: &'static str,
    out: &'a ShmBuf,
    inb: &'a ShmBuf,
    clock: &'a Clock,
    in_flight: AtomicBool,
    acked: AtomicBool,
}

impl<'a> ShmemLink<'a> {
    /// Creates a link that sends via `out` and receives via `inb`
    ///
    /// The peer uses the same buffers the other way around.
    pub fn new(name: &'static str, out: &'a ShmBuf, inb: &'a ShmBuf, clock: &'a Clock) -> Self {
        log!(LogFlags::LibShmem, "{}: connected", name);
        Self {
            name,
            out,
            inb,
            clock,
            in_flight: AtomicBool::new(false),
            acked: AtomicBool::new(false),
        }
    }

    fn poll_ack(&self) -> bool {
        let acked = self.out.status() & STATUS_ACK != 0;
        if acked {
            self.acked.store(true, Ordering::Release);
        }
        acked
    }
}

impl<'a> Link for ShmemLink<'a> {
    fn name(&self) -> &str {
        self.name
    }

    fn send(&self, timeout: Timeout, msg: &[u8]) -> Result<usize, Error> {
        if msg.len() > SHMEM_MSG_SIZE {
            return Err(Error::new(Code::InvArgs));
        }

        // wait until the peer has consumed the previous message
        let deadline = timeout.map(|ms| self.clock.deadline(ms));
        while self.out.status() & STATUS_NEW != 0 {
            if let Some(end) = deadline {
                if end.is_reached(self.clock.now()) {
                    return Err(Error::new(Code::Timeout));
                }
            }
            cpu::relax();
        }

        self.acked.store(false, Ordering::Release);
        store_words(&self.out.data, msg);
        self.out.len.store(msg.len() as u32, Ordering::Relaxed);
        self.out.status.store(STATUS_NEW, Ordering::Release);
        log!(LogFlags::LibShmem, "{}: sent {} bytes", self.name, msg.len());
        Ok(msg.len())
    }

    fn is_send_acked(&self) -> bool {
        self.acked.load(Ordering::Acquire) || self.poll_ack()
    }

    fn request(
        &self,
        wtimeout: Timeout,
        req: &[u8],
        rtimeout: Timeout,
        reply: &mut [u8],
    ) -> Result<usize, Error> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(Error::new(Code::Busy));
        }

        let res = (|| -> Result<usize, Error> {
            self.send(wtimeout, req)?;

            // the ack is a status bit in memory set by the peer's recv
            let deadline = wtimeout.map(|ms| self.clock.deadline(ms));
            while !self.poll_ack() {
                if let Some(end) = deadline {
                    if end.is_reached(self.clock.now()) {
                        return Err(Error::new(Code::Timeout));
                    }
                }
                cpu::relax();
            }

            let deadline = rtimeout.map(|ms| self.clock.deadline(ms));
            loop {
                let n = self.recv(reply)?;
                if n > 0 {
                    return Ok(n);
                }
                if let Some(end) = deadline {
                    if end.is_reached(self.clock.now()) {
                        return Err(Error::new(Code::Timeout));
                    }
                }
                cpu::relax();
            }
        })();

        self.in_flight.store(false, Ordering::Release);
        res
    }

    fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.inb.status() & STATUS_NEW == 0 {
            return Ok(0);
        }

        let len = cmp::min(self.inb.len.load(Ordering::Relaxed) as usize, SHMEM_MSG_SIZE);
        let n = cmp::min(len, buf.len());
        load_words(&self.inb.data, &mut buf[..n]);
        self.inb.status.store(STATUS_ACK, Ordering::Release);
        // 0 means "no message", so an empty message cannot be passed on
        if len == 0 {
            log!(LogFlags::Error, "{}: received empty message", self.name);
            return Err(Error::new(Code::RecvFailed));
        }
        log!(LogFlags::LibShmem, "{}: received {} bytes", self.name, n);
        Ok(n)
    }

    fn disconnect(self) -> Result<(), Error> {
        log!(LogFlags::LibShmem, "{}: disconnect", self.name);
        Ok(())
    }
}

impl fmt::Debug for ShmemLink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShmemLink[{}, out={:?}, in={:?}]", self.name, self.out, self.inb)
    }
}
