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

//! Command records, the command queue, and command dispatch
//!
//! Commands arrive on server links: mailbox links put them into the [`CmdQueue`] from their
//! receive interrupt, shared-memory links are polled by the main loop. The main loop dequeues them
//! and passes them to a [`CmdHandler`]; replies are sent back over the link the command came from.

use core::fmt;

use base::col::RingBuf;
use base::cpu;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::kif::cmd::{Opcode, CMD_MSG_LEN, CMD_TIMEOUT_MS_REPLY};
use base::log;

use spin::Mutex;

use crate::links::{LinkId, Links};
use crate::Link;

/// The capacity of the command queue
pub const CMD_QUEUE_LEN: usize = 8;

/// A command received over a link
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Cmd {
    /// The link the command has been received on (`None` for locally created commands)
    pub link: Option<LinkId>,
    pub msg: [u32; CMD_MSG_LEN],
}

impl Cmd {
    /// Creates a command from the given words; missing words are zero
    pub fn new(link: Option<LinkId>, words: &[u32]) -> Self {
        let mut msg = [0; CMD_MSG_LEN];
        for (m, w) in msg.iter_mut().zip(words) {
            *m = *w;
        }
        Self { link, msg }
    }

    /// Decodes a command from little-endian bytes; missing bytes are zero
    pub fn from_bytes(link: Option<LinkId>, bytes: &[u8]) -> Self {
        let mut msg = [0; CMD_MSG_LEN];
        for (m, chunk) in msg.iter_mut().zip(bytes.chunks(4)) {
            let mut raw = [0u8; 4];
            raw[..chunk.len()].copy_from_slice(chunk);
            *m = u32::from_le_bytes(raw);
        }
        Self { link, msg }
    }

    /// Returns the opcode or [`Code::InvCmd`] if the first word is no known opcode
    pub fn opcode(&self) -> Result<Opcode, Error> {
        Opcode::try_from(self.msg[0]).map_err(|_| Error::new(Code::InvCmd))
    }

    /// Returns argument `idx` (word `idx + 1`)
    pub fn arg(&self, idx: usize) -> u32 {
        self.msg[idx + 1]
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cmd[link={:?}, msg={:x?}]", self.link, &self.msg[..4])
    }
}

/// Encodes the given words as little-endian bytes into `bytes` and returns the number of bytes
pub fn words_to_bytes(words: &[u32], bytes: &mut [u8]) -> usize {
    let mut len = 0;
    for (w, chunk) in words.iter().zip(bytes.chunks_mut(4)) {
        let raw = w.to_le_bytes();
        chunk.copy_from_slice(&raw[..chunk.len()]);
        len += chunk.len();
    }
    len
}

/// The bounded queue of received commands
///
/// Enqueuing is done from interrupt context, dequeuing from the main loop.
pub struct CmdQueue {
    queue: Mutex<RingBuf<Cmd, CMD_QUEUE_LEN>>,
}

impl CmdQueue {
    /// Creates an empty command queue
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RingBuf::new()),
        }
    }

    /// Appends `cmd` to the queue
    ///
    /// Fails with [`Code::QueueFull`] if there is no space left.
    pub fn enqueue(&self, cmd: Cmd) -> Result<(), Error> {
        log!(LogFlags::LibCmd, "cmdq: enqueue {:?}", cmd);
        cpu::without_interrupts(|| self.queue.lock().push(cmd))
            .map_err(|_| Error::new(Code::QueueFull))
    }

    /// Removes and returns the oldest command
    pub fn dequeue(&self) -> Option<Cmd> {
        cpu::without_interrupts(|| self.queue.lock().pop())
    }

    /// Returns true if there are commands in the queue
    pub fn pending(&self) -> bool {
        cpu::without_interrupts(|| !self.queue.lock().is_empty())
    }
}

impl Default for CmdQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Processes commands
pub trait CmdHandler {
    /// Handles `cmd` and writes the reply into `reply`
    ///
    /// Returns the number of reply words; 0 means that no reply is sent.
    fn handle(&mut self, cmd: &Cmd, reply: &mut [u32]) -> Result<usize, Error>;
}

/// Passes `cmd` to `handler` and sends the reply back over the link the command came from
pub fn handle<const N: usize>(
    links: &Links<'_, N>,
    handler: &mut dyn CmdHandler,
    cmd: &Cmd,
) -> Result<(), Error> {
    log!(LogFlags::LibCmd, "cmd: handle {:?}", cmd);

    let mut reply = [0u32; CMD_MSG_LEN];
    let words = match handler.handle(cmd, &mut reply) {
        Ok(words) => words,
        Err(e) => {
            log!(LogFlags::Error, "cmd: handling {:?} failed: {}", cmd, e);
            return Err(e);
        },
    };
    if words == 0 {
        return Ok(());
    }

    let link = match cmd.link {
        Some(link) => link,
        None => {
            log!(LogFlags::LibCmd, "cmd: no link to send the reply to");
            return Ok(());
        },
    };

    let mut bytes = [0u8; CMD_MSG_LEN * 4];
    let len = words_to_bytes(&reply[..words], &mut bytes);
    links.with(link, |l| {
        log!(LogFlags::LibCmd, "cmd: reply via {}: {:x?}", l.name(), &reply[..words]);
        l.send(Some(CMD_TIMEOUT_MS_REPLY), &bytes[..len])
            .map(|_| ())
            .map_err(|e| {
                log!(LogFlags::Error, "{}: failed to send reply: {}", l.name(), e);
                e
            })
    })?
}
