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

//! The mailbox implementation of links
//!
//! A mailbox link consists of two channels of a mailbox IP block: the incoming channel (`from`)
//! and the outgoing channel (`to`). The per-link state lives in the fixed pool [`MboxLinkPool`],
//! whose interrupt entry points fill it in:
//!
//! - the ack interrupt sets the acked flag of the link whose outgoing channel raised the event,
//! - the receive interrupt either stores a reply for the request in flight (client links) or
//!   decodes a command and enqueues it into the command queue (server links).
//!
//! A request is therefore `Idle -> AwaitingAck -> AwaitingReply -> Idle`, where the caller spins
//! in the two waiting states.

use core::cmp;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use base::cpu;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::kif::cmd::MBOX_MSG_SIZE;
use base::kif::mboxmap::ChanPair;
use base::log;
use base::time::Clock;

use derivative::Derivative;

use crate::cmd::{Cmd, CmdQueue};
use crate::links::LinkId;
use crate::mbox::{MboxClaim, MboxDev, MboxDir, MboxEvent, MboxLinkDev};
use crate::{load_words, store_words, wait_for, Link, Timeout};

/// The number of mailbox links that can exist at the same time
pub const MAX_MBOX_LINKS: usize = 8;

const MSG_WORDS: usize = MBOX_MSG_SIZE / 4;
const NO_LINK: u32 = u32::MAX;

const FREE: u8 = 0;
const SETUP: u8 = 1;
const ACTIVE: u8 = 2;

/// Whether a link receives commands or replies on its incoming channel
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    /// The peer sends commands, which are put into the command queue
    Server,
    /// The peer sends replies to our requests
    Client,
}

/// The parameters for connecting a mailbox link
#[derive(Copy, Clone, Debug)]
pub struct MboxLinkParams {
    pub name: &'static str,
    pub chans: ChanPair,
    pub role: Role,
    /// The owner id of the server side
    pub server: u32,
    /// The owner id of the client side
    pub client: u32,
}

struct State {
    status: AtomicU8,
    base: AtomicUsize,
    chan_from: AtomicU32,
    chan_to: AtomicU32,
    rcv_int: AtomicU32,
    ack_int: AtomicU32,
    server: AtomicBool,
    link: AtomicU32,
    acked: AtomicBool,
    in_flight: AtomicBool,
    expecting: AtomicBool,
    replied: AtomicBool,
    reply_len: AtomicUsize,
    reply: [AtomicU32; MSG_WORDS],
}

impl State {
    const fn new() -> Self {
        Self {
            status: AtomicU8::new(FREE),
            base: AtomicUsize::new(0),
            chan_from: AtomicU32::new(0),
            chan_to: AtomicU32::new(0),
            rcv_int: AtomicU32::new(0),
            ack_int: AtomicU32::new(0),
            server: AtomicBool::new(false),
            link: AtomicU32::new(NO_LINK),
            acked: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            expecting: AtomicBool::new(false),
            replied: AtomicBool::new(false),
            reply_len: AtomicUsize::new(0),
            reply: [const { AtomicU32::new(0) }; MSG_WORDS],
        }
    }

    fn is_active_on(&self, base: usize) -> bool {
        self.status.load(Ordering::Acquire) == ACTIVE && self.base.load(Ordering::Relaxed) == base
    }

    fn link_id(&self) -> Option<LinkId> {
        match self.link.load(Ordering::Relaxed) {
            NO_LINK => None,
            raw => Some(LinkId::from_raw(raw)),
        }
    }
}

/// The pool of mailbox-link states and the interrupt entry points for mailbox events
pub struct MboxLinkPool<'q> {
    slots: [State; MAX_MBOX_LINKS],
    cmdq: &'q CmdQueue,
}

impl<'q> MboxLinkPool<'q> {
    /// Creates an empty pool; commands received by server links are put into `cmdq`
    pub const fn new(cmdq: &'q CmdQueue) -> Self {
        Self {
            slots: [const { State::new() }; MAX_MBOX_LINKS],
            cmdq,
        }
    }

    /// Returns the number of connected mailbox links
    pub fn used(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status.load(Ordering::Acquire) != FREE)
            .count()
    }

    /// Connects a new mailbox link on `mldev`
    ///
    /// `link` is the id under which the link is known in the generic link pool; it is attached to
    /// the commands received over this link. On failure, everything acquired so far is released
    /// again.
    pub fn connect<'a>(
        &'a self,
        mldev: MboxLinkDev<'a>,
        clock: &'a Clock,
        params: &MboxLinkParams,
        link: Option<LinkId>,
    ) -> Result<MboxLink<'a>, Error> {
        let state = self
            .slots
            .iter()
            .find(|s| {
                s.status
                    .compare_exchange(FREE, SETUP, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
            .ok_or_else(|| {
                log!(
                    LogFlags::Error,
                    "{}: no free mailbox link state",
                    params.name
                );
                Error::new(Code::NoFreeMbox)
            })?;

        state.base.store(mldev.dev.base(), Ordering::Relaxed);
        state.chan_from.store(params.chans.from, Ordering::Relaxed);
        state.chan_to.store(params.chans.to, Ordering::Relaxed);
        state.rcv_int.store(mldev.rcv_int, Ordering::Relaxed);
        state.ack_int.store(mldev.ack_int, Ordering::Relaxed);
        state
            .server
            .store(params.role == Role::Server, Ordering::Relaxed);
        state
            .link
            .store(link.map_or(NO_LINK, |l| l.to_raw()), Ordering::Relaxed);
        state.acked.store(false, Ordering::Relaxed);
        state.in_flight.store(false, Ordering::Relaxed);
        state.expecting.store(false, Ordering::Relaxed);
        state.replied.store(false, Ordering::Relaxed);
        state.reply_len.store(0, Ordering::Relaxed);

        let from_claim = MboxClaim {
            owner: params.server,
            src: params.client,
            dest: params.server,
            dir: MboxDir::Incoming,
        };
        if let Err(e) = mldev.dev.claim(params.chans.from, from_claim) {
            log!(
                LogFlags::Error,
                "{}: failed to claim incoming channel {}: {}",
                params.name,
                params.chans.from,
                e
            );
            state.status.store(FREE, Ordering::Release);
            return Err(Error::new(Code::MboxClaimFailed));
        }

        let to_claim = MboxClaim {
            owner: params.server,
            src: params.server,
            dest: params.client,
            dir: MboxDir::Outgoing,
        };
        if let Err(e) = mldev.dev.claim(params.chans.to, to_claim) {
            log!(
                LogFlags::Error,
                "{}: failed to claim outgoing channel {}: {}",
                params.name,
                params.chans.to,
                e
            );
            mldev.dev.release(params.chans.from).ok();
            state.status.store(FREE, Ordering::Release);
            return Err(Error::new(Code::MboxClaimFailed));
        }

        state.status.store(ACTIVE, Ordering::Release);
        log!(
            LogFlags::LibMbox,
            "{}: connected ({:?}, from {} to {})",
            params.name,
            params.role,
            params.chans.from,
            params.chans.to
        );

        Ok(MboxLink {
            name: params.name,
            chans: params.chans,
            dev: mldev.dev,
            clock,
            state,
        })
    }

    /// The handler for the receive interrupt `int_idx` of the mailbox block `dev`
    pub fn rcv_isr(&self, dev: &dyn MboxDev, int_idx: u32) {
        let base = dev.base();
        for s in self.slots.iter() {
            if !s.is_active_on(base) || s.rcv_int.load(Ordering::Relaxed) != int_idx {
                continue;
            }

            let chan = s.chan_from.load(Ordering::Relaxed);
            if !dev.take_event(chan, MboxEvent::Rcv) {
                continue;
            }

            let mut buf = [0u8; MBOX_MSG_SIZE];
            let len = match dev.read(chan, &mut buf) {
                Ok(len) => len,
                Err(e) => {
                    log!(LogFlags::Error, "mbox: reading channel {} failed: {}", chan, e);
                    continue;
                },
            };

            match s.server.load(Ordering::Relaxed) {
                true => self.handle_cmd(s, &buf[..len]),
                false => Self::handle_reply(s, chan, &buf[..len]),
            }
        }
    }

    /// The handler for the ack interrupt `int_idx` of the mailbox block `dev`
    pub fn ack_isr(&self, dev: &dyn MboxDev, int_idx: u32) {
        let base = dev.base();
        for s in self.slots.iter() {
            if !s.is_active_on(base) || s.ack_int.load(Ordering::Relaxed) != int_idx {
                continue;
            }

            let chan = s.chan_to.load(Ordering::Relaxed);
            if dev.take_event(chan, MboxEvent::Ack) {
                log!(LogFlags::LibMbox, "mbox: ack on channel {}", chan);
                s.acked.store(true, Ordering::Release);
            }
        }
    }

    fn handle_cmd(&self, s: &State, msg: &[u8]) {
        let cmd = Cmd::from_bytes(s.link_id(), msg);
        log!(
            LogFlags::LibMbox,
            "mbox: command {:#x} on channel {}",
            cmd.msg[0],
            s.chan_from.load(Ordering::Relaxed)
        );
        if let Err(e) = self.cmdq.enqueue(cmd) {
            panic!("mbox: failed to enqueue command: {}", e);
        }
    }

    fn handle_reply(s: &State, chan: u32, msg: &[u8]) {
        if !s.expecting.load(Ordering::Acquire) {
            log!(
                LogFlags::Error,
                "mbox: dropping unexpected reply on channel {}",
                chan
            );
            return;
        }

        store_words(&s.reply, msg);
        s.reply_len.store(msg.len(), Ordering::Relaxed);
        s.replied.store(true, Ordering::Release);
        log!(LogFlags::LibMbox, "mbox: reply of {} bytes on channel {}", msg.len(), chan);
    }
}

/// Marks a request as finished when dropped, no matter how it ended
struct InFlight<'s>(&'s State);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.expecting.store(false, Ordering::Release);
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// A connected mailbox link
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MboxLink<'a> {
    pub(crate) name: &'static str,
    chans: ChanPair,
    #[derivative(Debug = "ignore")]
    dev: &'a dyn MboxDev,
    #[derivative(Debug = "ignore")]
    clock: &'a Clock,
    #[derivative(Debug = "ignore")]
    state: &'a State,
}

impl<'a> MboxLink<'a> {
    /// Returns the channels of the link
    pub fn chans(&self) -> ChanPair {
        self.chans
    }
}

impl<'a> Link for MboxLink<'a> {
    fn name(&self) -> &str {
        self.name
    }

    fn send(&self, timeout: Timeout, msg: &[u8]) -> Result<usize, Error> {
        if msg.len() > MBOX_MSG_SIZE {
            return Err(Error::new(Code::InvArgs));
        }

        self.state.acked.store(false, Ordering::Release);

        let deadline = timeout.map(|ms| self.clock.deadline(ms));
        loop {
            match self.dev.write(self.chans.to, msg) {
                Ok(0) => return Err(Error::new(Code::SendFailed)),
                Ok(n) => {
                    log!(LogFlags::LibMbox, "{}: sent {} bytes", self.name, n);
                    return Ok(n);
                },
                Err(e) if e.code() == Code::MboxBusy => {
                    if let Some(end) = deadline {
                        if end.is_reached(self.clock.now()) {
                            return Err(Error::new(Code::Timeout));
                        }
                    }
                    cpu::relax();
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn is_send_acked(&self) -> bool {
        self.state.acked.load(Ordering::Acquire)
    }

    fn request(
        &self,
        wtimeout: Timeout,
        req: &[u8],
        rtimeout: Timeout,
        reply: &mut [u8],
    ) -> Result<usize, Error> {
        let s = self.state;
        if s.in_flight.swap(true, Ordering::AcqRel) {
            log!(LogFlags::Error, "{}: request already in flight", self.name);
            return Err(Error::new(Code::Busy));
        }
        let _guard = InFlight(s);

        // register the reply buffer before sending, the reply may arrive right away
        s.replied.store(false, Ordering::Release);
        s.reply_len.store(0, Ordering::Relaxed);
        s.expecting.store(true, Ordering::Release);

        self.send(wtimeout, req)?;

        log!(LogFlags::LibLink, "{}: waiting for ack", self.name);
        wait_for(self.clock, &s.acked, wtimeout).map_err(|e| {
            log!(LogFlags::Error, "{}: no ack for request: {}", self.name, e);
            e
        })?;

        log!(LogFlags::LibLink, "{}: waiting for reply", self.name);
        wait_for(self.clock, &s.replied, rtimeout).map_err(|e| {
            log!(LogFlags::Error, "{}: no reply for request: {}", self.name, e);
            e
        })?;

        let len = cmp::min(s.reply_len.load(Ordering::Relaxed), reply.len());
        load_words(&s.reply, &mut reply[..len]);
        log!(LogFlags::LibLink, "{}: received reply of {} bytes", self.name, len);
        Ok(len)
    }

    fn recv(&self, _buf: &mut [u8]) -> Result<usize, Error> {
        // incoming messages are delivered by the receive interrupt
        Err(Error::new(Code::NotSup))
    }

    fn disconnect(self) -> Result<(), Error> {
        log!(LogFlags::LibMbox, "{}: disconnect", self.name);
        let from = self.dev.release(self.chans.from);
        let to = self.dev.release(self.chans.to);
        self.state.link.store(NO_LINK, Ordering::Relaxed);
        self.state.status.store(FREE, Ordering::Release);
        from.and(to)
    }
}
