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

//! Simulated hardware and peers
//!
//! The simulated peers run in their own threads, so that acknowledgements and replies arrive while
//! the TRCH side spins in a request, just like interrupts on the real hardware.

use std::cell::RefCell;
use std::io::Write;
use std::mem;
use std::sync::{Mutex, MutexGuard, Once};
use std::thread;
use std::time::{Duration, Instant};

use base::errors::{Code, Error};
use base::io::{self, LogFlags};
use base::kif::cmd::MBOX_MSG_SIZE;
use base::kif::mboxmap::{ChanPair, MBOX_CHANS};
use base::kif::{Comp, CpuGroup};

use link::cmd::words_to_bytes;
use link::{MboxClaim, MboxDev, MboxEvent, MboxLinkDev, MboxLinkPool};

use trch::hw::{BlobStore, R52Mode, ResetCtl, Watchdogs, WdtKick};
use trch::syscfg::SYSCFG_WORDS;

/// How long simulated peers wait for the TRCH before giving up
pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

fn stdout_sink(buf: &[u8]) -> Result<usize, Error> {
    std::io::stdout()
        .write(buf)
        .map_err(|_| Error::new(Code::SendFailed))
}

/// Enables the log once per process
pub fn init_log() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let flags = std::env::var("TRCH_LOG")
            .ok()
            .and_then(|f| f.parse::<LogFlags>().ok())
            .unwrap_or_default();
        io::init("test", flags, stdout_sink);
    });
}

/// Encodes words as little-endian bytes
pub fn bytes(words: &[u32]) -> Vec<u8> {
    let mut buf = vec![0u8; words.len() * 4];
    words_to_bytes(words, &mut buf);
    buf
}

/// Decodes little-endian bytes into words; a trailing partial word is padded with zeros
pub fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|c| {
            let mut raw = [0u8; 4];
            raw[..c.len()].copy_from_slice(c);
            u32::from_le_bytes(raw)
        })
        .collect()
}

#[derive(Default)]
struct Chan {
    claim: Option<MboxClaim>,
    msg: Option<Vec<u8>>,
    rcv_ev: bool,
    ack_ev: bool,
}

/// A simulated mailbox IP block
pub struct SimMbox {
    base: usize,
    chans: Mutex<Vec<Chan>>,
    broken_chan: Mutex<Option<u32>>,
}

impl SimMbox {
    pub fn new(base: usize) -> Self {
        Self {
            base,
            chans: Mutex::new((0..MBOX_CHANS).map(|_| Chan::default()).collect()),
            broken_chan: Mutex::new(None),
        }
    }

    fn chans(&self) -> MutexGuard<'_, Vec<Chan>> {
        self.chans.lock().unwrap()
    }

    /// Lets all claims of `chan` fail
    pub fn break_chan(&self, chan: Option<u32>) {
        *self.broken_chan.lock().unwrap() = chan;
    }

    /// Returns the claim of `chan`, if any
    pub fn claim_of(&self, chan: u32) -> Option<MboxClaim> {
        self.chans()[chan as usize].claim
    }

    /// Returns the number of claimed channels
    pub fn claimed(&self) -> usize {
        self.chans().iter().filter(|c| c.claim.is_some()).count()
    }

    /// Returns true if `chan` holds a message that has not been read yet
    pub fn has_msg(&self, chan: u32) -> bool {
        self.chans()[chan as usize].msg.is_some()
    }

    /// Waits until `chan` holds a message
    pub fn wait_msg(&self, chan: u32, timeout: Duration) -> bool {
        let end = Instant::now() + timeout;
        while !self.has_msg(chan) {
            if Instant::now() >= end {
                return false;
            }
            thread::sleep(Duration::from_micros(50));
        }
        true
    }

    /// Reads the message in `chan` on the peer side, which raises the ack event
    pub fn peer_read(&self, chan: u32) -> Option<Vec<u8>> {
        let mut chans = self.chans();
        let c = &mut chans[chan as usize];
        let msg = c.msg.take()?;
        c.ack_ev = true;
        Some(msg)
    }

    /// Writes `msg` into `chan` on the peer side, which raises the receive event
    pub fn peer_write(&self, chan: u32, msg: &[u8]) {
        let mut chans = self.chans();
        let c = &mut chans[chan as usize];
        c.msg = Some(msg.to_vec());
        c.rcv_ev = true;
    }
}

impl MboxDev for SimMbox {
    fn base(&self) -> usize {
        self.base
    }

    fn claim(&self, chan: u32, claim: MboxClaim) -> Result<(), Error> {
        if *self.broken_chan.lock().unwrap() == Some(chan) {
            return Err(Error::new(Code::InvState));
        }
        let mut chans = self.chans();
        let c = chans
            .get_mut(chan as usize)
            .ok_or_else(|| Error::new(Code::InvArgs))?;
        if c.claim.is_some() {
            return Err(Error::new(Code::InvState));
        }
        *c = Chan {
            claim: Some(claim),
            ..Chan::default()
        };
        Ok(())
    }

    fn release(&self, chan: u32) -> Result<(), Error> {
        let mut chans = self.chans();
        let c = chans
            .get_mut(chan as usize)
            .ok_or_else(|| Error::new(Code::InvArgs))?;
        match c.claim.take() {
            Some(_) => {
                *c = Chan::default();
                Ok(())
            },
            None => Err(Error::new(Code::InvState)),
        }
    }

    fn write(&self, chan: u32, msg: &[u8]) -> Result<usize, Error> {
        let mut chans = self.chans();
        let c = &mut chans[chan as usize];
        if c.claim.is_none() {
            return Err(Error::new(Code::InvState));
        }
        if c.msg.is_some() {
            return Err(Error::new(Code::MboxBusy));
        }
        c.msg = Some(msg.to_vec());
        Ok(msg.len())
    }

    fn read(&self, chan: u32, buf: &mut [u8]) -> Result<usize, Error> {
        let mut chans = self.chans();
        let msg = chans[chan as usize]
            .msg
            .take()
            .ok_or_else(|| Error::new(Code::RecvFailed))?;
        let len = msg.len().min(buf.len());
        buf[..len].copy_from_slice(&msg[..len]);
        Ok(len)
    }

    fn take_event(&self, chan: u32, ev: MboxEvent) -> bool {
        let mut chans = self.chans();
        let c = &mut chans[chan as usize];
        match ev {
            MboxEvent::Rcv => mem::replace(&mut c.rcv_ev, false),
            MboxEvent::Ack => mem::replace(&mut c.ack_ev, false),
        }
    }
}

/// The software on the other side of a mailbox link
///
/// The peer raises the interrupts of the TRCH by calling the interrupt entry points of the
/// mailbox-link pool.
pub struct Peer<'a> {
    dev: &'a SimMbox,
    pool: &'a MboxLinkPool<'a>,
    chans: ChanPair,
    rcv_int: u32,
    ack_int: u32,
}

impl<'a> Peer<'a> {
    /// Creates the peer of the link on `mldev` with channels `chans` (seen from the TRCH)
    pub fn new(
        dev: &'a SimMbox,
        pool: &'a MboxLinkPool<'a>,
        mldev: &MboxLinkDev<'_>,
        chans: ChanPair,
    ) -> Self {
        Self {
            dev,
            pool,
            chans,
            rcv_int: mldev.rcv_int,
            ack_int: mldev.ack_int,
        }
    }

    /// Waits for a message from the TRCH, reads it, and raises the ack interrupt
    pub fn recv(&self) -> Option<Vec<u32>> {
        if !self.dev.wait_msg(self.chans.to, PEER_TIMEOUT) {
            return None;
        }
        let msg = self.dev.peer_read(self.chans.to)?;
        self.pool.ack_isr(self.dev, self.ack_int);
        Some(words(&msg))
    }

    /// Sends `msg` to the TRCH and raises the receive interrupt
    pub fn send(&self, msg: &[u32]) {
        self.dev.peer_write(self.chans.from, &bytes(msg));
        self.pool.rcv_isr(self.dev, self.rcv_int);
    }

    /// Receives one request and answers it with the reply `func` returns
    pub fn serve<F: FnOnce(&[u32]) -> Vec<u32>>(&self, func: F) -> Option<Vec<u32>> {
        let req = self.recv()?;
        self.send(&func(&req));
        Some(req)
    }
}

/// An operation on the simulated reset controller or watchdogs
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HwOp {
    Assert(Comp),
    Release(Comp),
    R52Mode(R52Mode),
    InitGroup(CpuGroup),
    Start(Comp),
    Stop(Comp),
}

/// Records all operations on the reset controller and the watchdogs
#[derive(Default, Debug)]
pub struct MockHw {
    pub ops: Vec<HwOp>,
    /// Releasing these CPUs fails
    pub broken: Option<Comp>,
}

impl MockHw {
    pub fn count(&self, op: HwOp) -> usize {
        self.ops.iter().filter(|o| **o == op).count()
    }
}

impl ResetCtl for MockHw {
    fn assert(&mut self, cpus: Comp) -> Result<(), Error> {
        self.ops.push(HwOp::Assert(cpus));
        Ok(())
    }

    fn release(&mut self, cpus: Comp) -> Result<(), Error> {
        self.ops.push(HwOp::Release(cpus));
        match self.broken {
            Some(b) if b.intersects(cpus) => Err(Error::new(Code::InvState)),
            _ => Ok(()),
        }
    }

    fn set_rtps_r52_mode(&mut self, mode: R52Mode) -> Result<(), Error> {
        self.ops.push(HwOp::R52Mode(mode));
        Ok(())
    }
}

impl Watchdogs for MockHw {
    fn init_group(&mut self, group: CpuGroup) -> Result<(), Error> {
        self.ops.push(HwOp::InitGroup(group));
        Ok(())
    }

    fn start(&mut self, cpus: Comp) -> Result<(), Error> {
        self.ops.push(HwOp::Start(cpus));
        Ok(())
    }

    fn stop(&mut self, cpus: Comp) -> Result<(), Error> {
        self.ops.push(HwOp::Stop(cpus));
        Ok(())
    }
}

/// Records the watchdog kicks of the system tick, which may come from any thread
#[derive(Default, Debug)]
pub struct MockKick {
    kicks: Mutex<Vec<Comp>>,
}

impl MockKick {
    pub fn count(&self, cpus: Comp) -> usize {
        self.kicks.lock().unwrap().iter().filter(|c| **c == cpus).count()
    }
}

impl WdtKick for MockKick {
    fn kick(&self, cpus: Comp) {
        self.kicks.lock().unwrap().push(cpus);
    }
}

/// A file system with a fixed set of images
#[derive(Default, Debug)]
pub struct MockFs {
    pub files: Vec<&'static str>,
    pub loaded: Vec<String>,
}

impl MockFs {
    pub fn new(files: &[&'static str]) -> Self {
        Self {
            files: files.to_vec(),
            loaded: Vec::new(),
        }
    }
}

impl BlobStore for MockFs {
    fn load(&mut self, name: &str) -> Result<(), Error> {
        match self.files.contains(&name) {
            true => {
                self.loaded.push(name.to_string());
                Ok(())
            },
            false => Err(Error::new(Code::NoSuchFile)),
        }
    }
}

/// Gives the firmware exclusive access to simulated hardware that the test can still inspect
pub struct Shared<'h, T>(pub &'h RefCell<T>);

impl ResetCtl for Shared<'_, MockHw> {
    fn assert(&mut self, cpus: Comp) -> Result<(), Error> {
        self.0.borrow_mut().assert(cpus)
    }

    fn release(&mut self, cpus: Comp) -> Result<(), Error> {
        self.0.borrow_mut().release(cpus)
    }

    fn set_rtps_r52_mode(&mut self, mode: R52Mode) -> Result<(), Error> {
        self.0.borrow_mut().set_rtps_r52_mode(mode)
    }
}

impl Watchdogs for Shared<'_, MockHw> {
    fn init_group(&mut self, group: CpuGroup) -> Result<(), Error> {
        self.0.borrow_mut().init_group(group)
    }

    fn start(&mut self, cpus: Comp) -> Result<(), Error> {
        self.0.borrow_mut().start(cpus)
    }

    fn stop(&mut self, cpus: Comp) -> Result<(), Error> {
        self.0.borrow_mut().stop(cpus)
    }
}

impl BlobStore for Shared<'_, MockFs> {
    fn load(&mut self, name: &str) -> Result<(), Error> {
        self.0.borrow_mut().load(name)
    }
}

/// Builds the words of a system boot configuration
pub fn syscfg_words(
    word0: u32,
    sfs_offset: u32,
    r52: &[&str],
    a53: &[&str],
    hpps: &[&str],
) -> [u32; SYSCFG_WORDS] {
    let mut cfg = [0u32; SYSCFG_WORDS];
    cfg[0] = word0;
    cfg[1] = sfs_offset;
    for (start, names) in [(2, r52), (18, a53), (34, hpps)] {
        let mut raw = Vec::new();
        for n in names {
            raw.extend_from_slice(n.as_bytes());
            raw.push(0);
        }
        raw.resize(16 * 4, 0);
        cfg[start..start + 16].copy_from_slice(&words(&raw[..16 * 4]));
    }
    cfg
}

/// A message that fills a whole mailbox
pub fn full_msg() -> [u8; MBOX_MSG_SIZE] {
    let mut msg = [0u8; MBOX_MSG_SIZE];
    for (i, b) in msg.iter_mut().enumerate() {
        *b = i as u8;
    }
    msg
}
