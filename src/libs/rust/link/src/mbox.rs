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

//! The contract with the mailbox driver

use base::errors::Error;

/// The direction of a mailbox channel, seen from the claiming side
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MboxDir {
    Incoming,
    Outgoing,
}

/// The parameters for claiming a mailbox channel
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MboxClaim {
    /// The owner id of the channel (0 if the channel is owned by somebody else)
    pub owner: u32,
    /// The owner id of the sender
    pub src: u32,
    /// The owner id of the receiver
    pub dest: u32,
    pub dir: MboxDir,
}

/// The events a mailbox channel raises
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MboxEvent {
    /// A message has arrived on the channel
    Rcv,
    /// The receiver has read the message previously sent on the channel
    Ack,
}

/// A mailbox IP block with 32 channels
///
/// Messages are fixed-size; writing places a message into the channel, reading it on the other
/// side acknowledges it to the sender. The events of all channels are multiplexed onto a few
/// interrupts per block, so that the interrupt handler has to ask each channel whether it raised
/// an event.
pub trait MboxDev: Sync {
    /// Returns the base address of the block, which identifies it
    fn base(&self) -> usize;

    /// Claims channel `chan`
    fn claim(&self, chan: u32, claim: MboxClaim) -> Result<(), Error>;

    /// Releases channel `chan`
    fn release(&self, chan: u32) -> Result<(), Error>;

    /// Writes `msg` into channel `chan` and returns the number of written bytes
    ///
    /// Fails with `MboxBusy` if the receiver has not read the previous message yet.
    fn write(&self, chan: u32, msg: &[u8]) -> Result<usize, Error>;

    /// Reads the message in channel `chan` into `buf` and acknowledges it
    fn read(&self, chan: u32, buf: &mut [u8]) -> Result<usize, Error>;

    /// Returns true and clears the event if channel `chan` has raised `ev`
    fn take_event(&self, chan: u32, ev: MboxEvent) -> bool;
}

/// A mailbox IP block together with the interrupts the TRCH receives its events on
#[derive(Copy, Clone)]
pub struct MboxLinkDev<'a> {
    pub dev: &'a dyn MboxDev,
    /// The interrupt index for incoming messages
    pub rcv_int: u32,
    /// The interrupt index for acknowledgements
    pub ack_int: u32,
}

impl<'a> MboxLinkDev<'a> {
    pub fn new(dev: &'a dyn MboxDev, rcv_int: u32, ack_int: u32) -> Self {
        Self {
            dev,
            rcv_int,
            ack_int,
        }
    }
}
