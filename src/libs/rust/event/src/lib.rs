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

//! A cooperative event loop that delivers events to actors
//!
//! Events are kept in a bounded FIFO queue and delivered one at a time by [`EvLoop::process`],
//! which is called once per main-loop iteration. Posting is safe from interrupt context, because it
//! only appends to the queue. The queue is sized such that producers never outpace the main loop;
//! an overflow is therefore treated as a fatal error.

#![no_std]

use core::fmt;

use base::col::RingBuf;
use base::cpu;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;

use spin::Mutex;

/// The capacity of the event queue
pub const EV_QUEUE_LEN: usize = 16;

/// The maximum number of actors per event loop
pub const MAX_ACTORS: usize = 8;

/// The payload of an event, interpreted by the receiving actor
pub type Event = u64;

/// Identifies an actor registered at an [`EvLoop`]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ActorId(u8);

impl ActorId {
    /// Returns the raw id
    pub fn raw(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// A unit of cooperative logic that receives events
///
/// Actors typically implement an explicit state machine. Receiving an event that is not valid in
/// the current state is a protocol violation and should be reported via [`invalid_event`].
pub trait Actor: Send {
    /// Returns the name of the actor (for diagnostics)
    fn name(&self) -> &str;

    /// Handles `event`, sent by `sender` (`None` for anonymous or system-originated events)
    fn handle(&mut self, evl: &EvLoop<'_>, sender: Option<ActorId>, event: Event);
}

/// Aborts because `actor` received `event` in `state`, in which it is not valid
#[track_caller]
pub fn invalid_event<S: fmt::Debug>(actor: &str, state: S, event: Event) -> ! {
    panic!(
        "{}: invalid event {:#x} in state {:?}",
        actor, event, state
    )
}

#[derive(Copy, Clone, Debug)]
struct Slot {
    target: ActorId,
    sender: Option<ActorId>,
    event: Event,
}

/// The event loop
pub struct EvLoop<'a> {
    name: &'static str,
    queue: Mutex<RingBuf<Slot, EV_QUEUE_LEN>>,
    actors: Mutex<[Option<&'a mut dyn Actor>; MAX_ACTORS]>,
}

impl<'a> EvLoop<'a> {
    /// Creates a new event loop with given name and an empty queue
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            queue: Mutex::new(RingBuf::new()),
            actors: Mutex::new([const { None }; MAX_ACTORS]),
        }
    }

    /// Returns the name of the loop
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers the given actor and returns its id
    ///
    /// Fails with [`Code::NoSpace`] if [`MAX_ACTORS`] actors are already registered.
    pub fn register(&self, actor: &'a mut dyn Actor) -> Result<ActorId, Error> {
        let mut actors = self.actors.lock();
        let idx = actors
            .iter()
            .position(|a| a.is_none())
            .ok_or_else(|| Error::new(Code::NoSpace))?;
        log!(
            LogFlags::LibEvent,
            "{}: registered actor {} as A{}",
            self.name,
            actor.name(),
            idx
        );
        actors[idx] = Some(actor);
        Ok(ActorId(idx as u8))
    }

    /// Appends `event` from `sender` to `target` at the tail of the queue
    ///
    /// Panics if the queue is full.
    pub fn post(&self, sender: Option<ActorId>, target: ActorId, event: Event) {
        log!(
            LogFlags::LibEvent,
            "{}: post {:?} -> {:?}: {:#x}",
            self.name,
            sender,
            target,
            event
        );

        let slot = Slot {
            target,
            sender,
            event,
        };
        if cpu::without_interrupts(|| self.queue.lock().push(slot)).is_err() {
            panic!("{}: event queue overflow", self.name);
        }
    }

    /// Returns true if there are events in the queue
    pub fn pending(&self) -> bool {
        cpu::without_interrupts(|| !self.queue.lock().is_empty())
    }

    /// Delivers the event at the head of the queue to its target
    ///
    /// Returns true if further events are pending afterwards. Returns false without doing anything
    /// if the queue is empty.
    pub fn process(&self) -> bool {
        let slot = match cpu::without_interrupts(|| self.queue.lock().pop()) {
            Some(s) => s,
            None => return false,
        };

        // the actor leaves the registry while it runs; events it posts are queued
        let actor = self.actors.lock()[slot.target.raw()].take();
        let actor = match actor {
            Some(a) => a,
            None => panic!(
                "{}: no actor {:?} for event {:#x}",
                self.name, slot.target, slot.event
            ),
        };

        log!(
            LogFlags::LibEvent,
            "{}: {:?} -> {}: {:#x}",
            self.name,
            slot.sender,
            actor.name(),
            slot.event
        );
        actor.handle(self, slot.sender, slot.event);

        self.actors.lock()[slot.target.raw()] = Some(actor);
        self.pending()
    }
}

impl fmt::Debug for EvLoop<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvLoop[{}, queue={:?}]", self.name, *self.queue.lock())
    }
}
