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

//! Software timers driven by the periodic tick
//!
//! The tick interrupt advances the [`Clock`]; the main loop calls [`SwTimers::run`] in every
//! iteration, which invokes the callbacks of all expired timers. Timers are kept in a fixed pool
//! and identified by generation-tagged ids, so that a stale id (e.g., of a one-shot timer that
//! already fired) is detected instead of referring to a reused slot.

#![no_std]

use core::cell::RefCell;
use core::fmt;

use base::col::{Pool, PoolId};
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::time::{Clock, CycleDuration, CycleInstant};

use derivative::Derivative;

/// The default number of timers that can be active at the same time
pub const MAX_TIMERS: usize = 16;

/// Identifies a scheduled timer
pub type TimerId = PoolId;

/// Whether a timer fires once or repeatedly
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerKind {
    Periodic,
    OneShot,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Timer<'a> {
    #[derivative(Debug = "ignore")]
    cb: &'a dyn Fn(usize),
    arg: usize,
    periodic: bool,
    interval: CycleDuration,
    next: CycleInstant,
}

/// The list of active software timers
///
/// The timers are not sorted by deadline; [`run`](SwTimers::run) scans all of them, which is fine
/// for the small number of timers on the TRCH.
pub struct SwTimers<'a, const N: usize = MAX_TIMERS> {
    clock: &'a Clock,
    timers: RefCell<Pool<Timer<'a>, N>>,
}

impl<'a, const N: usize> SwTimers<'a, N> {
    /// Creates an empty timer list that is driven by `clock`
    pub fn new(clock: &'a Clock) -> Self {
        log!(LogFlags::LibTimer, "swtimer: init clk freq {}", clock.freq());
        Self {
            clock,
            timers: RefCell::new(Pool::new()),
        }
    }

    /// Returns the clock that drives the timers
    pub fn clock(&self) -> &'a Clock {
        self.clock
    }

    /// Advances the clock by `delta` cycles
    pub fn tick(&self, delta: CycleDuration) {
        self.clock.tick(delta);
    }

    /// Schedules a new timer that expires `interval_ms` milliseconds from now
    ///
    /// Once expired, `cb` is called with `arg`. Periodic timers are rescheduled afterwards,
    /// one-shot timers are removed. Fails with [`Code::NoSpace`] if all timer slots are in use.
    pub fn schedule(
        &self,
        interval_ms: u32,
        kind: TimerKind,
        cb: &'a dyn Fn(usize),
        arg: usize,
    ) -> Result<TimerId, Error> {
        let interval = self.clock.ms_to_cycles(interval_ms);
        let timer = Timer {
            cb,
            arg,
            periodic: kind == TimerKind::Periodic,
            interval,
            next: self.clock.now() + interval,
        };

        let next = timer.next;
        let id = self.timers.borrow_mut().alloc(timer)?;
        log!(
            LogFlags::LibTimer,
            "swtimer: sched {:?} interval {:?} kind {:?}: next {:?}",
            id,
            interval,
            kind,
            next
        );
        Ok(id)
    }

    /// Cancels the given timer
    ///
    /// Fails with [`Code::InvArgs`] if the timer is not active (anymore).
    pub fn cancel(&self, id: TimerId) -> Result<(), Error> {
        log!(LogFlags::LibTimer, "swtimer: cancel {:?}", id);
        self.timers
            .borrow_mut()
            .free(id)
            .map(|_| ())
            .ok_or_else(|| Error::new(Code::InvArgs))
    }

    /// Returns true if the given timer is active
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.borrow().contains(id)
    }

    /// Returns the point in time at which the given timer expires next
    pub fn next_fire(&self, id: TimerId) -> Option<CycleInstant> {
        self.timers.borrow().get(id).map(|t| t.next)
    }

    /// Returns the number of active timers
    pub fn active(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Invokes the callbacks of all expired timers and returns the number of invoked callbacks
    ///
    /// The timer list is not borrowed while a callback runs. The order in which timers that expired
    /// at the same time fire is unspecified.
    pub fn run(&self) -> usize {
        let mut fired = 0;
        for idx in 0..N {
            let now = self.clock.now();
            let expired = {
                let timers = self.timers.borrow();
                timers.id_at(idx).and_then(|id| {
                    let t = timers.get(id)?;
                    match t.next.is_reached(now) {
                        true => Some((id, t.cb, t.arg)),
                        false => None,
                    }
                })
            };

            if let Some((id, cb, arg)) = expired {
                log!(LogFlags::LibTimer, "swtimer: expired {:?} @ {:?}", id, now);
                cb(arg);
                fired += 1;

                let mut timers = self.timers.borrow_mut();
                match timers.get_mut(id) {
                    Some(t) if t.periodic => t.next = now + t.interval,
                    Some(_) => {
                        timers.free(id);
                    },
                    None => {},
                }
            }
        }
        fired
    }
}

impl<const N: usize> fmt::Debug for SwTimers<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timers = self.timers.borrow();
        let mut l = f.debug_map();
        for (id, t) in timers.iter() {
            l.entry(&id, t);
        }
        l.finish()
    }
}
