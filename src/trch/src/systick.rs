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

//! The system tick
//!
//! The tick interrupt advances the clock that drives software timers and link timeouts and keeps
//! the watchdog of the TRCH alive. It has to work while the main loop is busy, e.g., waiting for
//! the reply to a request, so that the state it touches is shared with the main loop instead of
//! being owned by it.

use core::sync::atomic::{AtomicBool, Ordering};

use base::kif::Comp;
use base::time::{Clock, CycleDuration};

use crate::hw::WdtKick;

/// The state of the system tick interrupt
pub struct SysTick<'a> {
    clock: &'a Clock,
    interval: CycleDuration,
    wdt: &'a dyn WdtKick,
    wdt_started: AtomicBool,
}

impl<'a> SysTick<'a> {
    /// Creates the tick that advances `clock` by `interval` and kicks the TRCH watchdog via `wdt`
    pub fn new(clock: &'a Clock, interval: CycleDuration, wdt: &'a dyn WdtKick) -> Self {
        Self {
            clock,
            interval,
            wdt,
            wdt_started: AtomicBool::new(false),
        }
    }

    /// Returns true if the watchdog of the TRCH is running and therefore kicked
    pub fn wdt_started(&self) -> bool {
        self.wdt_started.load(Ordering::Acquire)
    }

    pub(crate) fn set_wdt_started(&self, started: bool) {
        self.wdt_started.store(started, Ordering::Release);
    }

    /// The body of the system tick interrupt
    pub fn tick(&self) {
        // kick here instead of in the main loop, which might be busy with a long operation
        if self.wdt_started() {
            self.wdt.kick(Comp::TRCH);
        }
        self.clock.tick(self.interval);
    }
}
