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

use core::fmt;

use spin::Mutex;

use crate::cpu;
use crate::time::{CycleDuration, CycleInstant};

/// The cycle counter of the TRCH
///
/// The counter does not run by itself, but is advanced by the periodic tick interrupt via
/// [`tick`](Clock::tick). Everything that needs to measure time (software timers, link timeouts)
/// reads it via [`now`](Clock::now).
///
/// The counter is 64 bits wide. The TRCH has no 64-bit atomics, so it is protected by a lock that
/// is only taken with interrupts masked.
pub struct Clock {
    freq: u32,
    now: Mutex<u64>,
}

impl Clock {
    /// Creates a new clock running at `freq` Hz, starting at zero
    pub const fn new(freq: u32) -> Self {
        Self {
            freq,
            now: Mutex::new(0),
        }
    }

    /// Returns the frequency in Hz
    pub fn freq(&self) -> u32 {
        self.freq
    }

    /// Advances the clock by `delta` cycles
    ///
    /// This is safe to call from interrupt context.
    pub fn tick(&self, delta: CycleDuration) {
        cpu::without_interrupts(|| {
            let mut now = self.now.lock();
            *now = now.saturating_add(delta.as_raw());
        });
    }

    /// Returns the current time
    pub fn now(&self) -> CycleInstant {
        CycleInstant::new(cpu::without_interrupts(|| *self.now.lock()))
    }

    /// Converts the given number of milliseconds into cycles
    pub fn ms_to_cycles(&self, ms: u32) -> CycleDuration {
        CycleDuration::new(ms as u64 * (self.freq / 1000) as u64)
    }

    /// Returns the instant that lies `ms` milliseconds in the future
    pub fn deadline(&self, ms: u32) -> CycleInstant {
        self.now() + self.ms_to_cycles(ms)
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clock[freq={}Hz, now={:?}]", self.freq, self.now())
    }
}
