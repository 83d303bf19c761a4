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
use core::ops::{Add, AddAssign, Sub};

/// A duration in cycles of the clock that drives the timers
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct CycleDuration(u64);

impl CycleDuration {
    /// The zero duration
    pub const ZERO: Self = Self(0);

    /// Creates a new duration from given cycle count
    pub const fn new(cycles: u64) -> Self {
        Self(cycles)
    }

    /// Returns the number of cycles
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl Add for CycleDuration {
    type Output = CycleDuration;

    fn add(self, rhs: CycleDuration) -> CycleDuration {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for CycleDuration {
    fn add_assign(&mut self, rhs: CycleDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl fmt::Debug for CycleDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cycles", self.0)
    }
}

/// A point in time, measured in cycles since the clock has been started
///
/// The counter is 64 bits wide, which does not overflow within the lifetime of the chip at any
/// supported clock rate. Instants are therefore ordered plainly, without wrap-around.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct CycleInstant(u64);

impl CycleInstant {
    /// Creates an instant from the raw counter value
    pub const fn new(cycles: u64) -> Self {
        Self(cycles)
    }

    /// Returns the raw counter value
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Returns true if `now` is at or past this instant
    pub fn is_reached(self, now: CycleInstant) -> bool {
        now.0 >= self.0
    }

    /// Returns the duration from `earlier` to this instant, or zero if `earlier` is later
    pub fn duration_since(self, earlier: CycleInstant) -> CycleDuration {
        CycleDuration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<CycleDuration> for CycleInstant {
    type Output = CycleInstant;

    fn add(self, rhs: CycleDuration) -> CycleInstant {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub<CycleInstant> for CycleInstant {
    type Output = CycleDuration;

    fn sub(self, rhs: CycleInstant) -> CycleDuration {
        self.duration_since(rhs)
    }
}

impl fmt::Debug for CycleInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
