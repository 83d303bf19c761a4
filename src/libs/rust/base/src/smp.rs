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

//! Contains the hand-off between the secondary and the primary core of an SMP cluster

use spin::Mutex;

use crate::cpu;
use crate::errors::{Code, Error};

/// A one-time signal from a secondary core to the primary core
///
/// When a cluster boots in SMP mode, the secondary core comes up on its own and has to tell the
/// primary core that it is ready. This happens exactly once per boot; the flag is protected by a
/// spin lock, because both cores access it concurrently.
pub struct Handoff {
    done: Mutex<bool>,
}

impl Handoff {
    /// Creates a new, unsignaled hand-off
    pub const fn new() -> Self {
        Self {
            done: Mutex::new(false),
        }
    }

    /// Signals the primary core. Must only be called once by the secondary core
    pub fn signal(&self) -> Result<(), Error> {
        let mut done = self.done.lock();
        if *done {
            return Err(Error::new(Code::InvState));
        }
        *done = true;
        Ok(())
    }

    /// Returns true if the secondary core has signaled
    pub fn is_signaled(&self) -> bool {
        *self.done.lock()
    }

    /// Spins until the secondary core has signaled
    pub fn wait(&self) {
        while !self.is_signaled() {
            cpu::relax();
        }
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}
