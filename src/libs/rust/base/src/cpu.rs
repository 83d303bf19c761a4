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

//! Contains the CPU hooks used by the main loops and busy waits

use crate::arch::{CPUOps, CPU};

/// Masks all interrupts
pub fn int_disable() {
    CPU::int_disable();
}

/// Unmasks all interrupts
pub fn int_enable() {
    CPU::int_enable();
}

/// Runs `func` with interrupts masked and returns its result
///
/// Interrupts are unmasked afterwards only if they have been unmasked before, so that this can be
/// used from interrupt handlers as well.
pub fn without_interrupts<R, F: FnOnce() -> R>(func: F) -> R {
    let enabled = CPU::int_save_disable();
    let res = func();
    CPU::int_restore(enabled);
    res
}

/// Halts until the next interrupt
///
/// This is meant to be called with interrupts masked after checking that there is no pending
/// work. An interrupt that arrives after the check still wakes the core up.
pub fn wait_for_interrupt() {
    CPU::wait_for_interrupt();
}

/// Spends a moment in a busy-wait loop
pub fn relax() {
    CPU::relax();
}
