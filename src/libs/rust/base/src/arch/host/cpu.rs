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

// hosted builds (unit tests) simulate interrupts with threads, so there is nothing to mask and
// waiting for an interrupt degrades to a spin hint.

pub struct CPU {}

impl crate::arch::CPUOps for CPU {
    fn int_disable() {
    }

    fn int_enable() {
    }

    fn int_save_disable() -> bool {
        true
    }

    fn int_restore(_enabled: bool) {
    }

    fn wait_for_interrupt() {
        core::hint::spin_loop();
    }

    fn relax() {
        core::hint::spin_loop();
    }
}
