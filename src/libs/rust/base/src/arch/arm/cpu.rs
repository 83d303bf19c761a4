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

use core::arch::asm;

// Masking and unmasking interrupts and WFI act as compiler barriers (no `nomem`), so that
// accesses to state shared with interrupt handlers stay inside the masked window.
pub struct CPU {}

impl crate::arch::CPUOps for CPU {
    #[inline(always)]
    fn int_disable() {
        unsafe { asm!("cpsid i", options(nostack)) };
    }

    #[inline(always)]
    fn int_enable() {
        unsafe { asm!("cpsie i", options(nostack)) };
    }

    #[inline(always)]
    fn int_save_disable() -> bool {
        let primask: u32;
        unsafe {
            asm!("mrs {0}, primask", out(reg) primask, options(nomem, nostack));
            asm!("cpsid i", options(nostack));
        }
        (primask & 1) == 0
    }

    #[inline(always)]
    fn int_restore(enabled: bool) {
        if enabled {
            unsafe { asm!("cpsie i", options(nostack)) };
        }
    }

    #[inline(always)]
    fn wait_for_interrupt() {
        unsafe { asm!("dsb", "wfi", options(nostack)) };
    }

    #[inline(always)]
    fn relax() {
        core::hint::spin_loop();
    }
}
