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

use cfg_if::cfg_if;

/// Contains CPU-specific operations
pub trait CPUOps {
    /// Masks all interrupts on the current core
    fn int_disable();

    /// Unmasks all interrupts on the current core
    fn int_enable();

    /// Masks all interrupts and returns whether they have been unmasked before
    fn int_save_disable() -> bool;

    /// Unmasks all interrupts if `enabled` is true
    fn int_restore(enabled: bool);

    /// Halts the core until the next interrupt arrives
    ///
    /// Interrupts that are pending but masked also wake the core up.
    fn wait_for_interrupt();

    /// The body of a busy-wait loop
    fn relax();
}

cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        #[path = "arm/cpu.rs"]
        mod cpu;
    }
    else {
        #[path = "host/cpu.rs"]
        mod cpu;
    }
}

pub use self::cpu::CPU;
