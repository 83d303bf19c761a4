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

//! The build configuration of the TRCH firmware

use base::time::CycleDuration;

use bitflags::bitflags;

bitflags! {
    /// The links that are connected at startup
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct LinkSet : u32 {
        /// Server link for the secure software of the HPPS
        const HPPS_MBOX_SSW     = 1 << 0;
        /// Server link for applications on the HPPS
        const HPPS_MBOX         = 1 << 1;
        /// Server link for the trusted firmware of the HPPS
        const HPPS_MBOX_ATF     = 1 << 2;
        const HPPS_SHMEM        = 1 << 3;
        const HPPS_SHMEM_SSW    = 1 << 4;
        /// Server links for the R52 cluster (one per logical subsystem)
        const RTPS_MBOX         = 1 << 5;
        /// Server link for the PSCI implementation on the A53
        const RTPS_MBOX_PSCI    = 1 << 6;
        const RTPS_SHMEM        = 1 << 7;
    }
}

/// The interval of the system tick
pub const SYSTICK_INTERVAL_MS: u32 = 500;
/// The frequency of the clock that drives the system tick
pub const SYSTICK_CLK_HZ: u32 = 100_000_000;
/// The number of main loop iterations without log output
pub const MAIN_LOOP_SILENT_ITERS: u32 = 16;

/// The configuration of the firmware
#[derive(Clone, Debug)]
pub struct Config {
    pub systick_clk_hz: u32,
    pub systick_interval_ms: u32,
    pub main_loop_silent_iters: u32,
    /// Watchdog of the TRCH itself, kicked by the system tick
    pub trch_wdt: bool,
    pub rtps_r52_wdt: bool,
    pub rtps_a53_wdt: bool,
    pub hpps_wdt: bool,
    pub links: LinkSet,
}

impl Config {
    /// Returns the system tick interval in cycles of the system tick clock
    pub fn systick_interval(&self) -> CycleDuration {
        CycleDuration::new(self.systick_interval_ms as u64 * (self.systick_clk_hz / 1000) as u64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            systick_clk_hz: SYSTICK_CLK_HZ,
            systick_interval_ms: SYSTICK_INTERVAL_MS,
            main_loop_silent_iters: MAIN_LOOP_SILENT_ITERS,
            trch_wdt: true,
            rtps_r52_wdt: true,
            rtps_a53_wdt: true,
            hpps_wdt: true,
            links: LinkSet::HPPS_MBOX_SSW
                | LinkSet::HPPS_MBOX
                | LinkSet::HPPS_MBOX_ATF
                | LinkSet::RTPS_MBOX
                | LinkSet::RTPS_MBOX_PSCI,
        }
    }
}
