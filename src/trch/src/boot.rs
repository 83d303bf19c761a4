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

//! The boot and reset orchestration of the subsystems
//!
//! Reboot requests are collected as a set of subsystems: requesting a subsystem that is already
//! pending has no effect. The main loop takes the requests one by one, lowest subsystem first,
//! and reboots the subsystem by loading its images (if configured) and running its reset recipe.

use core::sync::atomic::{AtomicU32, Ordering};

use base::errors::{Code, Error};
use base::kif::{Comp, CpuGroup, Subsys, NUM_SUBSYSS};

use crate::config::Config;
use crate::hw::{BlobStore, Hw, R52Mode};
use crate::syscfg::{RtpsMode, SysCfg};

/// The pending reboot requests
///
/// Requests can be made from interrupt context (e.g., by a command handler or a watchdog
/// interrupt); only the main loop handles them.
pub struct Boot {
    requests: AtomicU32,
}

impl Boot {
    /// Creates an orchestrator without pending requests
    pub const fn new() -> Self {
        Self {
            requests: AtomicU32::new(0),
        }
    }

    /// Requests a reboot of all subsystems in `subsys`
    pub fn request(&self, subsys: Subsys) {
        tlog!(TrchBoot, "boot: accepted reboot request for {:?}", subsys);
        self.requests.fetch_or(subsys.bits(), Ordering::AcqRel);
    }

    /// Returns true if there are pending requests
    pub fn pending(&self) -> bool {
        self.requests.load(Ordering::Acquire) != 0
    }

    /// Returns the set of pending requests
    pub fn pending_set(&self) -> Subsys {
        Subsys::from_bits_truncate(self.requests.load(Ordering::Acquire))
    }

    /// Returns the lowest subsystem with a pending request
    ///
    /// The request stays pending until [`reboot`](Boot::reboot) has been called for it.
    pub fn handle(&self) -> Option<Subsys> {
        let reqs = self.requests.load(Ordering::Acquire);
        (0..NUM_SUBSYSS)
            .map(|b| 1u32 << b)
            .find(|bit| reqs & bit != 0)
            .map(Subsys::from_bits_truncate)
    }

    /// Reboots `subsys`, which has to be exactly one subsystem
    ///
    /// If the configuration asks for it and `fs` is available, the images of the subsystem are
    /// loaded first. The first image that fails to load ends the load phase, but the subsystem is
    /// reset nonetheless. Afterwards, the request for `subsys` is no longer pending, even if the
    /// reboot failed. If both phases failed, the error of the load phase is returned.
    pub fn reboot(
        &self,
        subsys: Subsys,
        cfg: &Config,
        syscfg: &SysCfg,
        fs: Option<&mut dyn BlobStore>,
        hw: &mut dyn Hw,
    ) -> Result<(), Error> {
        if subsys.bits().count_ones() != 1 {
            tlog!(Error, "boot: cannot reboot {:?}: not a single subsystem", subsys);
            return Err(Error::new(Code::InvArgs));
        }

        tlog!(TrchBoot, "boot: rebooting {}...", subsys.name());

        let load = match (syscfg.load_binaries, fs) {
            (true, Some(fs)) => Self::load(subsys, syscfg, fs),
            (true, None) => {
                tlog!(TrchBoot, "boot: not loading images: no file system");
                Ok(())
            },
            (false, _) => {
                tlog!(TrchBoot, "boot: not loading images: configured as preloaded");
                Ok(())
            },
        };

        let reset = Self::reset(subsys, cfg, syscfg, hw);

        self.requests.fetch_and(!subsys.bits(), Ordering::AcqRel);

        let res = load.and(reset);
        match res {
            Ok(_) => tlog!(TrchBoot, "boot: rebooted {}", subsys.name()),
            Err(e) => tlog!(Error, "boot: rebooting {} failed: {}", subsys.name(), e),
        }
        res
    }

    fn load(subsys: Subsys, syscfg: &SysCfg, fs: &mut dyn BlobStore) -> Result<(), Error> {
        let blobs = syscfg.blobs(subsys).ok_or_else(|| {
            tlog!(Error, "boot: no images for {}", subsys.name());
            Error::new(Code::InvArgs)
        })?;

        tlog!(
            TrchBoot,
            "boot: loading {} images for {}",
            blobs.len(),
            subsys.name()
        );
        for name in blobs.iter() {
            if let Err(e) = fs.load(name) {
                tlog!(Error, "boot: loading {} failed: {}", name, e);
                return Err(Error::new(Code::LoadFailed));
            }
            tlog!(TrchBoot, "boot: loaded {}", name);
        }
        Ok(())
    }

    fn reset(subsys: Subsys, cfg: &Config, syscfg: &SysCfg, hw: &mut dyn Hw) -> Result<(), Error> {
        let cpus = match subsys {
            Subsys::RTPS_R52 => Comp::RTPS_R52,
            Subsys::RTPS_A53 => Comp::RTPS_A53,
            Subsys::HPPS => Comp::HPPS,
            _ => {
                tlog!(Error, "boot: cannot reset {}", subsys.name());
                return Err(Error::new(Code::InvArgs));
            },
        };

        // the subsystem might still be running
        let res = hw.assert(cpus).and_then(|_| match subsys {
            Subsys::RTPS_R52 => Self::reset_rtps_r52(cfg, syscfg, hw),
            Subsys::RTPS_A53 => {
                Self::release(hw, cfg.rtps_a53_wdt, CpuGroup::RtpsA53, Comp::RTPS_A53)
            },
            _ => Self::release(hw, cfg.hpps_wdt, CpuGroup::Hpps, Comp::HPPS_0),
        });

        res.map_err(|e| {
            tlog!(Error, "boot: resetting {} failed: {}", subsys.name(), e);
            Error::new(Code::ResetFailed)
        })
    }

    fn reset_rtps_r52(cfg: &Config, syscfg: &SysCfg, hw: &mut dyn Hw) -> Result<(), Error> {
        tlog!(
            TrchBoot,
            "boot: releasing R52 cluster in {:?} mode",
            syscfg.rtps_mode
        );
        match syscfg.rtps_mode {
            RtpsMode::Lockstep => {
                if cfg.rtps_r52_wdt {
                    hw.init_group(CpuGroup::RtpsR52_0)?;
                }
                hw.set_rtps_r52_mode(R52Mode::Lockstep)?;
                hw.release(Comp::RTPS_R52_0)
            },

            RtpsMode::Smp => {
                if cfg.rtps_r52_wdt {
                    hw.init_group(CpuGroup::RtpsR52)?;
                }
                // the software on core 0 brings up core 1
                hw.set_rtps_r52_mode(R52Mode::Split)?;
                hw.release(Comp::RTPS_R52_0)
            },

            RtpsMode::Split => {
                hw.set_rtps_r52_mode(R52Mode::Split)?;
                let cores = [
                    (CpuGroup::RtpsR52_0, Comp::RTPS_R52_0),
                    (CpuGroup::RtpsR52_1, Comp::RTPS_R52_1),
                ];
                for (i, (group, cpu)) in cores.into_iter().enumerate() {
                    if syscfg.rtps_cores & (1 << i) != 0 {
                        Self::release(hw, cfg.rtps_r52_wdt, group, cpu)?;
                    }
                }
                Ok(())
            },
        }
    }

    fn release(hw: &mut dyn Hw, wdt: bool, group: CpuGroup, cpus: Comp) -> Result<(), Error> {
        if wdt {
            hw.init_group(group)?;
        }
        hw.release(cpus)
    }
}

impl Default for Boot {
    fn default() -> Self {
        Self::new()
    }
}
