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

//! The hardware blocks the TRCH drives during boot and reset
//!
//! The register-level drivers are not part of this crate; the firmware reaches them through the
//! traits below, which also allows to run the boot sequences against simulated hardware.

use base::errors::Error;
use base::kif::{Comp, CpuGroup};

/// The hardware mode of the R52 cluster
///
/// The SMP topology runs the cluster in split mode and lets the software bring up the second core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum R52Mode {
    Split,
    Lockstep,
}

/// The reset controller
pub trait ResetCtl {
    /// Puts the given CPUs into reset
    fn assert(&mut self, cpus: Comp) -> Result<(), Error>;

    /// Takes the given CPUs out of reset
    fn release(&mut self, cpus: Comp) -> Result<(), Error>;

    /// Sets the mode of the R52 cluster; only allowed while both cores are in reset
    fn set_rtps_r52_mode(&mut self, mode: R52Mode) -> Result<(), Error>;
}

/// The watchdog timers of all CPUs
pub trait Watchdogs {
    /// Prepares the watchdogs of the given CPU group (e.g., routes their interrupts)
    fn init_group(&mut self, group: CpuGroup) -> Result<(), Error>;

    fn start(&mut self, cpus: Comp) -> Result<(), Error>;

    fn stop(&mut self, cpus: Comp) -> Result<(), Error>;
}

/// Restarts the countdown of watchdogs
///
/// Kicking is a single register write, which is done from the system tick interrupt while the
/// main loop might use [`Watchdogs`] at the same time.
pub trait WdtKick: Sync {
    fn kick(&self, cpus: Comp);
}

/// Reset controller and watchdogs
pub trait Hw: ResetCtl + Watchdogs {}

impl<T: ResetCtl + Watchdogs> Hw for T {}

/// A store of binary images (the simple file system in non-volatile memory)
pub trait BlobStore {
    /// Loads the image `name` to its load address
    ///
    /// Fails with `NoSuchFile` if there is no such image.
    fn load(&mut self, name: &str) -> Result<(), Error>;
}
