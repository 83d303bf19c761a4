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

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The number of subsystems on the chip
pub const NUM_SUBSYSS: usize = 4;

bitflags! {
    /// The processing subsystems on the chip
    ///
    /// Each subsystem can be booted and reset independently. The flags are used both for single
    /// subsystems and for sets of them (e.g., the pending reboot requests).
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Subsys : u32 {
        /// The trusted control processor itself
        const TRCH          = 0x1;
        /// The real-time subsystem's R52 cluster
        const RTPS_R52      = 0x2;
        /// The real-time subsystem's A53 core
        const RTPS_A53      = 0x4;
        /// The high-performance application subsystem
        const HPPS          = 0x8;
    }
}

impl Subsys {
    /// Returns the name of the subsystem, or "?" if `self` is not exactly one subsystem
    pub fn name(self) -> &'static str {
        match self {
            Self::TRCH => "TRCH",
            Self::RTPS_R52 => "RTPS_R52",
            Self::RTPS_A53 => "RTPS_A53",
            Self::HPPS => "HPPS",
            _ => "?",
        }
    }
}

bitflags! {
    /// The CPUs on the chip, as used for reset control and watchdogs
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Comp : u32 {
        const TRCH          = 0x0001;
        const RTPS_R52_0    = 0x0002;
        const RTPS_R52_1    = 0x0004;
        const RTPS_A53_0    = 0x0008;
        const HPPS_0        = 0x0010;
        const HPPS_1        = 0x0020;
        const HPPS_2        = 0x0040;
        const HPPS_3        = 0x0080;
        const HPPS_4        = 0x0100;
        const HPPS_5        = 0x0200;
        const HPPS_6        = 0x0400;
        const HPPS_7        = 0x0800;

        const RTPS_R52      = Self::RTPS_R52_0.bits() | Self::RTPS_R52_1.bits();
        const RTPS_A53      = Self::RTPS_A53_0.bits();
        const RTPS          = Self::RTPS_R52.bits() | Self::RTPS_A53.bits();
        const HPPS_CL0      = Self::HPPS_0.bits() | Self::HPPS_1.bits()
                            | Self::HPPS_2.bits() | Self::HPPS_3.bits();
        const HPPS_CL1      = Self::HPPS_4.bits() | Self::HPPS_5.bits()
                            | Self::HPPS_6.bits() | Self::HPPS_7.bits();
        const HPPS          = Self::HPPS_CL0.bits() | Self::HPPS_CL1.bits();
    }
}

/// A group of CPUs that share a watchdog configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum CpuGroup {
    Trch,
    RtpsR52,
    RtpsR52_0,
    RtpsR52_1,
    RtpsA53,
    Hpps,
}

impl CpuGroup {
    /// Returns the subsystem the group belongs to
    pub fn subsys(self) -> Subsys {
        match self {
            Self::Trch => Subsys::TRCH,
            Self::RtpsR52 | Self::RtpsR52_0 | Self::RtpsR52_1 => Subsys::RTPS_R52,
            Self::RtpsA53 => Subsys::RTPS_A53,
            Self::Hpps => Subsys::HPPS,
        }
    }

    /// Returns the CPUs in the group
    pub fn cpus(self) -> Comp {
        match self {
            Self::Trch => Comp::TRCH,
            Self::RtpsR52 => Comp::RTPS_R52,
            Self::RtpsR52_0 => Comp::RTPS_R52_0,
            Self::RtpsR52_1 => Comp::RTPS_R52_1,
            Self::RtpsA53 => Comp::RTPS_A53,
            Self::Hpps => Comp::HPPS,
        }
    }

    /// Returns the number of cores in the group
    pub fn num_cores(self) -> u32 {
        self.cpus().bits().count_ones()
    }
}

/// A logical subsystem, i.e., a grouping of CPUs that runs one software stack
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum SwSubsys {
    Trch = 1,
    RtpsR52Lockstep,
    RtpsR52Smp,
    RtpsR52Split0,
    RtpsR52Split1,
    RtpsA53,
    HppsSmp,
    HppsSmpCl0,
    HppsSmpCl1,
}

/// A software component that runs on a logical subsystem
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum SwComp {
    Ssw = 1,
    Atf,
    App,
}

/// Returns the owner id of the given component on the given logical subsystem
///
/// Owner ids identify the entity that a hardware resource (e.g., a mailbox channel) is allocated
/// to.
pub fn owner(subsys: SwSubsys, comp: SwComp) -> u32 {
    (u32::from(subsys) << 8) | u32::from(comp)
}
