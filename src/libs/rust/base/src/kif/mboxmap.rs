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

//! Chiplet-wide allocation of the mailbox channels and interrupts
//!
//! The allocation exists in the code bases of all subsystems and has to be kept in sync. Each
//! interrupt is dedicated to one subsystem; the interrupt index is the index within the mailbox IP
//! block, not the global IRQ number. Allocations may overlap for subsystems that cannot run
//! concurrently (e.g., the R52 cluster in lockstep and in split mode).

/// The channels of one link between a peer and the TRCH
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChanPair {
    /// The channel the peer sends requests on (incoming at the TRCH)
    pub from: u32,
    /// The channel the TRCH replies on (outgoing at the TRCH)
    pub to: u32,
}

impl ChanPair {
    const fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }
}

/// The mailbox IP block in the low-speed I/O region (shared with the RTPS)
pub mod lsio {
    use super::ChanPair;

    pub const INT_EVT0_TRCH_SSW: u32 = 0;
    pub const INT_EVT1_TRCH_SSW: u32 = 1;

    pub const INT_EVT0_RTPS_R52_LOCKSTEP_SSW: u32 = 2;
    pub const INT_EVT1_RTPS_R52_LOCKSTEP_SSW: u32 = 3;
    pub const INT_EVT0_RTPS_R52_SPLIT_0_SSW: u32 = 2;
    pub const INT_EVT1_RTPS_R52_SPLIT_0_SSW: u32 = 3;
    pub const INT_EVT0_RTPS_R52_SPLIT_1_SSW: u32 = 4;
    pub const INT_EVT1_RTPS_R52_SPLIT_1_SSW: u32 = 5;
    pub const INT_EVT0_RTPS_R52_SMP_SSW: u32 = 2;
    pub const INT_EVT1_RTPS_R52_SMP_SSW: u32 = 3;
    pub const INT_EVT0_RTPS_A53_ATF: u32 = 6;
    pub const INT_EVT1_RTPS_A53_ATF: u32 = 7;

    pub const CHAN_RTPS_R52_LOCKSTEP_SSW: ChanPair = ChanPair::new(0, 1);
    pub const CHAN_RTPS_R52_SPLIT_0_SSW: ChanPair = ChanPair::new(0, 1);
    pub const CHAN_RTPS_R52_SPLIT_1_SSW: ChanPair = ChanPair::new(2, 3);
    pub const CHAN_RTPS_R52_SMP_SSW: ChanPair = ChanPair::new(0, 1);
    pub const CHAN_RTPS_A53_ATF: ChanPair = ChanPair::new(4, 5);

    /// The channel the R52 software uses to talk to itself
    pub const CHAN_RTPS_R52_LOOPBACK_SSW: u32 = 31;
}

/// The first mailbox IP block in the HPPS region
pub mod hpps {
    use super::ChanPair;

    pub const INT_EVT0_TRCH_SSW: u32 = 0;
    pub const INT_EVT1_TRCH_SSW: u32 = 1;
    pub const INT_EVT0_HPPS_SMP_SSW: u32 = 2;
    pub const INT_EVT1_HPPS_SMP_SSW: u32 = 3;

    pub const CHAN_HPPS_SMP_APP: ChanPair = ChanPair::new(0, 1);
    /// Owned by the HPPS application instead of the TRCH (test only)
    pub const CHAN_HPPS_SMP_APP_OWN: ChanPair = ChanPair::new(2, 3);
    pub const CHAN_HPPS_SMP_ATF: ChanPair = ChanPair::new(28, 29);
    pub const CHAN_HPPS_SMP_SSW: ChanPair = ChanPair::new(30, 31);
}

/// The number of channels per mailbox IP block
pub const MBOX_CHANS: u32 = 32;
