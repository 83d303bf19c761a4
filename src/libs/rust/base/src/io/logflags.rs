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

use core::str;

bitflags! {
    /// All log flags used by the TRCH firmware and its libraries
    ///
    /// Logging is controlled at runtime: the flags passed to [`init`](crate::io::init) select the
    /// enabled messages and can be changed later via [`set_flags`](crate::io::log::set_flags). Any
    /// component can then use the `log` macro to log something. The available flags are kept here.
    ///
    /// There are three general flags: `Info`, `Debug`, and `Error`. Info and Error are enabled by
    /// default. Additionally, there are per-component flags such as `LibMbox` or `TrchBoot` that
    /// control the logging of certain aspects within a specific component.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct LogFlags : u64 {
        /// General: informational output (enabled by default)
        const Info          = 1 << 0;
        /// General: debugging output (disable by default)
        const Debug         = 1 << 1;
        /// General: error output (enabled by default)
        const Error         = 1 << 2;

        /// libraries: link connect/disconnect and requests
        const LibLink       = 1 << 8;
        /// libraries: mailbox link interrupts and transfers
        const LibMbox       = 1 << 9;
        /// libraries: shared-memory link transfers
        const LibShmem      = 1 << 10;
        /// libraries: command queue and dispatch
        const LibCmd        = 1 << 11;
        /// libraries: event loop dispatch
        const LibEvent      = 1 << 12;
        /// libraries: software timers
        const LibTimer      = 1 << 13;

        /// TRCH: main loop
        const TrchMain      = 1 << 24;
        /// TRCH: reboot requests, blob loading, and reset sequences
        const TrchBoot      = 1 << 25;
        /// TRCH: command server
        const TrchServ      = 1 << 26;
        /// TRCH: link topology
        const TrchLinks     = 1 << 27;
        /// TRCH: system boot configuration
        const TrchSysCfg    = 1 << 28;
    }
}

impl Default for LogFlags {
    fn default() -> Self {
        Self::Info | Self::Error
    }
}

impl str::FromStr for LogFlags {
    type Err = bitflags::parser::ParseError;

    fn from_str(flags: &str) -> Result<Self, Self::Err> {
        Ok(Self(flags.parse()?))
    }
}
