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

//! The foundation library shared by all TRCH crates.
//!
//! It contains the error types, the logger, fixed-capacity collections, the cycle clock, the CPU
//! hooks, the chip interface definitions (`kif`) and the test utilities.

#![no_std]

#[macro_use]
pub mod io;

mod arch;

pub mod col;
pub mod cpu;
pub mod errors;
pub mod kif;
pub mod smp;
pub mod test;
pub mod time;

pub use spin;
