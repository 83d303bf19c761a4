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

//! The chip interface: definitions shared between the TRCH and the other subsystems
//!
//! The values in here are a binary contract with the software running on the other subsystems and
//! must not be changed independently.

pub mod cmd;
pub mod mboxmap;
mod subsys;

pub use self::subsys::{owner, Comp, CpuGroup, Subsys, SwComp, SwSubsys, NUM_SUBSYSS};
