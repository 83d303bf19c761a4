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

//! The firmware core of the TRCH, the trusted control processor of the HPSC chiplet
//!
//! The TRCH boots and resets the other subsystems (RTPS R52, RTPS A53 and HPPS) according to the
//! system boot configuration and serves the commands these subsystems send over their links. All
//! state of the firmware is bundled in [`workloop::Trch`], which runs the main loop.

#![no_std]

#[macro_use]
pub mod log;

pub mod boot;
pub mod config;
pub mod hw;
pub mod links;
pub mod server;
pub mod syscfg;
pub mod systick;
pub mod workloop;

pub use base;
