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

//! The command protocol spoken over links

use num_enum::{IntoPrimitive, TryFromPrimitive};
use static_assertions::const_assert_eq;

/// The size of a mailbox message in bytes
pub const MBOX_MSG_SIZE: usize = 64;

/// The number of words in a command message
pub const CMD_MSG_LEN: usize = 16;

const_assert_eq!(CMD_MSG_LEN * 4, MBOX_MSG_SIZE);

/// The maximum time to wait until a sent command has been acknowledged
pub const CMD_TIMEOUT_MS_SEND: u32 = 1000;
/// The maximum time to wait for the reply to a command
pub const CMD_TIMEOUT_MS_RECV: u32 = 1000;
/// The maximum time to wait until a reply has been acknowledged
pub const CMD_TIMEOUT_MS_REPLY: u32 = 1000;

/// The opcodes of commands, stored in the first word of the message
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Opcode {
    /// Does nothing and is not replied to
    Nop = 0,
    /// Replied with a `Pong` that echoes the arguments
    Ping,
    Pong,
    /// A watchdog of the CPU in word 1 expired
    WatchdogTimeout,
    /// A subsystem went up (word 1 = 0) or down (word 1 = 1); words 2.. contain an info string
    Lifecycle,
    /// Requests a reboot of the HPPS
    ResetHpps,
    /// Connects a mailbox link to the endpoint in word 1 (see [`Endpoint`]) with the incoming
    /// channel in word 2 and the outgoing channel in word 3
    MboxLinkConnect,
    /// Disconnects the mailbox link with the index in word 1
    MboxLinkDisconnect,
    /// Sends a `Ping` over the mailbox link with the index in word 1
    MboxLinkPing,
}

/// The status reported by a `Lifecycle` command
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum LifecycleStatus {
    Up = 0,
    Down,
}

/// The mailbox endpoints a link can be connected to via `MboxLinkConnect`
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Endpoint {
    Hpps = 0,
    Rtps,
}
