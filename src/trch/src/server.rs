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

//! The command server of the TRCH
//!
//! Serves the commands the other subsystems send over their server links. Besides simple requests
//! like ping and reboot, the server can connect additional mailbox links on behalf of a
//! subsystem, over which the TRCH then acts as the client.

use core::cmp;
use core::str;

use base::errors::{Code, Error};
use base::kif::cmd::{
    Endpoint, LifecycleStatus, Opcode, CMD_MSG_LEN, CMD_TIMEOUT_MS_RECV, CMD_TIMEOUT_MS_SEND,
};
use base::kif::mboxmap::ChanPair;
use base::kif::{owner, Subsys, SwComp, SwSubsys};

use link::cmd::{words_to_bytes, Cmd, CmdHandler};
use link::{Link, LinkId, Links, MboxLinkDev, MboxLinkParams, Role};

use crate::boot::Boot;

/// The number of mailbox links the server can connect on behalf of others
pub const MAX_SERVER_LINKS: usize = 8;

/// Reply for an invalid endpoint or link index
pub const REPLY_INV_ARGS: u32 = -1i32 as u32;
/// Reply for a failed connect or ping
pub const REPLY_FAILED: u32 = -2i32 as u32;

/// The argument of the ping sent by `MboxLinkPing`
pub const LINK_PING_ARG: u32 = 43;

/// The mailbox blocks that links can be connected on
#[derive(Copy, Clone, Default)]
pub struct Endpoints<'a> {
    pub hpps: Option<MboxLinkDev<'a>>,
    pub rtps: Option<MboxLinkDev<'a>>,
}

impl<'a> Endpoints<'a> {
    fn get(&self, ep: Endpoint) -> Option<(&'static str, MboxLinkDev<'a>)> {
        match ep {
            Endpoint::Hpps => self.hpps.map(|d| ("HPPS_SERVER_MBOX_LINK", d)),
            Endpoint::Rtps => self.rtps.map(|d| ("RTPS_SERVER_MBOX_LINK", d)),
        }
    }
}

pub struct Server<'a> {
    links: &'a Links<'a>,
    boot: &'a Boot,
    endpoints: Endpoints<'a>,
    conns: [Option<LinkId>; MAX_SERVER_LINKS],
}

impl<'a> Server<'a> {
    pub fn new(links: &'a Links<'a>, boot: &'a Boot, endpoints: Endpoints<'a>) -> Self {
        Self {
            links,
            boot,
            endpoints,
            conns: [None; MAX_SERVER_LINKS],
        }
    }

    /// Returns the link connected under index `idx`
    pub fn conn(&self, idx: usize) -> Option<LinkId> {
        self.conns.get(idx).copied().flatten()
    }

    fn ping(cmd: &Cmd, reply: &mut [u32]) -> usize {
        tlog!(TrchServ, "server: PING {:x?}", &cmd.msg[1..4]);
        let len = cmp::min(CMD_MSG_LEN, reply.len());
        reply[0] = Opcode::Pong.into();
        reply[1..len].copy_from_slice(&cmd.msg[1..len]);
        len
    }

    fn lifecycle(cmd: &Cmd) {
        let status = match LifecycleStatus::try_from(cmd.arg(0)) {
            Ok(LifecycleStatus::Up) => "UP",
            Ok(LifecycleStatus::Down) => "DOWN",
            Err(_) => "?",
        };

        let mut bytes = [0u8; (CMD_MSG_LEN - 2) * 4];
        words_to_bytes(&cmd.msg[2..], &mut bytes);
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        let info = str::from_utf8(&bytes[..end]).unwrap_or("?");
        tlog!(Info, "server: LIFECYCLE status={} info='{}'", status, info);
    }

    fn connect(&mut self, cmd: &Cmd) -> u32 {
        let (name, dev) = match Endpoint::try_from(cmd.arg(0))
            .ok()
            .and_then(|ep| self.endpoints.get(ep))
        {
            Some(ep) => ep,
            None => {
                tlog!(Error, "server: invalid endpoint {}", cmd.arg(0));
                return REPLY_INV_ARGS;
            },
        };

        let idx = match self.conns.iter().position(|c| c.is_none()) {
            Some(idx) => idx,
            None => {
                tlog!(Error, "server: no free connection slot");
                return REPLY_FAILED;
            },
        };

        let params = MboxLinkParams {
            name,
            chans: ChanPair {
                from: cmd.arg(1),
                to: cmd.arg(2),
            },
            role: Role::Client,
            server: 0,
            client: owner(SwSubsys::Trch, SwComp::Ssw),
        };
        match self.links.connect_mbox(dev, &params) {
            Ok(id) => {
                tlog!(TrchServ, "server: connected {} as {}", name, idx);
                self.conns[idx] = Some(id);
                idx as u32
            },
            Err(e) => {
                tlog!(Error, "server: connecting {} failed: {}", name, e);
                REPLY_FAILED
            },
        }
    }

    fn disconnect(&mut self, idx: u32) -> u32 {
        let id = match self.conns.get_mut(idx as usize).and_then(|c| c.take()) {
            Some(id) => id,
            None => {
                tlog!(Error, "server: invalid link index {}", idx);
                return REPLY_INV_ARGS;
            },
        };

        match self.links.disconnect(id) {
            Ok(_) => 0,
            Err(e) => {
                tlog!(Error, "server: disconnecting link {} failed: {}", idx, e);
                REPLY_FAILED
            },
        }
    }

    fn link_ping(&self, idx: u32) -> u32 {
        let id = match self.conn(idx as usize) {
            Some(id) => id,
            None => {
                tlog!(Error, "server: invalid link index {}", idx);
                return REPLY_INV_ARGS;
            },
        };

        let mut req = [0u8; 8];
        words_to_bytes(&[Opcode::Ping.into(), LINK_PING_ARG], &mut req);
        let mut resp = [0u8; 8];
        let res = self.links.with(id, |l| {
            l.request(
                Some(CMD_TIMEOUT_MS_SEND),
                &req,
                Some(CMD_TIMEOUT_MS_RECV),
                &mut resp,
            )
        });
        match res {
            Ok(Ok(len)) => {
                tlog!(TrchServ, "server: ping over link {}: {:x?}", idx, &resp[..len]);
                0
            },
            Ok(Err(e)) | Err(e) => {
                tlog!(Error, "server: ping over link {} failed: {}", idx, e);
                REPLY_FAILED
            },
        }
    }
}

impl CmdHandler for Server<'_> {
    fn handle(&mut self, cmd: &Cmd, reply: &mut [u32]) -> Result<usize, Error> {
        let op = cmd.opcode().map_err(|e| {
            tlog!(Error, "server: unknown command {:#x}", cmd.msg[0]);
            e
        })?;
        if reply.is_empty() {
            return Err(Error::new(Code::NoSpace));
        }

        match op {
            Opcode::Nop => Ok(0),

            Opcode::Ping => Ok(Self::ping(cmd, reply)),

            Opcode::Pong => {
                tlog!(TrchServ, "server: PONG {:x?}", &cmd.msg[1..4]);
                Ok(0)
            },

            Opcode::WatchdogTimeout => {
                tlog!(Info, "server: WATCHDOG_TIMEOUT cpu={}", cmd.arg(0));
                Ok(0)
            },

            Opcode::Lifecycle => {
                Self::lifecycle(cmd);
                Ok(0)
            },

            Opcode::ResetHpps => {
                tlog!(TrchServ, "server: RESET_HPPS");
                self.boot.request(Subsys::HPPS);
                reply[0] = 0;
                Ok(1)
            },

            Opcode::MboxLinkConnect => {
                tlog!(
                    TrchServ,
                    "server: MBOX_LINK_CONNECT endpoint={} from={} to={}",
                    cmd.arg(0),
                    cmd.arg(1),
                    cmd.arg(2)
                );
                reply[0] = self.connect(cmd);
                Ok(1)
            },

            Opcode::MboxLinkDisconnect => {
                tlog!(TrchServ, "server: MBOX_LINK_DISCONNECT index={}", cmd.arg(0));
                reply[0] = self.disconnect(cmd.arg(0));
                Ok(1)
            },

            Opcode::MboxLinkPing => {
                tlog!(TrchServ, "server: MBOX_LINK_PING index={}", cmd.arg(0));
                reply[0] = self.link_ping(cmd.arg(0));
                Ok(1)
            },
        }
    }
}
