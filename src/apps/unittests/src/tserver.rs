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

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use base::errors::Code;
use base::kif::cmd::{Endpoint, LifecycleStatus, Opcode, CMD_MSG_LEN};
use base::kif::mboxmap::ChanPair;
use base::kif::Subsys;
use base::test::WvTester;
use base::time::{Clock, CycleDuration};
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use link::cmd::{Cmd, CmdHandler, CmdQueue};
use link::{Links, MboxLinkDev, MboxLinkPool, MAX_MBOX_LINKS};

use trch::boot::Boot;
use trch::server::{
    Endpoints, Server, LINK_PING_ARG, MAX_SERVER_LINKS, REPLY_FAILED, REPLY_INV_ARGS,
};

use crate::sim::{self, words, Peer, SimMbox};

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, ping);
    wv_run_test!(t, notifications);
    wv_run_test!(t, reset_hpps);
    wv_run_test!(t, invalid_commands);
    wv_run_test!(t, connect_invalid);
    wv_run_test!(t, link_lifecycle);
    wv_run_test!(t, link_ping_timeout);
    wv_run_test!(t, connect_limits);
}

fn handle(server: &mut Server<'_>, msg: &[u32]) -> Vec<u32> {
    let mut reply = [0u32; CMD_MSG_LEN];
    let len = wv_assert_ok!(server.handle(&Cmd::new(None, msg), &mut reply));
    reply[..len].to_vec()
}

fn connect_cmd(ep: Endpoint, chans: ChanPair) -> [u32; 4] {
    [
        u32::from(Opcode::MboxLinkConnect),
        u32::from(ep),
        chans.from,
        chans.to,
    ]
}

fn ping(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints::default());

    let reply = handle(&mut server, &[u32::from(Opcode::Ping), 1, 2, 3]);
    wv_assert_eq!(t, reply.len(), CMD_MSG_LEN);
    wv_assert_eq!(t, reply[..4], [u32::from(Opcode::Pong), 1, 2, 3]);
    wv_assert!(t, reply[4..].iter().all(|w| *w == 0));

    // the reply is limited by the buffer
    let mut small = [0u32; 2];
    let cmd = Cmd::new(None, &[u32::from(Opcode::Ping), 7, 8]);
    wv_assert_eq!(t, server.handle(&cmd, &mut small), Ok(2));
    wv_assert_eq!(t, small, [u32::from(Opcode::Pong), 7]);
}

fn notifications(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints::default());

    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::Nop)]), Vec::<u32>::new());
    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::Pong), 42]), Vec::<u32>::new());
    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::WatchdogTimeout), 2]), Vec::<u32>::new());

    let mut msg = vec![u32::from(Opcode::Lifecycle), u32::from(LifecycleStatus::Up)];
    msg.extend(words(b"HPPS up\0"));
    wv_assert_eq!(t, handle(&mut server, &msg), Vec::<u32>::new());
    // unknown status and garbage info
    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::Lifecycle), 7, 0xffff_ffff]), Vec::<u32>::new());

    wv_assert!(t, !boot.pending());
}

fn reset_hpps(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints::default());

    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::ResetHpps)]), vec![0]);
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS);
    // coalesced with the pending request
    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::ResetHpps)]), vec![0]);
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS);
}

fn invalid_commands(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints::default());

    let mut reply = [0u32; CMD_MSG_LEN];
    wv_assert_err!(t, server.handle(&Cmd::new(None, &[0x1234]), &mut reply), Code::InvCmd);
    wv_assert_err!(
        t,
        server.handle(&Cmd::new(None, &[u32::from(Opcode::Ping)]), &mut []),
        Code::NoSpace
    );
}

fn connect_invalid(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints {
        hpps: Some(mldev),
        rtps: None,
    });
    let chans = ChanPair { from: 10, to: 11 };

    // no mailbox for the RTPS, and no such endpoint
    let reply = handle(&mut server, &connect_cmd(Endpoint::Rtps, chans));
    wv_assert_eq!(t, reply, vec![REPLY_INV_ARGS]);
    let reply = handle(&mut server, &[u32::from(Opcode::MboxLinkConnect), 5, 10, 11]);
    wv_assert_eq!(t, reply, vec![REPLY_INV_ARGS]);

    // the channel cannot be claimed
    dev.break_chan(Some(11));
    let reply = handle(&mut server, &connect_cmd(Endpoint::Hpps, chans));
    wv_assert_eq!(t, reply, vec![REPLY_FAILED]);
    wv_assert_eq!(t, dev.claimed(), 0);
    wv_assert!(t, links.is_empty());
    wv_assert_eq!(t, server.conn(0), None);

    // invalid indices
    for op in [Opcode::MboxLinkDisconnect, Opcode::MboxLinkPing] {
        wv_assert_eq!(t, handle(&mut server, &[u32::from(op), 0]), vec![REPLY_INV_ARGS]);
        wv_assert_eq!(t, handle(&mut server, &[u32::from(op), 1000]), vec![REPLY_INV_ARGS]);
    }
}

fn link_lifecycle(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints {
        hpps: Some(mldev),
        rtps: None,
    });
    let chans = ChanPair { from: 10, to: 11 };
    let peer = Peer::new(&dev, &pool, &mldev, chans);

    let reply = handle(&mut server, &connect_cmd(Endpoint::Hpps, chans));
    wv_assert_eq!(t, reply, vec![0]);
    let id = wv_assert_some!(server.conn(0));
    wv_assert_eq!(t, links.name(id), Ok("HPPS_SERVER_MBOX_LINK"));
    wv_assert_eq!(t, dev.claimed(), 2);
    wv_assert_eq!(t, wv_assert_some!(dev.claim_of(chans.from)).owner, 0);

    // the TRCH is the client of the new link
    let (reply, req) = thread::scope(|s| {
        let p = s.spawn(|| peer.serve(|req| vec![u32::from(Opcode::Pong), req[1]]));
        let reply = handle(&mut server, &[u32::from(Opcode::MboxLinkPing), 0]);
        (reply, p.join().unwrap())
    });
    wv_assert_eq!(t, reply, vec![0]);
    wv_assert_eq!(t, req, Some(vec![u32::from(Opcode::Ping), LINK_PING_ARG]));

    // replies of the peer do not end up in the command queue
    wv_assert!(t, !cmdq.pending());

    let reply = handle(&mut server, &[u32::from(Opcode::MboxLinkDisconnect), 0]);
    wv_assert_eq!(t, reply, vec![0]);
    wv_assert_eq!(t, server.conn(0), None);
    wv_assert!(t, !links.contains(id));
    wv_assert_eq!(t, dev.claimed(), 0);

    let reply = handle(&mut server, &[u32::from(Opcode::MboxLinkDisconnect), 0]);
    wv_assert_eq!(t, reply, vec![REPLY_INV_ARGS]);
    let reply = handle(&mut server, &[u32::from(Opcode::MboxLinkPing), 0]);
    wv_assert_eq!(t, reply, vec![REPLY_INV_ARGS]);
}

fn link_ping_timeout(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints {
        hpps: Some(mldev),
        rtps: None,
    });
    let chans = ChanPair { from: 12, to: 13 };
    let peer = Peer::new(&dev, &pool, &mldev, chans);
    let done = AtomicBool::new(false);

    wv_assert_eq!(t, handle(&mut server, &connect_cmd(Endpoint::Hpps, chans)), vec![0]);

    // the peer takes the ping, but never answers; time passes until the TRCH gives up
    let reply = thread::scope(|s| {
        s.spawn(|| {
            peer.recv();
            while !done.load(Ordering::Acquire) {
                clock.tick(CycleDuration::new(100));
                thread::sleep(Duration::from_millis(1));
            }
        });
        let reply = handle(&mut server, &[u32::from(Opcode::MboxLinkPing), 0]);
        done.store(true, Ordering::Release);
        reply
    });
    wv_assert_eq!(t, reply, vec![REPLY_FAILED]);

    // the link survives the failure
    wv_assert!(t, server.conn(0).is_some());
    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::MboxLinkDisconnect), 0]), vec![0]);
}

fn connect_limits(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let boot = Boot::new();
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let links: Links<'_> = Links::new(&pool, &clock);
    let mut server = Server::new(&links, &boot, Endpoints {
        hpps: Some(mldev),
        rtps: None,
    });

    let limit = MAX_SERVER_LINKS.min(MAX_MBOX_LINKS) as u32;
    for i in 0..limit {
        let chans = ChanPair {
            from: i * 2,
            to: i * 2 + 1,
        };
        let reply = handle(&mut server, &connect_cmd(Endpoint::Hpps, chans));
        wv_assert_eq!(t, reply, vec![i]);
    }

    let chans = ChanPair { from: 30, to: 31 };
    let reply = handle(&mut server, &connect_cmd(Endpoint::Hpps, chans));
    wv_assert_eq!(t, reply, vec![REPLY_FAILED]);
    wv_assert_eq!(t, dev.claim_of(30), None);

    // freed slots are reused
    wv_assert_eq!(t, handle(&mut server, &[u32::from(Opcode::MboxLinkDisconnect), 3]), vec![0]);
    wv_assert_eq!(t, handle(&mut server, &connect_cmd(Endpoint::Hpps, chans)), vec![3]);
    wv_assert_eq!(t, dev.claimed(), limit as usize * 2);
}
