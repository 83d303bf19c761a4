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

use std::thread;

use base::errors::Code;
use base::kif::cmd::{Opcode, MBOX_MSG_SIZE};
use base::kif::mboxmap::ChanPair;
use base::kif::{owner, SwComp, SwSubsys};
use base::test::WvTester;
use base::time::Clock;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use link::cmd::CmdQueue;
use link::{
    Link, MboxClaim, MboxDir, MboxLinkDev, MboxLinkParams, MboxLinkPool, Role, MAX_MBOX_LINKS,
};

use crate::sim::{self, bytes, full_msg, words, Peer, SimMbox};

const RCV_INT: u32 = 0;
const ACK_INT: u32 = 1;
const CHANS: ChanPair = ChanPair { from: 4, to: 5 };

fn params(role: Role, chans: ChanPair) -> MboxLinkParams {
    MboxLinkParams {
        name: "TEST_MBOX_LINK",
        chans,
        role,
        server: owner(SwSubsys::Trch, SwComp::Ssw),
        client: owner(SwSubsys::HppsSmp, SwComp::App),
    }
}

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, connect_claims);
    wv_run_test!(t, connect_rollback);
    wv_run_test!(t, pool_exhaustion);
    wv_run_test!(t, send_and_ack);
    wv_run_test!(t, send_limits);
    wv_run_test!(t, request_reply);
    wv_run_test!(t, request_timeouts);
    wv_run_test!(t, request_busy);
    wv_run_test!(t, late_reply);
    wv_run_test!(t, server_commands);
}

fn connect_claims(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let p = params(Role::Client, CHANS);

    let link = wv_assert_ok!(pool.connect(mldev, &clock, &p, None));
    wv_assert_eq!(t, link.name(), "TEST_MBOX_LINK");
    wv_assert_eq!(t, link.chans(), CHANS);
    wv_assert_eq!(t, pool.used(), 1);

    wv_assert_eq!(t, dev.claim_of(CHANS.from), Some(MboxClaim {
        owner: p.server,
        src: p.client,
        dest: p.server,
        dir: MboxDir::Incoming,
    }));
    wv_assert_eq!(t, dev.claim_of(CHANS.to), Some(MboxClaim {
        owner: p.server,
        src: p.server,
        dest: p.client,
        dir: MboxDir::Outgoing,
    }));

    // mailbox links receive via interrupts only
    let mut buf = [0u8; MBOX_MSG_SIZE];
    wv_assert_err!(t, link.recv(&mut buf), Code::NotSup);

    wv_assert_eq!(t, link.disconnect(), Ok(()));
    wv_assert_eq!(t, dev.claimed(), 0);
    wv_assert_eq!(t, pool.used(), 0);
}

fn connect_rollback(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let p = params(Role::Client, CHANS);

    // the outgoing channel fails: the incoming one has to be released again
    dev.break_chan(Some(CHANS.to));
    wv_assert_err!(t, pool.connect(mldev, &clock, &p, None), Code::MboxClaimFailed);
    wv_assert_eq!(t, dev.claimed(), 0);
    wv_assert_eq!(t, pool.used(), 0);

    dev.break_chan(Some(CHANS.from));
    wv_assert_err!(t, pool.connect(mldev, &clock, &p, None), Code::MboxClaimFailed);
    wv_assert_eq!(t, dev.claimed(), 0);
    wv_assert_eq!(t, pool.used(), 0);

    dev.break_chan(None);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &p, None));
    wv_assert_eq!(t, dev.claimed(), 2);

    // a second link on the same channels fails
    wv_assert_err!(t, pool.connect(mldev, &clock, &p, None), Code::MboxClaimFailed);
    wv_assert_eq!(t, dev.claimed(), 2);
    wv_assert_eq!(t, pool.used(), 1);
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn pool_exhaustion(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);

    let mut links = Vec::new();
    for i in 0..MAX_MBOX_LINKS as u32 {
        let p = params(Role::Client, ChanPair {
            from: i * 2,
            to: i * 2 + 1,
        });
        links.push(wv_assert_ok!(pool.connect(mldev, &clock, &p, None)));
    }
    wv_assert_eq!(t, pool.used(), MAX_MBOX_LINKS);

    let p = params(Role::Client, ChanPair { from: 30, to: 31 });
    wv_assert_err!(t, pool.connect(mldev, &clock, &p, None), Code::NoFreeMbox);
    wv_assert_eq!(t, dev.claim_of(30), None);

    let first = links.remove(0);
    wv_assert_eq!(t, first.disconnect(), Ok(()));
    links.push(wv_assert_ok!(pool.connect(mldev, &clock, &p, None)));

    for l in links {
        wv_assert_eq!(t, l.disconnect(), Ok(()));
    }
    wv_assert_eq!(t, pool.used(), 0);
}

fn send_and_ack(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Client, CHANS), None));

    let msg = bytes(&[u32::from(Opcode::Ping), 1]);
    wv_assert_eq!(t, link.send(None, &msg), Ok(8));
    wv_assert!(t, !link.is_send_acked());

    wv_assert_eq!(t, dev.peer_read(CHANS.to), Some(msg));

    // the ack arrives on the other interrupt of the block
    pool.ack_isr(&dev, RCV_INT);
    wv_assert!(t, !link.is_send_acked());
    pool.ack_isr(&dev, ACK_INT);
    wv_assert!(t, link.is_send_acked());

    // a new send resets the ack state
    wv_assert_eq!(t, link.send(None, &full_msg()), Ok(MBOX_MSG_SIZE));
    wv_assert!(t, !link.is_send_acked());
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn send_limits(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Client, CHANS), None));

    wv_assert_err!(t, link.send(None, &[0u8; MBOX_MSG_SIZE + 1]), Code::InvArgs);

    // the peer does not read the first message, so that the channel stays busy
    wv_assert_eq!(t, link.send(Some(0), &[1, 2, 3, 4]), Ok(4));
    wv_assert_err!(t, link.send(Some(0), &[5, 6, 7, 8]), Code::Timeout);
    wv_assert_eq!(t, dev.peer_read(CHANS.to), Some(vec![1, 2, 3, 4]));
    wv_assert_eq!(t, link.send(Some(0), &[5, 6, 7, 8]), Ok(4));
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn request_reply(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Client, CHANS), None));
    let peer = Peer::new(&dev, &pool, &mldev, CHANS);

    for i in 0..3 {
        let req = bytes(&[u32::from(Opcode::Ping), 42 + i]);
        let mut reply = [0u8; MBOX_MSG_SIZE];
        let (res, got) = thread::scope(|s| {
            let p = s.spawn(|| peer.serve(|req| vec![u32::from(Opcode::Pong), req[1]]));
            let res = link.request(Some(1000), &req, Some(1000), &mut reply);
            (res, p.join().unwrap())
        });

        let len = wv_assert_ok!(res);
        wv_assert_eq!(t, len, 8);
        wv_assert_eq!(t, words(&reply[..len]), vec![u32::from(Opcode::Pong), 42 + i]);
        wv_assert_eq!(t, wv_assert_some!(got)[..2], [u32::from(Opcode::Ping), 42 + i]);
        wv_assert!(t, link.is_send_acked());
    }

    // the reply is truncated to the buffer
    let mut small = [0u8; 4];
    let res = thread::scope(|s| {
        s.spawn(|| peer.serve(|_| vec![u32::from(Opcode::Pong), 1, 2, 3]));
        link.request(None, &bytes(&[u32::from(Opcode::Ping)]), None, &mut small)
    });
    wv_assert_eq!(t, res, Ok(4));
    wv_assert_eq!(t, words(&small), vec![u32::from(Opcode::Pong)]);

    // none of the replies ended up in the command queue
    wv_assert!(t, !cmdq.pending());
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn request_timeouts(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Client, CHANS), None));
    let peer = Peer::new(&dev, &pool, &mldev, CHANS);
    let req = bytes(&[u32::from(Opcode::Ping), 1]);
    let mut reply = [0u8; MBOX_MSG_SIZE];

    // nobody reads the request: no ack
    wv_assert_err!(
        t,
        link.request(Some(0), &req, Some(0), &mut reply),
        Code::Timeout
    );
    // the request is still in the channel, so that the next send cannot even start
    wv_assert_err!(
        t,
        link.request(Some(0), &req, Some(0), &mut reply),
        Code::Timeout
    );

    // acked, but no reply
    wv_assert_some!(peer.recv());
    let res = thread::scope(|s| {
        s.spawn(|| peer.recv());
        link.request(None, &req, Some(0), &mut reply)
    });
    wv_assert_err!(t, res, Code::Timeout);

    // the link is usable again afterwards
    let res = thread::scope(|s| {
        s.spawn(|| peer.serve(|_| vec![u32::from(Opcode::Pong)]));
        link.request(None, &req, None, &mut reply)
    });
    wv_assert_eq!(t, res, Ok(4));
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn request_busy(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Client, CHANS), None));
    let peer = Peer::new(&dev, &pool, &mldev, CHANS);

    let (first, second) = thread::scope(|s| {
        let first = s.spawn(|| {
            let mut reply = [0u8; MBOX_MSG_SIZE];
            link.request(None, &bytes(&[u32::from(Opcode::Ping), 1]), None, &mut reply)
        });

        // the first request is in flight as soon as its message is in the channel
        wv_assert!(t, dev.wait_msg(CHANS.to, sim::PEER_TIMEOUT));
        let mut reply = [0u8; MBOX_MSG_SIZE];
        let second = link.request(Some(0), &bytes(&[u32::from(Opcode::Ping), 2]), Some(0), &mut reply);

        peer.serve(|req| vec![u32::from(Opcode::Pong), req[1]]);
        (first.join().unwrap(), second)
    });

    wv_assert_err!(t, second, Code::Busy);
    wv_assert_eq!(t, first, Ok(8));
    // the rejected request did not touch the channel
    wv_assert!(t, !dev.has_msg(CHANS.to));
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn late_reply(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Client, CHANS), None));
    let peer = Peer::new(&dev, &pool, &mldev, CHANS);
    let mut reply = [0u8; MBOX_MSG_SIZE];

    // a reply without a request is dropped
    peer.send(&[u32::from(Opcode::Pong), 0xdead]);
    wv_assert!(t, !dev.has_msg(CHANS.from));
    wv_assert!(t, !cmdq.pending());

    // so is a reply that arrives after the request gave up
    let res = thread::scope(|s| {
        s.spawn(|| peer.recv());
        link.request(None, &bytes(&[u32::from(Opcode::Ping), 1]), Some(0), &mut reply)
    });
    wv_assert_err!(t, res, Code::Timeout);
    peer.send(&[u32::from(Opcode::Pong), 1]);

    // the next request receives its own reply
    let res = thread::scope(|s| {
        s.spawn(|| peer.serve(|req| vec![u32::from(Opcode::Pong), req[1]]));
        link.request(None, &bytes(&[u32::from(Opcode::Ping), 2]), None, &mut reply)
    });
    wv_assert_eq!(t, res, Ok(8));
    wv_assert_eq!(t, words(&reply[..8]), vec![u32::from(Opcode::Pong), 2]);
    wv_assert!(t, !cmdq.pending());
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}

fn server_commands(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let other = SimMbox::new(0x2000);
    let mldev = MboxLinkDev::new(&dev, RCV_INT, ACK_INT);
    let link = wv_assert_ok!(pool.connect(mldev, &clock, &params(Role::Server, CHANS), None));
    let peer = Peer::new(&dev, &pool, &mldev, CHANS);

    peer.send(&[u32::from(Opcode::Ping), 7, 8]);
    let cmd = wv_assert_some!(cmdq.dequeue());
    wv_assert_eq!(t, cmd.link, None);
    wv_assert_eq!(t, cmd.opcode(), Ok(Opcode::Ping));
    wv_assert_eq!(t, cmd.arg(0), 7);
    wv_assert_eq!(t, cmd.arg(1), 8);
    wv_assert_eq!(t, cmd.arg(2), 0);
    wv_assert!(t, !cmdq.pending());

    // interrupts of other blocks or of other indices are not ours
    dev.peer_write(CHANS.from, &bytes(&[u32::from(Opcode::Nop)]));
    pool.rcv_isr(&other, RCV_INT);
    pool.rcv_isr(&dev, ACK_INT);
    wv_assert!(t, !cmdq.pending());
    pool.rcv_isr(&dev, RCV_INT);
    wv_assert_eq!(t, cmdq.dequeue().map(|c| c.msg[0]), Some(u32::from(Opcode::Nop)));

    // commands are answered with plain sends
    wv_assert_eq!(t, link.send(None, &bytes(&[u32::from(Opcode::Pong), 7])), Ok(8));
    wv_assert_eq!(t, peer.recv(), Some(vec![u32::from(Opcode::Pong), 7]));
    wv_assert!(t, link.is_send_acked());
    wv_assert_eq!(t, link.disconnect(), Ok(()));
}
