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

use base::errors::{Code, Error};
use base::kif::cmd::{Opcode, CMD_MSG_LEN};
use base::kif::mboxmap::ChanPair;
use base::kif::{owner, SwComp, SwSubsys};
use base::test::WvTester;
use base::time::Clock;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use link::cmd::{self, Cmd, CmdHandler, CmdQueue, CMD_QUEUE_LEN};
use link::{Link, Links, MboxLinkDev, MboxLinkParams, MboxLinkPool, Role, ShmBuf, ShmemLink};

use crate::sim::{self, bytes, words, Peer, SimMbox};

const CHANS: ChanPair = ChanPair { from: 30, to: 31 };

fn server_params() -> MboxLinkParams {
    MboxLinkParams {
        name: "TEST_SERVER_LINK",
        chans: CHANS,
        role: Role::Server,
        server: owner(SwSubsys::Trch, SwComp::Ssw),
        client: owner(SwSubsys::HppsSmp, SwComp::Ssw),
    }
}

/// Answers pings, ignores nops, and rejects everything else
struct Responder {
    handled: usize,
}

impl CmdHandler for Responder {
    fn handle(&mut self, cmd: &Cmd, reply: &mut [u32]) -> Result<usize, Error> {
        self.handled += 1;
        match cmd.opcode()? {
            Opcode::Nop => Ok(0),
            Opcode::Ping => {
                reply[0] = Opcode::Pong.into();
                reply[1] = cmd.arg(0);
                Ok(2)
            },
            _ => Err(Error::new(Code::NotSup)),
        }
    }
}

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, cmd_records);
    wv_run_test!(t, cmd_queue);
    wv_run_test!(t, shmem_lifecycle);
    wv_run_test!(t, links_full);
    wv_run_test!(t, mbox_rollback);
    wv_run_test!(t, mbox_commands);
    wv_run_test!(t, poll_shmem);
    wv_run_test!(t, poll_empty_message);
    wv_run_test!(t, poll_queue_full);
    wv_run_test!(t, handle_errors);
}

fn cmd_records(t: &mut dyn WvTester) {
    let cmd = Cmd::new(None, &[u32::from(Opcode::Ping), 1, 2]);
    wv_assert_eq!(t, cmd.opcode(), Ok(Opcode::Ping));
    wv_assert_eq!(t, cmd.arg(0), 1);
    wv_assert_eq!(t, cmd.arg(1), 2);
    wv_assert_eq!(t, cmd.arg(CMD_MSG_LEN - 2), 0);

    // partial words are zero-padded
    let cmd = Cmd::from_bytes(None, &[2, 0, 0, 0, 0x34, 0x12]);
    wv_assert_eq!(t, cmd.opcode(), Ok(Opcode::Pong));
    wv_assert_eq!(t, cmd.arg(0), 0x1234);

    let cmd = Cmd::new(None, &[0xffff]);
    wv_assert_err!(t, cmd.opcode(), Code::InvCmd);

    let mut buf = [0u8; 6];
    wv_assert_eq!(t, cmd::words_to_bytes(&[0x0403_0201, 0x0807_0605], &mut buf), 6);
    wv_assert_eq!(t, buf, [1, 2, 3, 4, 5, 6]);
}

fn cmd_queue(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    wv_assert!(t, !cmdq.pending());

    for i in 0..CMD_QUEUE_LEN as u32 {
        wv_assert_eq!(t, cmdq.enqueue(Cmd::new(None, &[u32::from(Opcode::Ping), i])), Ok(()));
    }
    wv_assert_err!(
        t,
        cmdq.enqueue(Cmd::new(None, &[u32::from(Opcode::Nop)])),
        Code::QueueFull
    );

    for i in 0..CMD_QUEUE_LEN as u32 {
        let cmd = wv_assert_some!(cmdq.dequeue());
        wv_assert_eq!(t, cmd.arg(0), i);
    }
    wv_assert!(t, !cmdq.pending());
    wv_assert_eq!(t, cmdq.dequeue(), None);
}

fn shmem_lifecycle(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let (out, inb) = (ShmBuf::new(), ShmBuf::new());
    let links: Links<'_> = Links::new(&pool, &clock);

    wv_assert!(t, links.is_empty());
    let id = wv_assert_ok!(links.connect_shmem("SHM_LINK", &out, &inb));
    wv_assert_eq!(t, links.len(), 1);
    wv_assert!(t, links.contains(id));
    wv_assert_eq!(t, links.name(id), Ok("SHM_LINK"));
    wv_assert_eq!(t, links.with(id, |l| l.name().len()), Ok(8));

    wv_assert_eq!(t, links.disconnect(id), Ok(()));
    wv_assert!(t, links.is_empty());
    wv_assert!(t, !links.contains(id));
    wv_assert_err!(t, links.disconnect(id), Code::NotFound);
    wv_assert_err!(t, links.name(id), Code::NotFound);
    wv_assert_err!(t, links.with(id, |_| ()), Code::NotFound);

    // a new link in the same slot gets a different id
    let new = wv_assert_ok!(links.connect_shmem("SHM_LINK2", &out, &inb));
    wv_assert_eq!(t, new.index(), id.index());
    wv_assert!(t, new != id);
    wv_assert_err!(t, links.name(id), Code::NotFound);
}

fn links_full(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let (out, inb) = (ShmBuf::new(), ShmBuf::new());
    let dev = SimMbox::new(0x1000);
    let links: Links<'_, 2> = Links::new(&pool, &clock);

    wv_assert_ok!(links.connect_shmem("A", &out, &inb));
    wv_assert_ok!(links.connect_shmem("B", &out, &inb));
    wv_assert_err!(t, links.connect_shmem("C", &out, &inb), Code::NoFreeLink);

    // nothing is claimed if there is no free link
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    wv_assert_err!(t, links.connect_mbox(mldev, &server_params()), Code::NoFreeLink);
    wv_assert_eq!(t, dev.claimed(), 0);
    wv_assert_eq!(t, pool.used(), 0);
    wv_assert_eq!(t, links.len(), 2);
}

fn mbox_rollback(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let links: Links<'_> = Links::new(&pool, &clock);

    dev.break_chan(Some(CHANS.to));
    wv_assert_err!(t, links.connect_mbox(mldev, &server_params()), Code::MboxClaimFailed);
    wv_assert!(t, links.is_empty());
    wv_assert_eq!(t, pool.used(), 0);
    wv_assert_eq!(t, dev.claimed(), 0);

    dev.break_chan(None);
    let id = wv_assert_ok!(links.connect_mbox(mldev, &server_params()));
    wv_assert_eq!(t, links.name(id), Ok("TEST_SERVER_LINK"));
    wv_assert_eq!(t, dev.claimed(), 2);

    wv_assert_eq!(t, links.disconnect(id), Ok(()));
    wv_assert_eq!(t, dev.claimed(), 0);
    wv_assert_eq!(t, pool.used(), 0);
}

fn mbox_commands(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let peer = Peer::new(&dev, &pool, &mldev, CHANS);
    let mut handler = Responder { handled: 0 };
    let links: Links<'_> = Links::new(&pool, &clock);

    let id = wv_assert_ok!(links.connect_mbox(mldev, &server_params()));

    // the command carries the link it arrived on, and the reply goes back over it
    peer.send(&[u32::from(Opcode::Ping), 0x77]);
    let cmd = wv_assert_some!(cmdq.dequeue());
    wv_assert_eq!(t, cmd.link, Some(id));
    wv_assert_eq!(t, cmd::handle(&links, &mut handler, &cmd), Ok(()));
    wv_assert_eq!(t, peer.recv(), Some(vec![u32::from(Opcode::Pong), 0x77]));
    wv_assert_eq!(t, links.with(id, |l| l.is_send_acked()), Ok(true));

    // no reply for nops
    peer.send(&[u32::from(Opcode::Nop)]);
    let cmd = wv_assert_some!(cmdq.dequeue());
    wv_assert_eq!(t, cmd::handle(&links, &mut handler, &cmd), Ok(()));
    wv_assert!(t, !dev.has_msg(CHANS.to));
    wv_assert_eq!(t, handler.handled, 2);

    wv_assert_eq!(t, links.disconnect(id), Ok(()));
}

fn poll_shmem(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);
    let mut handler = Responder { handled: 0 };
    let links: Links<'_> = Links::new(&pool, &clock);

    let id = wv_assert_ok!(links.connect_shmem("SHM_SERVER", &to_peer, &from_peer));
    wv_assert_eq!(t, links.poll(&cmdq), Ok(0));

    wv_assert_eq!(t, peer.send(None, &bytes(&[u32::from(Opcode::Ping), 5])), Ok(8));
    wv_assert_eq!(t, links.poll(&cmdq), Ok(1));
    wv_assert!(t, peer.is_send_acked());
    // the message has been consumed
    wv_assert_eq!(t, links.poll(&cmdq), Ok(0));

    let cmd = wv_assert_some!(cmdq.dequeue());
    wv_assert_eq!(t, cmd.link, Some(id));
    wv_assert_eq!(t, cmd::handle(&links, &mut handler, &cmd), Ok(()));

    let mut buf = [0u8; 64];
    let n = wv_assert_ok!(peer.recv(&mut buf));
    wv_assert_eq!(t, words(&buf[..n]), vec![u32::from(Opcode::Pong), 5]);
}

fn poll_empty_message(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);
    let links: Links<'_> = Links::new(&pool, &clock);

    wv_assert_ok!(links.connect_shmem("SHM_SERVER", &to_peer, &from_peer));

    // an empty message is consumed, but not turned into a command
    wv_assert_eq!(t, peer.send(None, &[]), Ok(0));
    wv_assert_eq!(t, links.poll(&cmdq), Ok(0));
    wv_assert!(t, !cmdq.pending());
    wv_assert!(t, peer.is_send_acked());

    // the link is still usable afterwards
    wv_assert_eq!(t, peer.send(Some(0), &bytes(&[u32::from(Opcode::Nop)])), Ok(4));
    wv_assert_eq!(t, links.poll(&cmdq), Ok(1));
    let cmd = wv_assert_some!(cmdq.dequeue());
    wv_assert_eq!(t, cmd.opcode(), Ok(Opcode::Nop));
}

fn poll_queue_full(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);
    let links: Links<'_> = Links::new(&pool, &clock);

    wv_assert_ok!(links.connect_shmem("SHM_SERVER", &to_peer, &from_peer));
    for _ in 0..CMD_QUEUE_LEN {
        wv_assert_ok!(cmdq.enqueue(Cmd::new(None, &[u32::from(Opcode::Nop)])));
    }

    wv_assert_eq!(t, peer.send(None, &bytes(&[u32::from(Opcode::Ping)])), Ok(4));
    wv_assert_err!(t, links.poll(&cmdq), Code::QueueFull);
}

fn handle_errors(t: &mut dyn WvTester) {
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let clock = Clock::new(1000);
    let (out, inb) = (ShmBuf::new(), ShmBuf::new());
    let mut handler = Responder { handled: 0 };
    let links: Links<'_> = Links::new(&pool, &clock);

    // failures of the handler are passed on and nothing is sent
    let id = wv_assert_ok!(links.connect_shmem("SHM", &out, &inb));
    let cmd = Cmd::new(Some(id), &[u32::from(Opcode::ResetHpps)]);
    wv_assert_err!(t, cmd::handle(&links, &mut handler, &cmd), Code::NotSup);
    let cmd = Cmd::new(Some(id), &[0xbad]);
    wv_assert_err!(t, cmd::handle(&links, &mut handler, &cmd), Code::InvCmd);
    wv_assert_eq!(t, links.with(id, |l| l.is_send_acked()), Ok(false));

    // local commands are handled, but not replied to
    let cmd = Cmd::new(None, &[u32::from(Opcode::Ping), 1]);
    wv_assert_eq!(t, cmd::handle(&links, &mut handler, &cmd), Ok(()));

    // the link went away in the meantime
    wv_assert_eq!(t, links.disconnect(id), Ok(()));
    let cmd = Cmd::new(Some(id), &[u32::from(Opcode::Ping), 1]);
    wv_assert_err!(t, cmd::handle(&links, &mut handler, &cmd), Code::NotFound);
    wv_assert_eq!(t, handler.handled, 4);
}
