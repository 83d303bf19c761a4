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
use std::time::{Duration, Instant};

use base::errors::Code;
use base::kif::cmd::Opcode;
use base::test::WvTester;
use base::time::{Clock, CycleDuration};
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use link::{Link, ShmBuf, ShmemLink, SHMEM_MSG_SIZE};

use crate::sim::{self, bytes, full_msg, words, PEER_TIMEOUT};

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, send_recv);
    wv_run_test!(t, send_waits_for_consumer);
    wv_run_test!(t, request_reply);
    wv_run_test!(t, request_timeout);
    wv_run_test!(t, empty_message);
    wv_run_test!(t, long_timeout);
}

/// Polls `link` until a message arrives
fn recv_blocking(link: &ShmemLink<'_>, buf: &mut [u8]) -> Option<usize> {
    let end = Instant::now() + PEER_TIMEOUT;
    while Instant::now() < end {
        match link.recv(buf) {
            Ok(0) => thread::yield_now(),
            Ok(n) => return Some(n),
            Err(_) => return None,
        }
    }
    None
}

fn send_recv(t: &mut dyn WvTester) {
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let trch = ShmemLink::new("TRCH", &to_peer, &from_peer, &clock);
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);

    let mut buf = [0u8; SHMEM_MSG_SIZE];
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(0));

    let msg = bytes(&[u32::from(Opcode::Ping), 3]);
    wv_assert_eq!(t, trch.send(None, &msg), Ok(8));
    wv_assert!(t, !trch.is_send_acked());

    wv_assert_eq!(t, peer.recv(&mut buf), Ok(8));
    wv_assert_eq!(t, &buf[..8], &msg[..]);
    wv_assert!(t, trch.is_send_acked());
    // the message is consumed
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(0));

    // full messages, received into a smaller buffer
    wv_assert_eq!(t, trch.send(None, &full_msg()), Ok(SHMEM_MSG_SIZE));
    let mut small = [0u8; 6];
    wv_assert_eq!(t, peer.recv(&mut small), Ok(6));
    wv_assert_eq!(t, small, [0, 1, 2, 3, 4, 5]);

    wv_assert_err!(t, trch.send(None, &[0u8; SHMEM_MSG_SIZE + 1]), Code::InvArgs);
    wv_assert_eq!(t, trch.disconnect(), Ok(()));
}

fn send_waits_for_consumer(t: &mut dyn WvTester) {
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let trch = ShmemLink::new("TRCH", &to_peer, &from_peer, &clock);
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);

    wv_assert_eq!(t, trch.send(Some(0), &[1]), Ok(1));
    wv_assert_err!(t, trch.send(Some(0), &[2]), Code::Timeout);

    let mut buf = [0u8; SHMEM_MSG_SIZE];
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(1));
    wv_assert_eq!(t, buf[0], 1);
    wv_assert_eq!(t, trch.send(Some(0), &[2]), Ok(1));

    // without a timeout, send waits until the peer has consumed the message
    let res = thread::scope(|s| {
        s.spawn(|| recv_blocking(&peer, &mut [0u8; SHMEM_MSG_SIZE]));
        trch.send(None, &[3])
    });
    wv_assert_eq!(t, res, Ok(1));
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(1));
    wv_assert_eq!(t, buf[0], 3);
}

fn request_reply(t: &mut dyn WvTester) {
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let trch = ShmemLink::new("TRCH", &to_peer, &from_peer, &clock);
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);

    let mut reply = [0u8; SHMEM_MSG_SIZE];
    let (res, served) = thread::scope(|s| {
        let p = s.spawn(|| {
            let mut req = [0u8; SHMEM_MSG_SIZE];
            let n = recv_blocking(&peer, &mut req)?;
            let req = words(&req[..n]);
            peer.send(None, &bytes(&[u32::from(Opcode::Pong), req[1]])).ok()
        });
        let res = trch.request(
            None,
            &bytes(&[u32::from(Opcode::Ping), 99]),
            None,
            &mut reply,
        );
        (res, p.join().unwrap())
    });

    wv_assert_eq!(t, served, Some(8));
    wv_assert_eq!(t, res, Ok(8));
    wv_assert_eq!(t, words(&reply[..8]), vec![u32::from(Opcode::Pong), 99]);
    wv_assert!(t, trch.is_send_acked());
}

fn request_timeout(t: &mut dyn WvTester) {
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let trch = ShmemLink::new("TRCH", &to_peer, &from_peer, &clock);
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);
    let mut reply = [0u8; SHMEM_MSG_SIZE];

    // no ack
    let req = bytes(&[u32::from(Opcode::Ping)]);
    wv_assert_err!(t, trch.request(Some(0), &req, Some(0), &mut reply), Code::Timeout);

    // acked, but no reply
    let mut buf = [0u8; SHMEM_MSG_SIZE];
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(4));
    let res = thread::scope(|s| {
        s.spawn(|| recv_blocking(&peer, &mut [0u8; SHMEM_MSG_SIZE]));
        trch.request(None, &req, Some(0), &mut reply)
    });
    wv_assert_err!(t, res, Code::Timeout);

    // a request after a timeout is possible again
    let res = thread::scope(|s| {
        s.spawn(|| {
            recv_blocking(&peer, &mut [0u8; SHMEM_MSG_SIZE])?;
            peer.send(None, &bytes(&[u32::from(Opcode::Pong)])).ok()
        });
        trch.request(None, &req, None, &mut reply)
    });
    wv_assert_eq!(t, res, Ok(4));
    wv_assert_eq!(t, words(&reply[..4]), vec![u32::from(Opcode::Pong)]);
}

fn empty_message(t: &mut dyn WvTester) {
    let clock = Clock::new(1000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let trch = ShmemLink::new("TRCH", &to_peer, &from_peer, &clock);
    let peer = ShmemLink::new("PEER", &from_peer, &to_peer, &clock);

    let mut buf = [0u8; SHMEM_MSG_SIZE];
    wv_assert_eq!(t, trch.send(None, &[]), Ok(0));
    wv_assert_err!(t, peer.recv(&mut buf), Code::RecvFailed);
    // consumed nevertheless
    wv_assert!(t, trch.is_send_acked());
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(0));
}

fn long_timeout(t: &mut dyn WvTester) {
    // the system tick clock of the TRCH
    let clock = Clock::new(100_000_000);
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let trch = ShmemLink::new("TRCH", &to_peer, &from_peer, &clock);

    wv_assert_eq!(t, trch.send(None, &[1]), Ok(1));

    // nobody consumes the message, so the second send runs into its 30s timeout
    let done = AtomicBool::new(false);
    let res = thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                clock.tick(CycleDuration::new(50_000_000));
                thread::sleep(Duration::from_millis(1));
            }
        });
        let res = trch.send(Some(30_000), &[2]);
        done.store(true, Ordering::Release);
        res
    });
    wv_assert_err!(t, res, Code::Timeout);
    wv_assert!(t, clock.now().as_raw() >= 3_000_000_000);
}
