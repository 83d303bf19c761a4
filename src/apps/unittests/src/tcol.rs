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

use base::col::{Pool, RingBuf};
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::smp::Handoff;
use base::test::WvTester;
use base::time::{Clock, CycleDuration, CycleInstant};
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, ringbuf_fifo);
    wv_run_test!(t, ringbuf_full);
    wv_run_test!(t, pool_alloc_free);
    wv_run_test!(t, pool_stale_ids);
    wv_run_test!(t, pool_exhaustion);
    wv_run_test!(t, cycles_past_32bit);
    wv_run_test!(t, clock_long_intervals);
    wv_run_test!(t, clock_deadline);
    wv_run_test!(t, handoff_once);
    wv_run_test!(t, handoff_across_threads);
    wv_run_test!(t, error_codes);
    wv_run_test!(t, logflags_parse);
}

fn ringbuf_fifo(t: &mut dyn WvTester) {
    let mut rb: RingBuf<u32, 4> = RingBuf::new();
    wv_assert!(t, rb.is_empty());
    wv_assert_eq!(t, rb.capacity(), 4);

    // wrap around a few times
    for round in 0..3 {
        for i in 0..3 {
            wv_assert_eq!(t, rb.push(round * 10 + i), Ok(()));
        }
        wv_assert_eq!(t, rb.front(), Some(&(round * 10)));
        for i in 0..3 {
            wv_assert_eq!(t, rb.pop(), Some(round * 10 + i));
        }
        wv_assert_eq!(t, rb.pop(), None);
    }
}

fn ringbuf_full(t: &mut dyn WvTester) {
    let mut rb: RingBuf<u32, 2> = RingBuf::new();
    wv_assert_eq!(t, rb.push(1), Ok(()));
    wv_assert_eq!(t, rb.push(2), Ok(()));
    wv_assert!(t, rb.is_full());
    wv_assert_eq!(t, rb.push(3), Err(3));
    wv_assert_eq!(t, rb.len(), 2);

    rb.clear();
    wv_assert!(t, rb.is_empty());
    wv_assert_eq!(t, rb.push(4), Ok(()));
    wv_assert_eq!(t, rb.pop(), Some(4));
}

fn pool_alloc_free(t: &mut dyn WvTester) {
    let mut pool: Pool<&str, 4> = Pool::new();
    let a = wv_assert_ok!(pool.alloc("a"));
    let b = wv_assert_ok!(pool.alloc("b"));
    wv_assert_eq!(t, pool.len(), 2);
    wv_assert_eq!(t, pool.get(a), Some(&"a"));
    wv_assert_eq!(t, pool.get(b), Some(&"b"));

    *wv_assert_some!(pool.get_mut(b)) = "c";
    wv_assert_eq!(t, pool.free(b), Some("c"));
    wv_assert_eq!(t, pool.len(), 1);

    let ids = pool.iter().map(|(id, _)| id).collect::<Vec<_>>();
    wv_assert_eq!(t, ids, vec![a]);
}

fn pool_stale_ids(t: &mut dyn WvTester) {
    let mut pool: Pool<u32, 2> = Pool::new();
    let old = wv_assert_ok!(pool.alloc(1));
    wv_assert_eq!(t, pool.free(old), Some(1));

    // the slot is reused, but the old id does not refer to the new object
    let new = wv_assert_ok!(pool.alloc(2));
    wv_assert_eq!(t, new.index(), old.index());
    wv_assert!(t, new != old);
    wv_assert_eq!(t, pool.get(old), None);
    wv_assert_eq!(t, pool.free(old), None);
    wv_assert_eq!(t, pool.get(new), Some(&2));

    let raw = new.to_raw();
    wv_assert_eq!(t, base::col::PoolId::from_raw(raw), new);
}

fn pool_exhaustion(t: &mut dyn WvTester) {
    let mut pool: Pool<u32, 2> = Pool::new();
    wv_assert_ok!(pool.alloc(1));
    wv_assert_ok!(pool.alloc(2));
    wv_assert_err!(t, pool.alloc(3), Code::NoSpace);
    wv_assert_eq!(t, pool.len(), 2);
}

fn cycles_past_32bit(t: &mut dyn WvTester) {
    let start = CycleInstant::new(u32::MAX as u64 - 10);
    let end = start + CycleDuration::new(20);
    wv_assert_eq!(t, end.as_raw(), u32::MAX as u64 + 10);
    wv_assert!(t, !end.is_reached(start));
    wv_assert!(t, !end.is_reached(CycleInstant::new(u32::MAX as u64)));
    wv_assert!(t, !end.is_reached(CycleInstant::new(9)));
    wv_assert!(t, end.is_reached(end));
    wv_assert_eq!(t, end.duration_since(start), CycleDuration::new(20));
    wv_assert_eq!(t, start.duration_since(end), CycleDuration::ZERO);

    // intervals of more than half of the 32-bit range are still in the future
    let far = CycleInstant::default() + CycleDuration::new(3_000_000_000);
    wv_assert!(t, !far.is_reached(CycleInstant::default()));
}

fn clock_long_intervals(t: &mut dyn WvTester) {
    let clock = Clock::new(100_000_000);
    wv_assert_eq!(t, clock.ms_to_cycles(30_000), CycleDuration::new(3_000_000_000));
    wv_assert_eq!(t, clock.ms_to_cycles(u32::MAX), CycleDuration::new(u32::MAX as u64 * 100_000));

    let end = clock.deadline(60_000);
    wv_assert!(t, !end.is_reached(clock.now()));
    for _ in 0..119 {
        clock.tick(CycleDuration::new(50_000_000));
    }
    wv_assert!(t, !end.is_reached(clock.now()));
    clock.tick(CycleDuration::new(50_000_000));
    wv_assert!(t, end.is_reached(clock.now()));
    wv_assert_eq!(t, clock.now().as_raw(), 6_000_000_000);
}

fn clock_deadline(t: &mut dyn WvTester) {
    let clock = Clock::new(1_000_000);
    wv_assert_eq!(t, clock.ms_to_cycles(5), CycleDuration::new(5000));

    let end = clock.deadline(2);
    wv_assert!(t, !end.is_reached(clock.now()));
    clock.tick(CycleDuration::new(1999));
    wv_assert!(t, !end.is_reached(clock.now()));
    clock.tick(CycleDuration::new(1));
    wv_assert!(t, end.is_reached(clock.now()));

    // zero timeouts expire right away
    wv_assert!(t, clock.deadline(0).is_reached(clock.now()));
}

fn handoff_once(t: &mut dyn WvTester) {
    let h = Handoff::new();
    wv_assert!(t, !h.is_signaled());
    wv_assert_eq!(t, h.signal(), Ok(()));
    wv_assert!(t, h.is_signaled());
    wv_assert_err!(t, h.signal(), Code::InvState);
}

fn handoff_across_threads(t: &mut dyn WvTester) {
    let h = Handoff::new();
    thread::scope(|s| {
        s.spawn(|| h.signal());
        h.wait();
    });
    wv_assert!(t, h.is_signaled());
}

fn error_codes(t: &mut dyn WvTester) {
    let e = Error::new(Code::Timeout);
    wv_assert_eq!(t, e.code(), Code::Timeout);
    wv_assert_eq!(t, Error::from(u32::from(Code::MboxBusy)).code(), Code::MboxBusy);
    wv_assert_eq!(t, Error::from(0xdead_u32).code(), Code::Unspecified);
    wv_assert_eq!(t, Code::from(Ok::<u32, Error>(1)), Code::Success);
    wv_assert_eq!(t, format!("{}", e), "Timeout");
}

fn logflags_parse(t: &mut dyn WvTester) {
    wv_assert_eq!(
        t,
        "Info | TrchBoot".parse::<LogFlags>().ok(),
        Some(LogFlags::Info | LogFlags::TrchBoot)
    );
    wv_assert!(t, "Foo".parse::<LogFlags>().is_err());
    wv_assert_eq!(t, LogFlags::default(), LogFlags::Info | LogFlags::Error);
}
