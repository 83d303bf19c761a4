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

use core::cell::Cell;

use base::errors::Code;
use base::test::WvTester;
use base::time::{Clock, CycleDuration};
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use swtimer::{SwTimers, TimerKind};

// 1 cycle per ms keeps the numbers readable
const FREQ: u32 = 1000;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, periodic);
    wv_run_test!(t, oneshot);
    wv_run_test!(t, cancel);
    wv_run_test!(t, multiple);
    wv_run_test!(t, exhaustion);
    wv_run_test!(t, long_interval);
}

fn periodic(t: &mut dyn WvTester) {
    let clock = Clock::new(FREQ);
    let calls = Cell::new(0);
    let cb = |arg: usize| calls.set(calls.get() + arg);
    let timers: SwTimers<'_> = SwTimers::new(&clock);

    let id = wv_assert_ok!(timers.schedule(10, TimerKind::Periodic, &cb, 1));
    wv_assert_eq!(t, timers.next_fire(id).map(|i| i.as_raw()), Some(10));

    timers.tick(CycleDuration::new(9));
    wv_assert_eq!(t, timers.run(), 0);
    wv_assert_eq!(t, calls.get(), 0);

    // fires once even if the tick overshot, and is rescheduled relative to now
    timers.tick(CycleDuration::new(5));
    wv_assert_eq!(t, timers.run(), 1);
    wv_assert_eq!(t, calls.get(), 1);
    wv_assert!(t, timers.is_active(id));
    wv_assert_eq!(t, timers.next_fire(id).map(|i| i.as_raw()), Some(24));

    wv_assert_eq!(t, timers.run(), 0);
    timers.tick(CycleDuration::new(10));
    wv_assert_eq!(t, timers.run(), 1);
    wv_assert_eq!(t, calls.get(), 2);
}

fn oneshot(t: &mut dyn WvTester) {
    let clock = Clock::new(FREQ);
    let calls = Cell::new(0);
    let cb = |arg: usize| calls.set(arg);
    let timers: SwTimers<'_> = SwTimers::new(&clock);

    let id = wv_assert_ok!(timers.schedule(5, TimerKind::OneShot, &cb, 42));
    timers.tick(CycleDuration::new(5));
    wv_assert_eq!(t, timers.run(), 1);
    wv_assert_eq!(t, calls.get(), 42);

    wv_assert!(t, !timers.is_active(id));
    wv_assert_eq!(t, timers.active(), 0);
    wv_assert_eq!(t, timers.next_fire(id), None);

    timers.tick(CycleDuration::new(100));
    wv_assert_eq!(t, timers.run(), 0);
    wv_assert_err!(t, timers.cancel(id), Code::InvArgs);
}

fn cancel(t: &mut dyn WvTester) {
    let clock = Clock::new(FREQ);
    let calls = Cell::new(0);
    let cb = |_: usize| calls.set(calls.get() + 1);
    let timers: SwTimers<'_> = SwTimers::new(&clock);

    let id = wv_assert_ok!(timers.schedule(5, TimerKind::Periodic, &cb, 0));
    wv_assert_eq!(t, timers.cancel(id), Ok(()));
    wv_assert_err!(t, timers.cancel(id), Code::InvArgs);

    timers.tick(CycleDuration::new(10));
    wv_assert_eq!(t, timers.run(), 0);
    wv_assert_eq!(t, calls.get(), 0);

    // the slot is reused, but the old id stays invalid
    let new = wv_assert_ok!(timers.schedule(5, TimerKind::OneShot, &cb, 0));
    wv_assert!(t, new != id);
    wv_assert!(t, !timers.is_active(id));
    wv_assert!(t, timers.is_active(new));
}

fn multiple(t: &mut dyn WvTester) {
    let clock = Clock::new(FREQ);
    let fired = Cell::new(0usize);
    let cb = |arg: usize| fired.set(fired.get() | arg);
    let timers: SwTimers<'_> = SwTimers::new(&clock);

    wv_assert_ok!(timers.schedule(10, TimerKind::OneShot, &cb, 1 << 0));
    wv_assert_ok!(timers.schedule(20, TimerKind::OneShot, &cb, 1 << 1));
    let third = wv_assert_ok!(timers.schedule(10, TimerKind::Periodic, &cb, 1 << 2));
    wv_assert_eq!(t, timers.active(), 3);

    timers.tick(CycleDuration::new(10));
    wv_assert_eq!(t, timers.run(), 2);
    wv_assert_eq!(t, fired.get(), 0b101);
    wv_assert_eq!(t, timers.active(), 2);

    fired.set(0);
    timers.tick(CycleDuration::new(10));
    wv_assert_eq!(t, timers.run(), 2);
    wv_assert_eq!(t, fired.get(), 0b110);
    wv_assert_eq!(t, timers.active(), 1);
    wv_assert_some!(timers.next_fire(third));
}

fn exhaustion(t: &mut dyn WvTester) {
    let clock = Clock::new(FREQ);
    let cb = |_: usize| {};
    let timers: SwTimers<'_, 2> = SwTimers::new(&clock);

    wv_assert_ok!(timers.schedule(1, TimerKind::OneShot, &cb, 0));
    wv_assert_ok!(timers.schedule(1, TimerKind::OneShot, &cb, 0));
    wv_assert_err!(t, timers.schedule(1, TimerKind::OneShot, &cb, 0), Code::NoSpace);

    // fired one-shot timers free their slots
    timers.tick(CycleDuration::new(1));
    wv_assert_eq!(t, timers.run(), 2);
    wv_assert_ok!(timers.schedule(1, TimerKind::OneShot, &cb, 0));
}

fn long_interval(t: &mut dyn WvTester) {
    // the system tick clock of the TRCH
    let clock = Clock::new(100_000_000);
    let calls = Cell::new(0);
    let cb = |_: usize| calls.set(calls.get() + 1);
    let timers: SwTimers<'_> = SwTimers::new(&clock);

    let id = wv_assert_ok!(timers.schedule(30_000, TimerKind::OneShot, &cb, 0));
    wv_assert_eq!(
        t,
        timers.next_fire(id).map(|i| i.as_raw()),
        Some(3_000_000_000)
    );
    wv_assert_eq!(t, timers.run(), 0);

    // 500ms ticks
    for _ in 0..59 {
        timers.tick(CycleDuration::new(50_000_000));
        wv_assert_eq!(t, timers.run(), 0);
    }
    timers.tick(CycleDuration::new(50_000_000));
    wv_assert_eq!(t, timers.run(), 1);
    wv_assert_eq!(t, calls.get(), 1);
    wv_assert!(t, !timers.is_active(id));
}
