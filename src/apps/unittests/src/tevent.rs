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

use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use base::errors::Code;
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use event::{invalid_event, Actor, ActorId, EvLoop, Event, EV_QUEUE_LEN, MAX_ACTORS};

type Trace = Mutex<Vec<(&'static str, Option<ActorId>, Event)>>;

struct Recorder<'t> {
    name: &'static str,
    trace: &'t Trace,
}

impl<'t> Recorder<'t> {
    fn new(name: &'static str, trace: &'t Trace) -> Self {
        Self { name, trace }
    }
}

impl Actor for Recorder<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn handle(&mut self, _evl: &EvLoop<'_>, sender: Option<ActorId>, event: Event) {
        self.trace.lock().unwrap().push((self.name, sender, event));
    }
}

/// Answers every event with `event + 1` to its sender
struct Echo<'t> {
    trace: &'t Trace,
}

impl Actor for Echo<'_> {
    fn name(&self) -> &str {
        "echo"
    }

    fn handle(&mut self, evl: &EvLoop<'_>, sender: Option<ActorId>, event: Event) {
        self.trace.lock().unwrap().push(("echo", sender, event));
        match sender {
            Some(s) => evl.post(None, s, event + 1),
            None => invalid_event("echo", "Idle", event),
        }
    }
}

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, fifo_order);
    wv_run_test!(t, post_from_handler);
    wv_run_test!(t, register_full);
    wv_run_test!(t, queue_overflow);
    wv_run_test!(t, invalid_events);
}

fn fifo_order(t: &mut dyn WvTester) {
    let trace = Trace::default();
    let mut a = Recorder::new("a", &trace);
    let mut b = Recorder::new("b", &trace);
    let evl = EvLoop::new("test");

    let aid = wv_assert_ok!(evl.register(&mut a));
    let bid = wv_assert_ok!(evl.register(&mut b));
    wv_assert!(t, aid != bid);

    wv_assert!(t, !evl.pending());
    wv_assert!(t, !evl.process());

    evl.post(None, aid, 1);
    evl.post(Some(bid), aid, 2);
    evl.post(Some(aid), bid, 3);
    wv_assert!(t, evl.pending());

    wv_assert!(t, evl.process());
    wv_assert!(t, evl.process());
    wv_assert!(t, !evl.process());
    wv_assert!(t, !evl.pending());

    wv_assert_eq!(t, *trace.lock().unwrap(), vec![
        ("a", None, 1),
        ("a", Some(bid), 2),
        ("b", Some(aid), 3)
    ]);
}

fn post_from_handler(t: &mut dyn WvTester) {
    let trace = Trace::default();
    let mut rec = Recorder::new("rec", &trace);
    let mut echo = Echo { trace: &trace };
    let evl = EvLoop::new("test");

    let rid = wv_assert_ok!(evl.register(&mut rec));
    let eid = wv_assert_ok!(evl.register(&mut echo));

    evl.post(Some(rid), eid, 10);
    evl.post(None, rid, 20);

    // the reply of echo is queued behind the already pending event
    while evl.process() {}
    wv_assert_eq!(t, *trace.lock().unwrap(), vec![
        ("echo", Some(rid), 10),
        ("rec", None, 20),
        ("rec", None, 11)
    ]);
}

fn register_full(t: &mut dyn WvTester) {
    let trace = Trace::default();
    let mut actors = (0..MAX_ACTORS + 1)
        .map(|_| Recorder::new("r", &trace))
        .collect::<Vec<_>>();
    let evl = EvLoop::new("test");

    let mut res = Vec::new();
    for a in actors.iter_mut() {
        res.push(evl.register(a));
    }

    wv_assert_eq!(t, res.iter().filter(|r| r.is_ok()).count(), MAX_ACTORS);
    wv_assert_err!(t, res.pop().unwrap(), Code::NoSpace);
}

fn queue_overflow(t: &mut dyn WvTester) {
    let trace = Trace::default();
    let mut a = Recorder::new("a", &trace);
    let evl = EvLoop::new("test");
    let aid = wv_assert_ok!(evl.register(&mut a));

    for i in 0..EV_QUEUE_LEN {
        evl.post(None, aid, i as Event);
    }

    let res = panic::catch_unwind(AssertUnwindSafe(|| evl.post(None, aid, 0xff)));
    wv_assert!(t, res.is_err());

    // the queue is still intact
    let mut count = 0;
    while evl.pending() {
        evl.process();
        count += 1;
    }
    wv_assert_eq!(t, count, EV_QUEUE_LEN);
    wv_assert_eq!(t, trace.lock().unwrap().last().map(|e| e.2), Some(EV_QUEUE_LEN as Event - 1));
}

fn invalid_events(t: &mut dyn WvTester) {
    let res = panic::catch_unwind(|| {
        invalid_event("actor", "Idle", 0x5);
    });
    wv_assert!(t, res.is_err());

    // an anonymous event is not valid for echo
    let trace = Trace::default();
    let mut echo = Echo { trace: &trace };
    let evl = EvLoop::new("test");
    let eid = wv_assert_ok!(evl.register(&mut echo));
    evl.post(None, eid, 1);
    let res = panic::catch_unwind(AssertUnwindSafe(|| evl.process()));
    wv_assert!(t, res.is_err());
}
