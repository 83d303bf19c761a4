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

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use base::errors::Code;
use base::kif::cmd::{Endpoint, Opcode, CMD_TIMEOUT_MS_RECV};
use base::kif::mboxmap::ChanPair;
use base::kif::{Comp, CpuGroup, Subsys};
use base::test::WvTester;
use base::time::Clock;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use event::{Actor, ActorId, EvLoop, Event};
use link::cmd::{Cmd, CmdQueue};
use link::{Link, Links, MboxDev, MboxLinkDev, MboxLinkPool, ShmBuf, ShmemLink};
use swtimer::{SwTimers, TimerKind};

use trch::boot::Boot;
use trch::config::{Config, LinkSet};
use trch::links::{LinkDevs, ShmPair, TrchLinks};
use trch::server::{Endpoints, Server};
use trch::syscfg::{RtpsMode, SysCfg};
use trch::systick::SysTick;
use trch::workloop::{Trch, TrchEnv};

use crate::sim::{self, bytes, words, HwOp, MockFs, MockHw, MockKick, Peer, Shared, SimMbox};

struct Counter<'t> {
    events: &'t Mutex<Vec<Event>>,
}

impl Actor for Counter<'_> {
    fn name(&self) -> &str {
        "counter"
    }

    fn handle(&mut self, _evl: &EvLoop<'_>, _sender: Option<ActorId>, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, startup_links);
    wv_run_test!(t, startup_links_missing_dev);
    wv_run_test!(t, start);
    wv_run_test!(t, start_without_wdt);
    wv_run_test!(t, boot_at_startup);
    wv_run_test!(t, systick_and_timers);
    wv_run_test!(t, tick_during_request);
    wv_run_test!(t, events);
    wv_run_test!(t, commands);
    wv_run_test!(t, reboot_failure);
}

fn boot_cfg(subsystems: Subsys) -> SysCfg {
    SysCfg {
        subsystems,
        ..SysCfg::default()
    }
}

fn startup_links(t: &mut dyn WvTester) {
    let hpps_dev = SimMbox::new(0x1000);
    let lsio_dev = SimMbox::new(0x2000);
    let (hpps_out, hpps_in) = (ShmBuf::new(), ShmBuf::new());
    let clock = Clock::new(1000);
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);

    let mut devs = LinkDevs::new(
        Some(&hpps_dev as &dyn MboxDev),
        Some(&lsio_dev as &dyn MboxDev),
    );
    devs.hpps_shm = Some(ShmPair {
        out: &hpps_out,
        inb: &hpps_in,
    });
    let cfg = Config {
        links: Config::default().links | LinkSet::HPPS_SHMEM,
        ..Config::default()
    };

    // split mode: one link per R52 core
    let tl = wv_assert_ok!(TrchLinks::init(&links, &cfg, RtpsMode::Split, &devs));
    wv_assert_eq!(t, links.len(), 7);
    wv_assert_eq!(t, hpps_dev.claimed(), 6);
    wv_assert_eq!(t, lsio_dev.claimed(), 6);
    wv_assert!(t, tl.hpps_shm_ssw.is_none());
    wv_assert!(t, tl.rtps_shm.iter().all(|l| l.is_none()));
    wv_assert_eq!(
        t,
        links.name(wv_assert_some!(tl.rtps_r52[1])),
        Ok("RTPS_R52_1_MBOX_LINK")
    );
    wv_assert_eq!(
        t,
        links.name(wv_assert_some!(tl.hpps_shm)),
        Ok("HPPS_SHMEM_LINK")
    );

    let ep = devs.endpoints();
    wv_assert!(t, ep.hpps.is_some() && ep.rtps.is_some());
}

fn startup_links_missing_dev(t: &mut dyn WvTester) {
    let hpps_dev = SimMbox::new(0x1000);
    let clock = Clock::new(1000);
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);

    let devs = LinkDevs::new(Some(&hpps_dev as &dyn MboxDev), None);
    let cfg = Config::default();
    wv_assert_err!(
        t,
        TrchLinks::init(&links, &cfg, RtpsMode::Lockstep, &devs),
        Code::NotSup
    );

    let cfg = Config {
        links: LinkSet::HPPS_SHMEM,
        ..Config::default()
    };
    wv_assert_err!(
        t,
        TrchLinks::init(&links, &cfg, RtpsMode::Lockstep, &devs),
        Code::NotSup
    );
}

fn start(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = boot_cfg(Subsys::HPPS | Subsys::RTPS_R52);
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let mut shw = Shared(&hw);

    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, None);

    wv_assert!(t, !trch.wdt_started());
    wv_assert_eq!(t, trch.start(), Ok(()));
    wv_assert!(t, trch.wdt_started());
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS | Subsys::RTPS_R52);
    wv_assert_eq!(t, hw.borrow().ops, vec![
        HwOp::InitGroup(CpuGroup::Trch),
        HwOp::Start(Comp::TRCH)
    ]);

    // a fatal error stops the watchdog before panicking
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        trch.panic("test", Code::InvState.into());
    }));
    wv_assert!(t, res.is_err());
    wv_assert!(t, !trch.wdt_started());
    wv_assert_eq!(t, hw.borrow().count(HwOp::Stop(Comp::TRCH)), 1);
}

fn start_without_wdt(t: &mut dyn WvTester) {
    let cfg = Config {
        trch_wdt: false,
        ..Config::default()
    };
    let syscfg = boot_cfg(Subsys::empty());
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let mut shw = Shared(&hw);

    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, None);

    wv_assert_eq!(t, trch.start(), Ok(()));
    wv_assert!(t, !trch.wdt_started());
    wv_assert!(t, !boot.pending());

    // nothing to do: the loop just waits
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    systick.tick();
    wv_assert_eq!(t, trch.iterations(), 1);
    wv_assert!(t, hw.borrow().ops.is_empty());
    wv_assert_eq!(t, kick.count(Comp::TRCH), 0);

    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        trch.panic("test", Code::InvState.into());
    }));
    wv_assert!(t, res.is_err());
    wv_assert!(t, hw.borrow().ops.is_empty());
}

fn boot_at_startup(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = SysCfg::load(&sim::syscfg_words(
        1 | ((Subsys::HPPS | Subsys::RTPS_A53).bits() << 4) | (4 << 8) | (1 << 13),
        0,
        &[],
        &["a53.bin"],
        &["hpps.bin"],
    ));
    let syscfg = wv_assert_ok!(syscfg);
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let fs = RefCell::new(MockFs::new(&["a53.bin", "hpps.bin"]));
    let mut shw = Shared(&hw);
    let mut sfs = Shared(&fs);

    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, Some(&mut sfs));

    wv_assert_eq!(t, trch.start(), Ok(()));
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert!(t, !boot.pending());

    // lowest subsystem first
    wv_assert_eq!(t, fs.borrow().loaded, vec!["a53.bin", "hpps.bin"]);
    let ops = hw.borrow().ops.clone();
    let a53 = ops.iter().position(|o| *o == HwOp::Release(Comp::RTPS_A53));
    let hpps = ops.iter().position(|o| *o == HwOp::Release(Comp::HPPS_0));
    wv_assert!(t, a53.is_some() && hpps.is_some() && a53 < hpps);
}

fn systick_and_timers(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = boot_cfg(Subsys::empty());
    let fired = Cell::new(0);
    let cb = |_: usize| fired.set(fired.get() + 1);
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let mut shw = Shared(&hw);

    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, None);
    wv_assert_eq!(t, trch.start(), Ok(()));

    // two system ticks per timer period
    wv_assert_ok!(timers.schedule(2 * cfg.systick_interval_ms, TimerKind::Periodic, &cb, 0));

    systick.tick();
    wv_assert_eq!(t, clock.now().as_raw(), cfg.systick_interval().as_raw());
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert_eq!(t, fired.get(), 0);

    systick.tick();
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert_eq!(t, fired.get(), 1);

    for _ in 0..4 {
        systick.tick();
        wv_assert_eq!(t, trch.iterate(), Ok(()));
    }
    wv_assert_eq!(t, fired.get(), 3);
    wv_assert_eq!(t, kick.count(Comp::TRCH), 6);
    wv_assert_eq!(t, trch.iterations(), 6);
    wv_assert_eq!(
        t,
        clock.now().as_raw(),
        cfg.systick_interval().as_raw() * 6
    );
}

fn tick_during_request(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = boot_cfg(Subsys::empty());
    let dev = SimMbox::new(0x1000);
    let mldev = MboxLinkDev::new(&dev, 0, 1);
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let mut shw = Shared(&hw);
    let chans = ChanPair { from: 12, to: 13 };
    let peer = Peer::new(&dev, &pool, &mldev, chans);
    let done = AtomicBool::new(false);

    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints {
        hpps: Some(mldev),
        rtps: None,
    });
    let mut trch = Trch::new(env, server, &mut shw, None);
    wv_assert_eq!(t, trch.start(), Ok(()));
    wv_assert!(t, trch.wdt_started());

    let connect = [
        u32::from(Opcode::MboxLinkConnect),
        u32::from(Endpoint::Hpps),
        chans.from,
        chans.to,
    ];
    wv_assert_ok!(cmdq.enqueue(Cmd::new(None, &connect)));
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert!(t, trch.server().conn(0).is_some());

    // the peer takes the ping, but never answers; the main loop waits for the reply while the
    // tick interrupt keeps advancing the clock and kicking the watchdog
    wv_assert_ok!(cmdq.enqueue(Cmd::new(None, &[u32::from(Opcode::MboxLinkPing), 0])));
    let start = clock.now();
    let (res, ticks) = thread::scope(|s| {
        s.spawn(|| peer.recv());
        let ticker = s.spawn(|| {
            let mut ticks = 0u64;
            while !done.load(Ordering::Acquire) {
                systick.tick();
                ticks += 1;
                thread::sleep(Duration::from_millis(1));
            }
            ticks
        });
        let res = trch.iterate();
        done.store(true, Ordering::Release);
        (res, ticker.join().unwrap())
    });
    wv_assert_eq!(t, res, Ok(()));
    wv_assert!(t, ticks > 0);
    wv_assert_eq!(t, kick.count(Comp::TRCH), ticks as usize);
    let waited = clock.now().duration_since(start);
    wv_assert_eq!(t, waited.as_raw(), cfg.systick_interval().as_raw() * ticks);
    wv_assert!(t, waited >= clock.ms_to_cycles(CMD_TIMEOUT_MS_RECV));

    // the failed ping leaves the link connected
    wv_assert!(t, trch.server().conn(0).is_some());
    wv_assert!(t, !cmdq.pending());
}

fn events(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = boot_cfg(Subsys::empty());
    let trace = Mutex::new(Vec::new());
    let mut counter = Counter { events: &trace };
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let mut shw = Shared(&hw);

    let id = wv_assert_ok!(evl.register(&mut counter));
    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, None);

    evl.post(None, id, 1);
    evl.post(None, id, 2);

    // one event per iteration
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert_eq!(t, *trace.lock().unwrap(), vec![1]);
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert_eq!(t, *trace.lock().unwrap(), vec![1, 2]);
    wv_assert!(t, !evl.pending());
}

fn commands(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = boot_cfg(Subsys::empty());
    let (to_peer, from_peer) = (ShmBuf::new(), ShmBuf::new());
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let peer = ShmemLink::new("HPPS", &from_peer, &to_peer, &clock);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw::default());
    let mut shw = Shared(&hw);

    wv_assert_ok!(links.connect_shmem("HPPS_SHMEM_LINK", &to_peer, &from_peer));
    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, None);
    let mut buf = [0u8; 64];

    // ping over the polled link
    wv_assert_eq!(t, peer.send(None, &bytes(&[u32::from(Opcode::Ping), 0x55])), Ok(8));
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    let n = wv_assert_ok!(peer.recv(&mut buf));
    wv_assert_eq!(t, words(&buf[..n])[..2], [u32::from(Opcode::Pong), 0x55]);

    // reboot requests are handled in the next iteration
    wv_assert_eq!(t, peer.send(None, &bytes(&[u32::from(Opcode::ResetHpps)])), Ok(4));
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS);
    let n = wv_assert_ok!(peer.recv(&mut buf));
    wv_assert_eq!(t, words(&buf[..n]), vec![0]);

    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert!(t, !boot.pending());
    wv_assert_eq!(t, hw.borrow().count(HwOp::Release(Comp::HPPS_0)), 1);

    // failing commands do not stop the loop
    wv_assert_eq!(t, peer.send(None, &bytes(&[0xdead])), Ok(4));
    wv_assert_eq!(t, trch.iterate(), Ok(()));
    wv_assert_eq!(t, peer.recv(&mut buf), Ok(0));
    wv_assert!(t, !cmdq.pending());
}

fn reboot_failure(t: &mut dyn WvTester) {
    let cfg = Config::default();
    let syscfg = boot_cfg(Subsys::HPPS);
    let clock = Clock::new(cfg.systick_clk_hz);
    let kick = MockKick::default();
    let systick = SysTick::new(&clock, cfg.systick_interval(), &kick);
    let timers: SwTimers<'_> = SwTimers::new(&clock);
    let evl = EvLoop::new("trch");
    let cmdq = CmdQueue::new();
    let pool = MboxLinkPool::new(&cmdq);
    let links: Links<'_> = Links::new(&pool, &clock);
    let boot = Boot::new();
    let hw = RefCell::new(MockHw {
        broken: Some(Comp::HPPS_0),
        ..MockHw::default()
    });
    let mut shw = Shared(&hw);

    let env = TrchEnv {
        cfg: &cfg,
        syscfg: &syscfg,
        timers: &timers,
        evl: &evl,
        cmdq: &cmdq,
        links: &links,
        boot: &boot,
        systick: &systick,
    };
    let server = Server::new(&links, &boot, Endpoints::default());
    let mut trch = Trch::new(env, server, &mut shw, None);

    wv_assert_eq!(t, trch.start(), Ok(()));
    wv_assert_err!(t, trch.iterate(), Code::ResetFailed);
    wv_assert!(t, !boot.pending());
    wv_assert!(t, trch.wdt_started());
}
