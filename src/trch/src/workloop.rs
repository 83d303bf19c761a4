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

//! The main loop of the TRCH

use base::cpu;
use base::errors::Error;
use base::kif::{Comp, CpuGroup};

use event::EvLoop;
use link::cmd::{self, CmdQueue};
use link::Links;
use swtimer::SwTimers;

use crate::boot::Boot;
use crate::config::Config;
use crate::hw::{BlobStore, Hw};
use crate::server::Server;
use crate::syscfg::SysCfg;
use crate::systick::SysTick;

/// The objects the main loop works on, which are shared with interrupt handlers and actors
#[derive(Copy, Clone)]
pub struct TrchEnv<'a> {
    pub cfg: &'a Config,
    pub syscfg: &'a SysCfg,
    pub timers: &'a SwTimers<'a>,
    pub evl: &'a EvLoop<'a>,
    pub cmdq: &'a CmdQueue,
    pub links: &'a Links<'a>,
    pub boot: &'a Boot,
    pub systick: &'a SysTick<'a>,
}

/// The state of the TRCH firmware
pub struct Trch<'a> {
    env: TrchEnv<'a>,
    server: Server<'a>,
    hw: &'a mut dyn Hw,
    fs: Option<&'a mut dyn BlobStore>,
    iter: u32,
}

impl<'a> Trch<'a> {
    pub fn new(
        env: TrchEnv<'a>,
        server: Server<'a>,
        hw: &'a mut dyn Hw,
        fs: Option<&'a mut dyn BlobStore>,
    ) -> Self {
        Self {
            env,
            server,
            hw,
            fs,
            iter: 0,
        }
    }

    pub fn env(&self) -> &TrchEnv<'a> {
        &self.env
    }

    pub fn server(&self) -> &Server<'a> {
        &self.server
    }

    /// Returns the number of main loop iterations so far
    pub fn iterations(&self) -> u32 {
        self.iter
    }

    /// Returns true if the watchdog of the TRCH is running
    pub fn wdt_started(&self) -> bool {
        self.env.systick.wdt_started()
    }

    /// Requests the boot of the configured subsystems and starts the TRCH watchdog
    pub fn start(&mut self) -> Result<(), Error> {
        self.env.boot.request(self.env.syscfg.subsystems);

        if self.env.cfg.trch_wdt {
            self.hw.init_group(CpuGroup::Trch)?;
            self.hw.start(Comp::TRCH)?;
            self.env.systick.set_wdt_started(true);
        }
        Ok(())
    }

    /// Performs one iteration of the main loop
    ///
    /// Sleeps until the next interrupt at the end if there is no more work to do.
    pub fn iterate(&mut self) -> Result<(), Error> {
        let env = self.env;
        let mut verbose = self.iter % env.cfg.main_loop_silent_iters.max(1) == 0;
        self.iter = self.iter.wrapping_add(1);
        if verbose {
            tlog!(TrchMain, "main: loop");
        }

        env.timers.run();

        while let Some(subsys) = env.boot.handle() {
            let fs = self.fs.as_mut().map(|fs| &mut **fs as &mut dyn BlobStore);
            env.boot.reboot(subsys, env.cfg, env.syscfg, fs, &mut *self.hw)?;
            verbose = true;
        }

        // only one event per iteration to not delay the other work
        if env.evl.pending() {
            env.evl.process();
            verbose = true;
        }

        env.links.poll(env.cmdq)?;

        while let Some(c) = env.cmdq.dequeue() {
            if let Err(e) = cmd::handle(env.links, &mut self.server, &c) {
                tlog!(Error, "main: command {:?} failed: {}", c, e);
            }
            verbose = true;
        }

        // the check and the WFI have to be atomic
        cpu::int_disable();
        if !env.cmdq.pending() && !env.boot.pending() && !env.evl.pending() {
            if verbose {
                tlog!(TrchMain, "main: [{}] waiting for interrupt...", self.iter);
            }
            cpu::wait_for_interrupt();
        }
        cpu::int_enable();
        Ok(())
    }

    /// Runs the main loop forever
    pub fn run(&mut self) -> ! {
        loop {
            if let Err(e) = self.iterate() {
                self.panic("main loop", e);
            }
        }
    }

    /// Stops the TRCH watchdog, so that it does not hide the cause, and panics
    pub fn panic(&mut self, what: &str, e: Error) -> ! {
        if self.wdt_started() {
            self.env.systick.set_wdt_started(false);
            self.hw.stop(Comp::TRCH).ok();
        }
        panic!("TRCH: {} failed: {}", what, e);
    }
}
