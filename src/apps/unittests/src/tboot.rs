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
use base::kif::{Comp, CpuGroup, Subsys};
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use trch::boot::Boot;
use trch::config::Config;
use trch::hw::{BlobStore, R52Mode};
use trch::syscfg::SysCfg;

use crate::sim::{self, syscfg_words, HwOp, MockFs, MockHw};

const SPLIT: u32 = 0;
const LOCKSTEP: u32 = 1;
const SMP: u32 = 2;
const LOAD_BINARIES: u32 = 1 << 13;

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, coalescing);
    wv_run_test!(t, invalid_subsystems);
    wv_run_test!(t, hpps_and_a53);
    wv_run_test!(t, r52_modes);
    wv_run_test!(t, r52_split_cores);
    wv_run_test!(t, load_images);
    wv_run_test!(t, load_failures);
    wv_run_test!(t, reset_failures);
}

fn reboot(
    boot: &Boot,
    subsys: Subsys,
    cfg: &Config,
    syscfg: &SysCfg,
    fs: Option<&mut MockFs>,
    hw: &mut MockHw,
) -> Result<(), Error> {
    boot.reboot(subsys, cfg, syscfg, fs.map(|fs| fs as &mut dyn BlobStore), hw)
}

fn sys_cfg(word0: u32) -> SysCfg {
    wv_assert_ok!(SysCfg::load(&syscfg_words(
        word0,
        0,
        &["r52-0.bin", "r52-1.bin"],
        &["a53.bin"],
        &["hpps-bl.bin", "hpps-fw.bin", "hpps-os.bin"]
    )))
}

fn coalescing(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let cfg = Config::default();
    let syscfg = SysCfg::default();
    let mut hw = MockHw::default();

    wv_assert!(t, !boot.pending());
    wv_assert_eq!(t, boot.handle(), None);

    boot.request(Subsys::HPPS);
    boot.request(Subsys::HPPS);
    boot.request(Subsys::RTPS_A53);
    wv_assert!(t, boot.pending());
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS | Subsys::RTPS_A53);

    // lowest subsystem first; handling does not consume the request
    wv_assert_eq!(t, boot.handle(), Some(Subsys::RTPS_A53));
    wv_assert_eq!(t, boot.handle(), Some(Subsys::RTPS_A53));
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_A53, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS);

    // the duplicate request resulted in a single reboot
    wv_assert_eq!(t, boot.handle(), Some(Subsys::HPPS));
    wv_assert_eq!(t, reboot(&boot, Subsys::HPPS, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, boot.handle(), None);
    wv_assert!(t, !boot.pending());
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::HPPS_0)), 1);
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::RTPS_A53)), 1);

    // multiple subsystems at once
    boot.request(Subsys::RTPS_R52 | Subsys::HPPS);
    wv_assert_eq!(t, boot.handle(), Some(Subsys::RTPS_R52));
}

fn invalid_subsystems(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let cfg = Config::default();
    let syscfg = SysCfg::default();
    let mut hw = MockHw::default();

    boot.request(Subsys::HPPS | Subsys::RTPS_A53);
    wv_assert_err!(
        t,
        reboot(&boot, Subsys::HPPS | Subsys::RTPS_A53, &cfg, &syscfg, None, &mut hw),
        Code::InvArgs
    );
    wv_assert_err!(t, reboot(&boot, Subsys::empty(), &cfg, &syscfg, None, &mut hw), Code::InvArgs);
    wv_assert_eq!(t, boot.pending_set(), Subsys::HPPS | Subsys::RTPS_A53);
    wv_assert!(t, hw.ops.is_empty());

    // the TRCH cannot reset itself
    boot.request(Subsys::TRCH);
    wv_assert_eq!(t, boot.handle(), Some(Subsys::TRCH));
    wv_assert_err!(t, reboot(&boot, Subsys::TRCH, &cfg, &syscfg, None, &mut hw), Code::InvArgs);
    wv_assert!(t, !boot.pending_set().contains(Subsys::TRCH));
    wv_assert!(t, hw.ops.is_empty());
}

fn hpps_and_a53(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let mut cfg = Config::default();
    let syscfg = SysCfg::default();

    let mut hw = MockHw::default();
    wv_assert_eq!(t, reboot(&boot, Subsys::HPPS, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::HPPS),
        HwOp::InitGroup(CpuGroup::Hpps),
        HwOp::Release(Comp::HPPS_0)
    ]);

    let mut hw = MockHw::default();
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_A53, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::RTPS_A53),
        HwOp::InitGroup(CpuGroup::RtpsA53),
        HwOp::Release(Comp::RTPS_A53)
    ]);

    // without watchdogs
    cfg.hpps_wdt = false;
    cfg.rtps_a53_wdt = false;
    let mut hw = MockHw::default();
    wv_assert_eq!(t, reboot(&boot, Subsys::HPPS, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_A53, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::HPPS),
        HwOp::Release(Comp::HPPS_0),
        HwOp::Assert(Comp::RTPS_A53),
        HwOp::Release(Comp::RTPS_A53)
    ]);
}

fn r52_modes(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let mut cfg = Config::default();

    let mut hw = MockHw::default();
    let syscfg = sys_cfg(LOCKSTEP);
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::RTPS_R52),
        HwOp::InitGroup(CpuGroup::RtpsR52_0),
        HwOp::R52Mode(R52Mode::Lockstep),
        HwOp::Release(Comp::RTPS_R52_0)
    ]);

    // SMP runs the cluster in split mode and starts core 0 only
    let mut hw = MockHw::default();
    let syscfg = sys_cfg(SMP);
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::RTPS_R52),
        HwOp::InitGroup(CpuGroup::RtpsR52),
        HwOp::R52Mode(R52Mode::Split),
        HwOp::Release(Comp::RTPS_R52_0)
    ]);

    cfg.rtps_r52_wdt = false;
    let mut hw = MockHw::default();
    let syscfg = sys_cfg(LOCKSTEP);
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::RTPS_R52),
        HwOp::R52Mode(R52Mode::Lockstep),
        HwOp::Release(Comp::RTPS_R52_0)
    ]);
}

fn r52_split_cores(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let cfg = Config::default();

    let mut hw = MockHw::default();
    let syscfg = sys_cfg(SPLIT | (0b11 << 2));
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::RTPS_R52),
        HwOp::R52Mode(R52Mode::Split),
        HwOp::InitGroup(CpuGroup::RtpsR52_0),
        HwOp::Release(Comp::RTPS_R52_0),
        HwOp::InitGroup(CpuGroup::RtpsR52_1),
        HwOp::Release(Comp::RTPS_R52_1)
    ]);

    let mut hw = MockHw::default();
    let syscfg = sys_cfg(SPLIT | (0b10 << 2));
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.ops, vec![
        HwOp::Assert(Comp::RTPS_R52),
        HwOp::R52Mode(R52Mode::Split),
        HwOp::InitGroup(CpuGroup::RtpsR52_1),
        HwOp::Release(Comp::RTPS_R52_1)
    ]);

    // no cores selected
    let mut hw = MockHw::default();
    let syscfg = sys_cfg(SPLIT);
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::RTPS_R52_0)), 0);
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::RTPS_R52_1)), 0);
}

fn load_images(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let cfg = Config::default();
    let mut hw = MockHw::default();
    let mut fs = MockFs::new(&["hpps-bl.bin", "hpps-fw.bin", "hpps-os.bin", "a53.bin"]);

    let syscfg = sys_cfg(LOCKSTEP | LOAD_BINARIES);
    wv_assert_eq!(t, reboot(&boot, Subsys::HPPS, &cfg, &syscfg, Some(&mut fs), &mut hw), Ok(()));
    wv_assert_eq!(t, fs.loaded, vec!["hpps-bl.bin", "hpps-fw.bin", "hpps-os.bin"]);
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::HPPS_0)), 1);

    // images are not loaded if they are already in place
    fs.loaded.clear();
    let syscfg = sys_cfg(LOCKSTEP);
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_A53, &cfg, &syscfg, Some(&mut fs), &mut hw), Ok(()));
    wv_assert!(t, fs.loaded.is_empty());

    // or if there is no file system
    let syscfg = sys_cfg(LOCKSTEP | LOAD_BINARIES);
    wv_assert_eq!(t, reboot(&boot, Subsys::RTPS_A53, &cfg, &syscfg, None, &mut hw), Ok(()));
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::RTPS_A53)), 2);
}

fn load_failures(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let cfg = Config::default();
    let mut hw = MockHw::default();
    let mut fs = MockFs::new(&["hpps-bl.bin", "hpps-os.bin"]);
    let syscfg = sys_cfg(LOCKSTEP | LOAD_BINARIES);

    // the first failing image ends the load phase, but the subsystem is reset anyway
    boot.request(Subsys::HPPS);
    wv_assert_err!(
        t,
        reboot(&boot, Subsys::HPPS, &cfg, &syscfg, Some(&mut fs), &mut hw),
        Code::LoadFailed
    );
    wv_assert_eq!(t, fs.loaded, vec!["hpps-bl.bin"]);
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::HPPS_0)), 1);
    wv_assert!(t, !boot.pending());

    // the request can be repeated
    fs.files.push("hpps-fw.bin");
    fs.loaded.clear();
    boot.request(Subsys::HPPS);
    wv_assert_eq!(t, reboot(&boot, Subsys::HPPS, &cfg, &syscfg, Some(&mut fs), &mut hw), Ok(()));
    wv_assert_eq!(t, fs.loaded.len(), 3);
    wv_assert!(t, !boot.pending());
}

fn reset_failures(t: &mut dyn WvTester) {
    let boot = Boot::new();
    let cfg = Config::default();
    let mut fs = MockFs::new(&["a53.bin"]);
    let syscfg = sys_cfg(LOCKSTEP | LOAD_BINARIES);
    let mut hw = MockHw {
        broken: Some(Comp::RTPS_A53 | Comp::RTPS_R52_0),
        ..MockHw::default()
    };

    boot.request(Subsys::RTPS_A53 | Subsys::RTPS_R52);
    wv_assert_err!(
        t,
        reboot(&boot, Subsys::RTPS_A53, &cfg, &syscfg, Some(&mut fs), &mut hw),
        Code::ResetFailed
    );
    wv_assert_eq!(t, fs.loaded, vec!["a53.bin"]);
    wv_assert_eq!(t, boot.pending_set(), Subsys::RTPS_R52);

    // if loading and resetting fail, the load failure is reported
    wv_assert_err!(
        t,
        reboot(&boot, Subsys::RTPS_R52, &cfg, &syscfg, Some(&mut fs), &mut hw),
        Code::LoadFailed
    );
    wv_assert!(t, !boot.pending());
    wv_assert_eq!(t, hw.count(HwOp::Release(Comp::RTPS_R52_0)), 1);
}
