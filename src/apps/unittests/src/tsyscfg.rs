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

use base::errors::Code;
use base::kif::Subsys;
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use trch::syscfg::{MemDev, RtpsMode, SysCfg, MAX_BLOBS, SYSCFG_WORDS};

use crate::sim::{self, syscfg_words};

const SPLIT: u32 = 0;
const LOCKSTEP: u32 = 1;
const SMP: u32 = 2;
const CORES_SHIFT: u32 = 2;
const SUBSYS_SHIFT: u32 = 4;
const ROOTFS_SHIFT: u32 = 8;
const HAVE_SFS_OFFSET: u32 = 1 << 12;
const LOAD_BINARIES: u32 = 1 << 13;
const RIO_MASTER: u32 = 1 << 14;
const TEST_RIO_ONCHIP: u32 = 1 << 15;
const TEST_RIO_OFFCHIP: u32 = 1 << 16;

pub fn run(t: &mut dyn WvTester) {
    sim::init_log();
    wv_run_test!(t, fields);
    wv_run_test!(t, flags);
    wv_run_test!(t, invalid_fields);
    wv_run_test!(t, blob_lists);
    wv_run_test!(t, blob_overflow);
    wv_run_test!(t, defaults);
}

fn fields(t: &mut dyn WvTester) {
    let word0 = SPLIT
        | (0b10 << CORES_SHIFT)
        | ((Subsys::RTPS_R52 | Subsys::HPPS).bits() << SUBSYS_SHIFT)
        | (u32::from(MemDev::HppsSmcNand) << ROOTFS_SHIFT);
    let words = syscfg_words(word0, 0x1000, &[], &[], &[]);
    let cfg = wv_assert_ok!(SysCfg::load(&words));

    wv_assert_eq!(t, cfg.rtps_mode, RtpsMode::Split);
    wv_assert_eq!(t, cfg.rtps_cores, 0b10);
    wv_assert_eq!(t, cfg.subsystems, Subsys::RTPS_R52 | Subsys::HPPS);
    wv_assert_eq!(t, cfg.hpps_rootfs_loc, MemDev::HppsSmcNand);
    wv_assert_eq!(t, cfg.sfs_offset, 0x1000);
    wv_assert!(t, !cfg.have_sfs_offset);
    wv_assert!(t, !cfg.load_binaries);
    wv_assert!(t, !cfg.rio_master);

    for (mode, exp) in [
        (SPLIT, RtpsMode::Split),
        (LOCKSTEP, RtpsMode::Lockstep),
        (SMP, RtpsMode::Smp),
    ] {
        let cfg = wv_assert_ok!(SysCfg::load(&syscfg_words(mode, 0, &[], &[], &[])));
        wv_assert_eq!(t, cfg.rtps_mode, exp);
    }

    // additional words are ignored
    let mut long = words.to_vec();
    long.push(0xffff_ffff);
    let cfg = wv_assert_ok!(SysCfg::load(&long));
    wv_assert_eq!(t, cfg.sfs_offset, 0x1000);
}

fn flags(t: &mut dyn WvTester) {
    let word0 = LOCKSTEP
        | (u32::from(MemDev::HppsDram) << ROOTFS_SHIFT)
        | HAVE_SFS_OFFSET
        | LOAD_BINARIES
        | RIO_MASTER
        | TEST_RIO_ONCHIP
        | TEST_RIO_OFFCHIP;
    let cfg = wv_assert_ok!(SysCfg::load(&syscfg_words(word0, 0, &[], &[], &[])));
    wv_assert!(t, cfg.have_sfs_offset);
    wv_assert!(t, cfg.load_binaries);
    wv_assert!(t, cfg.rio_master);
    wv_assert!(t, cfg.test_rio_onchip);
    wv_assert!(t, cfg.test_rio_offchip);
    wv_assert_eq!(t, cfg.subsystems, Subsys::empty());

    let cfg = wv_assert_ok!(SysCfg::load(&syscfg_words(LOAD_BINARIES, 0, &[], &[], &[])));
    wv_assert!(t, cfg.load_binaries);
    wv_assert!(t, !cfg.have_sfs_offset);
    wv_assert!(t, !cfg.rio_master);
}

fn invalid_fields(t: &mut dyn WvTester) {
    let words = syscfg_words(LOCKSTEP, 0, &[], &[], &[]);
    wv_assert_err!(t, SysCfg::load(&words[..SYSCFG_WORDS - 1]), Code::InvArgs);
    wv_assert_err!(t, SysCfg::load(&[]), Code::InvArgs);

    // mode 3 does not exist
    let words = syscfg_words(3, 0, &[], &[], &[]);
    wv_assert_err!(t, SysCfg::load(&words), Code::InvArgs);

    let words = syscfg_words(LOCKSTEP | (9 << ROOTFS_SHIFT), 0, &[], &[], &[]);
    wv_assert_err!(t, SysCfg::load(&words), Code::InvArgs);
}

fn blob_lists(t: &mut dyn WvTester) {
    let words = syscfg_words(
        LOCKSTEP,
        0,
        &["rtps-bl.bin", "rtps-os.bin"],
        &["atf.bin"],
        &["hpps-bl.bin", "dtb.bin", "kernel.bin", "initrd.bin"],
    );
    let cfg = wv_assert_ok!(SysCfg::load(&words));

    wv_assert_eq!(t, cfg.rtps_r52_blobs.iter().collect::<Vec<_>>(), vec![
        "rtps-bl.bin",
        "rtps-os.bin"
    ]);
    wv_assert_eq!(t, cfg.rtps_a53_blobs.len(), 1);
    wv_assert_eq!(t, cfg.rtps_a53_blobs.get(0), Some("atf.bin"));
    wv_assert_eq!(t, cfg.rtps_a53_blobs.get(1), None);
    wv_assert_eq!(t, cfg.hpps_blobs.len(), 4);
    wv_assert_eq!(t, cfg.hpps_blobs.get(3), Some("initrd.bin"));
    wv_assert_eq!(
        t,
        format!("{}", cfg.rtps_r52_blobs),
        "rtps-bl.bin rtps-os.bin "
    );

    let hpps = wv_assert_some!(cfg.blobs(Subsys::HPPS));
    wv_assert_eq!(t, hpps.get(0), Some("hpps-bl.bin"));
    let a53 = wv_assert_some!(cfg.blobs(Subsys::RTPS_A53));
    wv_assert_eq!(t, a53.get(0), Some("atf.bin"));
    let r52 = wv_assert_some!(cfg.blobs(Subsys::RTPS_R52));
    wv_assert_eq!(t, r52.get(1), Some("rtps-os.bin"));
    wv_assert!(t, cfg.blobs(Subsys::TRCH).is_none());
    wv_assert!(t, cfg.blobs(Subsys::HPPS | Subsys::RTPS_A53).is_none());
}

fn blob_overflow(t: &mut dyn WvTester) {
    // 8 names of 7 characters fill the area, leaving no room for the terminating empty name
    let names = ["aaaaaaa"; 8];
    let words = syscfg_words(LOCKSTEP, 0, &[], &names, &[]);
    wv_assert_err!(t, SysCfg::load(&words), Code::NoSpace);

    // a name without NUL at the end of the area
    let long = ["0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdefXX"];
    let words = syscfg_words(LOCKSTEP, 0, &long, &[], &[]);
    wv_assert_err!(t, SysCfg::load(&words), Code::NoSpace);

    // too many names
    let names = ["a"; MAX_BLOBS + 1];
    let words = syscfg_words(LOCKSTEP, 0, &[], &[], &names);
    wv_assert_err!(t, SysCfg::load(&words), Code::NoSpace);

    // the maximum number of names is fine
    let names = ["b"; MAX_BLOBS];
    let words = syscfg_words(LOCKSTEP, 0, &[], &[], &names);
    let cfg = wv_assert_ok!(SysCfg::load(&words));
    wv_assert_eq!(t, cfg.hpps_blobs.len(), MAX_BLOBS);

    // names have to be UTF-8
    let mut words = syscfg_words(LOCKSTEP, 0, &["abc"], &[], &[]);
    words[2] = 0x00ff_ff61;
    wv_assert_err!(t, SysCfg::load(&words), Code::InvArgs);
}

fn defaults(t: &mut dyn WvTester) {
    let cfg = SysCfg::default();
    wv_assert_eq!(t, cfg.rtps_mode, RtpsMode::Lockstep);
    wv_assert_eq!(t, cfg.subsystems, Subsys::empty());
    wv_assert_eq!(t, cfg.hpps_rootfs_loc, MemDev::HppsDram);
    wv_assert!(t, !cfg.load_binaries);
    wv_assert!(t, cfg.rtps_r52_blobs.is_empty());
    wv_assert!(t, cfg.blobs(Subsys::HPPS).map_or(false, |b| b.is_empty()));
}
