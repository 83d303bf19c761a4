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

//! The links the TRCH serves
//!
//! Which links exist is decided at startup from the build configuration and the topology of the
//! R52 cluster. The channels and interrupts come from the chiplet-wide mailbox map.

use base::errors::{Code, Error};
use base::kif::mboxmap::{hpps, lsio, ChanPair};
use base::kif::{owner, SwComp, SwSubsys};

use link::{LinkId, Links, MboxDev, MboxLinkDev, MboxLinkParams, Role, ShmBuf};

use crate::config::{Config, LinkSet};
use crate::server::Endpoints;
use crate::syscfg::RtpsMode;

/// The number of R52 logical subsystems that can exist at the same time
pub const RTPS_R52_MAX_SUBSYS: usize = 2;

/// A pair of buffers in shared memory
#[derive(Copy, Clone)]
pub struct ShmPair<'a> {
    /// The buffer the TRCH writes to
    pub out: &'a ShmBuf,
    /// The buffer the TRCH reads from
    pub inb: &'a ShmBuf,
}

/// The hardware the links are built on; missing entries are not present on this platform
#[derive(Copy, Clone, Default)]
pub struct LinkDevs<'a> {
    pub hpps_mbox: Option<MboxLinkDev<'a>>,
    pub lsio_mbox: Option<MboxLinkDev<'a>>,
    pub hpps_shm: Option<ShmPair<'a>>,
    pub hpps_shm_ssw: Option<ShmPair<'a>>,
    pub rtps_shm: [Option<ShmPair<'a>>; RTPS_R52_MAX_SUBSYS],
}

impl<'a> LinkDevs<'a> {
    /// Uses the given mailbox blocks with the interrupts that are assigned to the TRCH
    pub fn new(hpps_mbox: Option<&'a dyn MboxDev>, lsio_mbox: Option<&'a dyn MboxDev>) -> Self {
        Self {
            hpps_mbox: hpps_mbox
                .map(|d| MboxLinkDev::new(d, hpps::INT_EVT0_TRCH_SSW, hpps::INT_EVT1_TRCH_SSW)),
            lsio_mbox: lsio_mbox
                .map(|d| MboxLinkDev::new(d, lsio::INT_EVT0_TRCH_SSW, lsio::INT_EVT1_TRCH_SSW)),
            ..Self::default()
        }
    }

    /// Returns the mailbox blocks on which the command server can connect links
    pub fn endpoints(&self) -> Endpoints<'a> {
        Endpoints {
            hpps: self.hpps_mbox,
            rtps: self.lsio_mbox,
        }
    }
}

/// The links connected at startup
#[derive(Debug, Default)]
pub struct TrchLinks {
    pub hpps_ssw: Option<LinkId>,
    pub hpps: Option<LinkId>,
    pub hpps_atf: Option<LinkId>,
    pub rtps_r52: [Option<LinkId>; RTPS_R52_MAX_SUBSYS],
    pub rtps_a53_psci: Option<LinkId>,
    pub hpps_shm: Option<LinkId>,
    pub hpps_shm_ssw: Option<LinkId>,
    pub rtps_shm: [Option<LinkId>; RTPS_R52_MAX_SUBSYS],
}

struct MboxSpec {
    name: &'static str,
    chans: ChanPair,
    client: (SwSubsys, SwComp),
}

impl MboxSpec {
    const fn new(name: &'static str, chans: ChanPair, subsys: SwSubsys, comp: SwComp) -> Self {
        Self {
            name,
            chans,
            client: (subsys, comp),
        }
    }
}

static HPPS_SSW: MboxSpec = MboxSpec::new(
    "HPPS_MBOX_SSW_LINK",
    hpps::CHAN_HPPS_SMP_SSW,
    SwSubsys::HppsSmp,
    SwComp::Ssw,
);
static HPPS_APP: MboxSpec = MboxSpec::new(
    "HPPS_MBOX_LINK",
    hpps::CHAN_HPPS_SMP_APP,
    SwSubsys::HppsSmp,
    SwComp::App,
);
static HPPS_ATF: MboxSpec = MboxSpec::new(
    "HPPS_MBOX_ATF_LINK",
    hpps::CHAN_HPPS_SMP_ATF,
    SwSubsys::HppsSmp,
    SwComp::Atf,
);
static RTPS_R52_LOCKSTEP: MboxSpec = MboxSpec::new(
    "RTPS_R52_LOCKSTEP_MBOX_LINK",
    lsio::CHAN_RTPS_R52_LOCKSTEP_SSW,
    SwSubsys::RtpsR52Lockstep,
    SwComp::Ssw,
);
static RTPS_R52_SMP: MboxSpec = MboxSpec::new(
    "RTPS_R52_SMP_MBOX_LINK",
    lsio::CHAN_RTPS_R52_SMP_SSW,
    SwSubsys::RtpsR52Smp,
    SwComp::Ssw,
);
static RTPS_R52_SPLIT: [MboxSpec; RTPS_R52_MAX_SUBSYS] = [
    MboxSpec::new(
        "RTPS_R52_0_MBOX_LINK",
        lsio::CHAN_RTPS_R52_SPLIT_0_SSW,
        SwSubsys::RtpsR52Split0,
        SwComp::Ssw,
    ),
    MboxSpec::new(
        "RTPS_R52_1_MBOX_LINK",
        lsio::CHAN_RTPS_R52_SPLIT_1_SSW,
        SwSubsys::RtpsR52Split1,
        SwComp::Ssw,
    ),
];
static RTPS_A53_PSCI: MboxSpec = MboxSpec::new(
    "RTPS_A53_PSCI_MBOX_LINK",
    lsio::CHAN_RTPS_A53_ATF,
    SwSubsys::RtpsA53,
    SwComp::Atf,
);

const RTPS_R52_SHM_NAMES: [&str; RTPS_R52_MAX_SUBSYS] = [
    "RTPS_R52_SPLIT_0_SSW_SHMEM_LINK",
    "RTPS_R52_SPLIT_1_SSW_SHMEM_LINK",
];

impl TrchLinks {
    /// Connects the links enabled in `cfg`
    ///
    /// The R52 cluster gets one link per logical subsystem, which depends on `rtps_mode`. A link
    /// that cannot be connected is an error the firmware cannot continue from.
    pub fn init<'a>(
        links: &Links<'a>,
        cfg: &Config,
        rtps_mode: RtpsMode,
        devs: &LinkDevs<'a>,
    ) -> Result<Self, Error> {
        let mut tl = Self::default();
        let set = cfg.links;

        if set.contains(LinkSet::HPPS_MBOX_SSW) {
            tl.hpps_ssw = Some(Self::connect_mbox(links, devs.hpps_mbox, &HPPS_SSW)?);
        }
        if set.contains(LinkSet::HPPS_MBOX) {
            tl.hpps = Some(Self::connect_mbox(links, devs.hpps_mbox, &HPPS_APP)?);
        }
        if set.contains(LinkSet::HPPS_MBOX_ATF) {
            tl.hpps_atf = Some(Self::connect_mbox(links, devs.hpps_mbox, &HPPS_ATF)?);
        }

        let r52_subsys = match rtps_mode {
            RtpsMode::Lockstep | RtpsMode::Smp => 1,
            RtpsMode::Split => RTPS_R52_MAX_SUBSYS,
        };
        if set.contains(LinkSet::RTPS_MBOX) {
            for i in 0..r52_subsys {
                let spec = match rtps_mode {
                    RtpsMode::Lockstep => &RTPS_R52_LOCKSTEP,
                    RtpsMode::Smp => &RTPS_R52_SMP,
                    RtpsMode::Split => &RTPS_R52_SPLIT[i],
                };
                tl.rtps_r52[i] = Some(Self::connect_mbox(links, devs.lsio_mbox, spec)?);
            }
        }
        if set.contains(LinkSet::RTPS_SHMEM) {
            for i in 0..r52_subsys {
                let name = match rtps_mode {
                    RtpsMode::Lockstep => "RTPS_R52_LOCKSTEP_SSW_SHMEM_LINK",
                    RtpsMode::Smp => "RTPS_R52_SMP_SSW_SHMEM_LINK",
                    RtpsMode::Split => RTPS_R52_SHM_NAMES[i],
                };
                tl.rtps_shm[i] = Some(Self::connect_shmem(links, devs.rtps_shm[i], name)?);
            }
        }

        if set.contains(LinkSet::RTPS_MBOX_PSCI) {
            tl.rtps_a53_psci = Some(Self::connect_mbox(links, devs.lsio_mbox, &RTPS_A53_PSCI)?);
        }
        if set.contains(LinkSet::HPPS_SHMEM) {
            tl.hpps_shm = Some(Self::connect_shmem(links, devs.hpps_shm, "HPPS_SHMEM_LINK")?);
        }
        if set.contains(LinkSet::HPPS_SHMEM_SSW) {
            tl.hpps_shm_ssw = Some(Self::connect_shmem(
                links,
                devs.hpps_shm_ssw,
                "HPPS_SHMEM_SSW_LINK",
            )?);
        }

        tlog!(TrchLinks, "links: connected {} links", links.len());
        Ok(tl)
    }

    fn connect_mbox<'a>(
        links: &Links<'a>,
        dev: Option<MboxLinkDev<'a>>,
        spec: &MboxSpec,
    ) -> Result<LinkId, Error> {
        let dev = dev.ok_or_else(|| {
            tlog!(Error, "links: {}: no mailbox device", spec.name);
            Error::new(Code::NotSup)
        })?;

        let params = MboxLinkParams {
            name: spec.name,
            chans: spec.chans,
            role: Role::Server,
            server: owner(SwSubsys::Trch, SwComp::Ssw),
            client: owner(spec.client.0, spec.client.1),
        };
        links.connect_mbox(dev, &params).map_err(|e| {
            tlog!(Error, "links: {}: connect failed: {}", spec.name, e);
            e
        })
    }

    fn connect_shmem<'a>(
        links: &Links<'a>,
        bufs: Option<ShmPair<'a>>,
        name: &'static str,
    ) -> Result<LinkId, Error> {
        let bufs = bufs.ok_or_else(|| {
            tlog!(Error, "links: {}: no shared memory", name);
            Error::new(Code::NotSup)
        })?;

        links.connect_shmem(name, bufs.out, bufs.inb).map_err(|e| {
            tlog!(Error, "links: {}: connect failed: {}", name, e);
            e
        })
    }
}
