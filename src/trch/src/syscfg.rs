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

//! The system boot configuration
//!
//! The configuration is written into non-volatile memory by an external tool and loaded once at
//! startup. It is a flat array of words:
//!
//! | Word    | Content                                                   |
//! |---------|-----------------------------------------------------------|
//! | 0       | bit fields (see below)                                    |
//! | 1       | offset of the simple file system in bytes                 |
//! | 2..18   | names of the images to load for the R52 cluster           |
//! | 18..34  | names of the images to load for the A53 core              |
//! | 34..50  | names of the images to load for the HPPS                  |
//!
//! Word 0 contains the R52 topology (bits 0-1), the mask of active R52 cores (bits 2-3), the
//! subsystems to boot (bits 4-7), the location of the HPPS root file system (bits 8-11) and the
//! flags have-sfs-offset (12), load-binaries (13), rio-master (14), test-rio-onchip (15) and
//! test-rio-offchip (16). Image names are NUL-terminated; the list ends with an empty name.

use core::fmt;
use core::str;

use base::errors::{Code, Error};
use base::kif::Subsys;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The number of words of the configuration
pub const SYSCFG_WORDS: usize = 50;

/// The size of the area for the image names of one subsystem in bytes
pub const BLOB_LIST_SIZE: usize = BLOB_LIST_WORDS * 4;
/// The maximum number of images per subsystem
pub const MAX_BLOBS: usize = 8;

const BLOB_LIST_WORDS: usize = 16;

const WORD_FIELDS: usize = 0;
const WORD_SFS_OFFSET: usize = 1;
const WORD_RTPS_R52_BLOBS: usize = 2;
const WORD_RTPS_A53_BLOBS: usize = WORD_RTPS_R52_BLOBS + BLOB_LIST_WORDS;
const WORD_HPPS_BLOBS: usize = WORD_RTPS_A53_BLOBS + BLOB_LIST_WORDS;

struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    fn get(&self, word: u32) -> u32 {
        (word >> self.shift) & ((1 << self.width) - 1)
    }

    fn is_set(&self, word: u32) -> bool {
        self.get(word) != 0
    }
}

const RTPS_MODE: Field = Field::new(0, 2);
const RTPS_CORES: Field = Field::new(2, 2);
const SUBSYS: Field = Field::new(4, 4);
const HPPS_ROOTFS_LOC: Field = Field::new(8, 4);
const HAVE_SFS_OFFSET: Field = Field::new(12, 1);
const LOAD_BINARIES: Field = Field::new(13, 1);
const RIO_MASTER: Field = Field::new(14, 1);
const TEST_RIO_ONCHIP: Field = Field::new(15, 1);
const TEST_RIO_OFFCHIP: Field = Field::new(16, 1);

/// The topology of the R52 cluster
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum RtpsMode {
    /// Both cores run independently
    Split = 0,
    /// Both cores execute the same instructions, the second one checking the first one
    Lockstep = 1,
    /// Both cores run one software stack
    Smp = 2,
}

/// The memory devices a root file system can be located in
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum MemDev {
    TrchSmcSram = 0,
    TrchSmcNand,
    HppsSmcSram,
    HppsSmcNand,
    HppsDram,
    RtpsDram,
    RtpsTcm,
    TrchSram,
}

/// The list of image names for one subsystem
#[derive(Copy, Clone)]
pub struct BlobList {
    raw: [u8; BLOB_LIST_SIZE],
    // offset and length of the names in `raw`
    names: [(u8, u8); MAX_BLOBS],
    count: usize,
}

impl BlobList {
    /// Creates an empty list
    pub const fn new() -> Self {
        Self {
            raw: [0; BLOB_LIST_SIZE],
            names: [(0, 0); MAX_BLOBS],
            count: 0,
        }
    }

    fn parse(words: &[u32]) -> Result<Self, Error> {
        let mut list = Self::new();
        for (chunk, w) in list.raw.chunks_mut(4).zip(words) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }

        let mut pos = 0;
        loop {
            match list.raw.get(pos) {
                // the terminating empty name does not fit anymore
                None => return Err(Error::new(Code::NoSpace)),
                Some(0) => break,
                Some(_) => {},
            }

            let len = list.raw[pos..]
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| Error::new(Code::NoSpace))?;
            if list.count == MAX_BLOBS {
                return Err(Error::new(Code::NoSpace));
            }
            str::from_utf8(&list.raw[pos..pos + len]).map_err(|_| Error::new(Code::InvArgs))?;

            list.names[list.count] = (pos as u8, len as u8);
            list.count += 1;
            pos += len + 1;
        }
        Ok(list)
    }

    /// Returns the number of names
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the list has no names
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the name at index `idx`
    pub fn get(&self, idx: usize) -> Option<&str> {
        if idx >= self.count {
            return None;
        }
        let (off, len) = self.names[idx];
        let (off, len) = (off as usize, len as usize);
        str::from_utf8(&self.raw[off..off + len]).ok()
    }

    /// Returns an iterator over the names in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        (0..self.count).filter_map(move |i| self.get(i))
    }
}

impl Default for BlobList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlobList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for BlobList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.iter() {
            write!(f, "{} ", name)?;
        }
        Ok(())
    }
}

/// The system boot configuration
#[derive(Clone, Debug)]
pub struct SysCfg {
    pub rtps_mode: RtpsMode,
    /// Bitmask of the R52 cores to boot in split mode (bit 0: core 0, bit 1: core 1)
    pub rtps_cores: u32,
    /// The subsystems to boot at startup
    pub subsystems: Subsys,
    pub hpps_rootfs_loc: MemDev,
    pub have_sfs_offset: bool,
    pub sfs_offset: u32,
    /// Whether the images are loaded from the simple file system or are already in place
    pub load_binaries: bool,
    pub rio_master: bool,
    pub test_rio_onchip: bool,
    pub test_rio_offchip: bool,
    pub rtps_r52_blobs: BlobList,
    pub rtps_a53_blobs: BlobList,
    pub hpps_blobs: BlobList,
}

impl SysCfg {
    /// Parses the configuration from `words`
    ///
    /// Fails with [`Code::InvArgs`] if `words` is too short or a field has an invalid value and
    /// with [`Code::NoSpace`] if an image list does not fit.
    pub fn load(words: &[u32]) -> Result<Self, Error> {
        if words.len() < SYSCFG_WORDS {
            tlog!(
                Error,
                "syscfg: need {} words, got {}",
                SYSCFG_WORDS,
                words.len()
            );
            return Err(Error::new(Code::InvArgs));
        }

        let word0 = words[WORD_FIELDS];
        tlog!(TrchSysCfg, "syscfg: word0: {:#x}", word0);

        let rtps_mode = RtpsMode::try_from(RTPS_MODE.get(word0)).map_err(|_| {
            tlog!(Error, "syscfg: invalid RTPS mode {}", RTPS_MODE.get(word0));
            Error::new(Code::InvArgs)
        })?;
        let hpps_rootfs_loc = MemDev::try_from(HPPS_ROOTFS_LOC.get(word0)).map_err(|_| {
            tlog!(
                Error,
                "syscfg: invalid rootfs location {}",
                HPPS_ROOTFS_LOC.get(word0)
            );
            Error::new(Code::InvArgs)
        })?;

        let cfg = Self {
            rtps_mode,
            rtps_cores: RTPS_CORES.get(word0),
            subsystems: Subsys::from_bits_truncate(SUBSYS.get(word0)),
            hpps_rootfs_loc,
            have_sfs_offset: HAVE_SFS_OFFSET.is_set(word0),
            sfs_offset: words[WORD_SFS_OFFSET],
            load_binaries: LOAD_BINARIES.is_set(word0),
            rio_master: RIO_MASTER.is_set(word0),
            test_rio_onchip: TEST_RIO_ONCHIP.is_set(word0),
            test_rio_offchip: TEST_RIO_OFFCHIP.is_set(word0),
            rtps_r52_blobs: Self::load_blobs("rtps r52", words, WORD_RTPS_R52_BLOBS)?,
            rtps_a53_blobs: Self::load_blobs("rtps a53", words, WORD_RTPS_A53_BLOBS)?,
            hpps_blobs: Self::load_blobs("hpps", words, WORD_HPPS_BLOBS)?,
        };
        cfg.print();
        Ok(cfg)
    }

    fn load_blobs(name: &str, words: &[u32], start: usize) -> Result<BlobList, Error> {
        BlobList::parse(&words[start..start + BLOB_LIST_WORDS]).map_err(|e| {
            tlog!(Error, "syscfg: invalid {} image list: {}", name, e);
            e
        })
    }

    /// Returns the images to load for `subsys`, if it has any
    pub fn blobs(&self, subsys: Subsys) -> Option<&BlobList> {
        match subsys {
            Subsys::RTPS_R52 => Some(&self.rtps_r52_blobs),
            Subsys::RTPS_A53 => Some(&self.rtps_a53_blobs),
            Subsys::HPPS => Some(&self.hpps_blobs),
            _ => None,
        }
    }

    /// Prints the configuration to the log
    pub fn print(&self) {
        tlog!(Info, "SYSTEM CONFIG:");
        tlog!(Info, "  have sfs offset:    {}", self.have_sfs_offset);
        tlog!(Info, "  sfs offset:         {:#x}", self.sfs_offset);
        tlog!(Info, "  load binaries:      {}", self.load_binaries);
        tlog!(Info, "  subsystems:         {:?}", self.subsystems);
        tlog!(Info, "  rtps mode:          {:?}", self.rtps_mode);
        tlog!(Info, "  rtps cores bitmask: {:#x}", self.rtps_cores);
        tlog!(Info, "  hpps rootfs:        {:?}", self.hpps_rootfs_loc);
        tlog!(Info, "  rio master:         {}", self.rio_master);
        tlog!(Info, "  rtps r52 blobs:     {}", self.rtps_r52_blobs);
        tlog!(Info, "  rtps a53 blobs:     {}", self.rtps_a53_blobs);
        tlog!(Info, "  hpps blobs:         {}", self.hpps_blobs);
    }
}

impl Default for SysCfg {
    /// The configuration used if none is loaded from non-volatile memory
    fn default() -> Self {
        Self {
            rtps_mode: RtpsMode::Lockstep,
            rtps_cores: 0,
            subsystems: Subsys::empty(),
            hpps_rootfs_loc: MemDev::HppsDram,
            have_sfs_offset: false,
            sfs_offset: 0,
            load_binaries: false,
            rio_master: false,
            test_rio_onchip: false,
            test_rio_offchip: false,
            rtps_r52_blobs: BlobList::new(),
            rtps_a53_blobs: BlobList::new(),
            hpps_blobs: BlobList::new(),
        }
    }
}
