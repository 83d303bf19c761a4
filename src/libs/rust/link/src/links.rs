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

//! The pool of link objects

use core::cell::RefCell;
use core::fmt;

use base::col::{Pool, PoolId};
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::time::Clock;

use crate::cmd::{Cmd, CmdQueue};
use crate::mbox::MboxLinkDev;
use crate::mboxlink::{MboxLink, MboxLinkParams, MboxLinkPool};
use crate::shmem::{ShmBuf, ShmemLink, SHMEM_MSG_SIZE};
use crate::{Link, Timeout};

/// The default number of links per processor image
pub const MAX_LINKS: usize = 16;

/// Identifies a link in [`Links`]
pub type LinkId = PoolId;

/// A link of any variant
#[derive(Debug)]
pub enum LinkObj<'a> {
    /// A slot that has been reserved for a link whose connect is in progress
    Connecting,
    Mbox(MboxLink<'a>),
    Shmem(ShmemLink<'a>),
}

impl<'a> LinkObj<'a> {
    fn static_name(&self) -> &'static str {
        match self {
            Self::Connecting => "<connecting>",
            Self::Mbox(l) => l.name,
            Self::Shmem(l) => l.name,
        }
    }

    fn as_link(&self) -> Result<&dyn Link, Error> {
        match self {
            Self::Connecting => Err(Error::new(Code::InvState)),
            Self::Mbox(l) => Ok(l),
            Self::Shmem(l) => Ok(l),
        }
    }
}

impl<'a> Link for LinkObj<'a> {
    fn name(&self) -> &str {
        self.static_name()
    }

    fn send(&self, timeout: Timeout, msg: &[u8]) -> Result<usize, Error> {
        self.as_link()?.send(timeout, msg)
    }

    fn is_send_acked(&self) -> bool {
        self.as_link().map_or(false, |l| l.is_send_acked())
    }

    fn request(
        &self,
        wtimeout: Timeout,
        req: &[u8],
        rtimeout: Timeout,
        reply: &mut [u8],
    ) -> Result<usize, Error> {
        self.as_link()?.request(wtimeout, req, rtimeout, reply)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.as_link()?.recv(buf)
    }

    fn disconnect(self) -> Result<(), Error> {
        match self {
            Self::Connecting => Ok(()),
            Self::Mbox(l) => l.disconnect(),
            Self::Shmem(l) => l.disconnect(),
        }
    }
}

/// The fixed pool of links
///
/// Links are connected and disconnected by the main loop only; interrupt handlers work on the
/// [`MboxLinkPool`] instead.
pub struct Links<'a, const N: usize = MAX_LINKS> {
    objs: RefCell<Pool<LinkObj<'a>, N>>,
    mbox: &'a MboxLinkPool<'a>,
    clock: &'a Clock,
}

impl<'a, const N: usize> Links<'a, N> {
    /// Creates an empty link pool
    ///
    /// Mailbox links take their state from `mbox`, all links measure timeouts with `clock`.
    pub fn new(mbox: &'a MboxLinkPool<'a>, clock: &'a Clock) -> Self {
        Self {
            objs: RefCell::new(Pool::new()),
            mbox,
            clock,
        }
    }

    /// Returns the number of links
    pub fn len(&self) -> usize {
        self.objs.borrow().len()
    }

    /// Returns true if there are no links
    pub fn is_empty(&self) -> bool {
        self.objs.borrow().is_empty()
    }

    /// Returns true if `id` refers to a link
    pub fn contains(&self, id: LinkId) -> bool {
        self.objs.borrow().contains(id)
    }

    fn reserve(&self, name: &str) -> Result<LinkId, Error> {
        self.objs
            .borrow_mut()
            .alloc(LinkObj::Connecting)
            .map_err(|_| {
                log!(LogFlags::Error, "{}: no free link", name);
                Error::new(Code::NoFreeLink)
            })
    }

    /// Connects a mailbox link on `mldev`
    ///
    /// Fails if there is no free link, no free mailbox link state, or if one of the channels
    /// cannot be claimed. In all cases, everything acquired so far is released again.
    pub fn connect_mbox(
        &self,
        mldev: MboxLinkDev<'a>,
        params: &MboxLinkParams,
    ) -> Result<LinkId, Error> {
        let id = self.reserve(params.name)?;
        match self.mbox.connect(mldev, self.clock, params, Some(id)) {
            Ok(link) => {
                if let Some(obj) = self.objs.borrow_mut().get_mut(id) {
                    *obj = LinkObj::Mbox(link);
                }
                log!(LogFlags::LibLink, "{}: connected as {:?}", params.name, id);
                Ok(id)
            },
            Err(e) => {
                self.objs.borrow_mut().free(id);
                Err(e)
            },
        }
    }

    /// Connects a shared-memory link that sends via `out` and receives via `inb`
    pub fn connect_shmem(
        &self,
        name: &'static str,
        out: &'a ShmBuf,
        inb: &'a ShmBuf,
    ) -> Result<LinkId, Error> {
        let id = self.reserve(name)?;
        if let Some(obj) = self.objs.borrow_mut().get_mut(id) {
            *obj = LinkObj::Shmem(ShmemLink::new(name, out, inb, self.clock));
        }
        log!(LogFlags::LibLink, "{}: connected as {:?}", name, id);
        Ok(id)
    }

    /// Disconnects the given link and reclaims its slot
    ///
    /// Fails with [`Code::NotFound`] if `id` does not refer to a link (anymore).
    pub fn disconnect(&self, id: LinkId) -> Result<(), Error> {
        let obj = self
            .objs
            .borrow_mut()
            .free(id)
            .ok_or_else(|| Error::new(Code::NotFound))?;
        log!(LogFlags::LibLink, "{}: disconnect {:?}", obj.name(), id);
        obj.disconnect()
    }

    /// Returns the name of the given link
    pub fn name(&self, id: LinkId) -> Result<&'static str, Error> {
        self.objs
            .borrow()
            .get(id)
            .map(|obj| obj.static_name())
            .ok_or_else(|| Error::new(Code::NotFound))
    }

    /// Calls `func` with the given link
    ///
    /// Fails with [`Code::NotFound`] if `id` does not refer to a link (anymore).
    pub fn with<R, F>(&self, id: LinkId, func: F) -> Result<R, Error>
    where
        F: FnOnce(&dyn Link) -> R,
    {
        let objs = self.objs.borrow();
        let obj = objs.get(id).ok_or_else(|| Error::new(Code::NotFound))?;
        Ok(func(obj))
    }

    /// Polls all shared-memory links for commands and puts them into `cmdq`
    ///
    /// Returns the number of received commands. Links that fail to receive are skipped. Fails if
    /// the command queue is full.
    pub fn poll(&self, cmdq: &CmdQueue) -> Result<usize, Error> {
        let objs = self.objs.borrow();
        let mut count = 0;
        for (id, obj) in objs.iter() {
            if let LinkObj::Shmem(link) = obj {
                let mut buf = [0u8; SHMEM_MSG_SIZE];
                // a broken message is dropped; the link stays usable
                let len = match link.recv(&mut buf) {
                    Ok(len) => len,
                    Err(e) => {
                        log!(LogFlags::Error, "{}: recv failed: {}", link.name(), e);
                        continue;
                    },
                };
                if len > 0 {
                    log!(LogFlags::LibLink, "{}: recv: got message", link.name());
                    cmdq.enqueue(Cmd::from_bytes(Some(id), &buf[..len]))?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

impl<const N: usize> fmt::Debug for Links<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let objs = self.objs.borrow();
        f.debug_map().entries(objs.iter()).finish()
    }
}
