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

//! Contains the logger

use core::cmp;
use core::fmt;

use spin::{Mutex, MutexGuard};

use crate::io::{LogFlags, Serial, SerialSink};

const MAX_LINE_LEN: usize = 160;
const MAX_NAME_LEN: usize = 8;

static LOG: Mutex<Log> = Mutex::new(Log::new());

/// A buffered logger that writes complete lines to the serial line
pub struct Log {
    serial: Serial,
    flags: LogFlags,
    ready: bool,
    buf: [u8; MAX_LINE_LEN],
    pos: usize,
    start_pos: usize,
}

impl Log {
    /// Returns the logger
    ///
    /// Returns `None` if the logger has not been initialized yet or if it is currently in use. The
    /// latter happens if an interrupt handler logs while the main loop holds the logger; in this
    /// case the message is dropped instead of deadlocking.
    pub fn get() -> Option<MutexGuard<'static, Log>> {
        let log = LOG.try_lock()?;
        match log.ready {
            true => Some(log),
            false => None,
        }
    }

    pub(crate) const fn new() -> Self {
        Log {
            serial: Serial::new(),
            flags: LogFlags::empty(),
            ready: false,
            buf: [0; MAX_LINE_LEN],
            pos: 0,
            start_pos: 0,
        }
    }

    /// Returns the currently enabled log flags
    pub fn flags(&self) -> LogFlags {
        self.flags
    }

    /// Sets the enabled log flags
    pub fn set_flags(&mut self, flags: LogFlags) {
        self.flags = flags;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.put_char(*b)
        }
    }

    fn put_char(&mut self, c: u8) {
        self.buf[self.pos] = c;
        self.pos += 1;

        if c == b'\n' || self.pos + 1 >= MAX_LINE_LEN {
            if c != b'\n' {
                self.buf[self.pos] = b'\n';
                self.pos += 1;
            }
            self.flush();
        }
    }

    fn flush(&mut self) {
        // a failing sink cannot be reported anywhere; drop the line
        self.serial.write(&self.buf[0..self.pos]).ok();
        self.pos = self.start_pos;
    }

    fn init(&mut self, name: &str, flags: LogFlags, sink: SerialSink) {
        let begin = match name.rfind('/') {
            Some(b) => b + 1,
            None => 0,
        };
        let len = cmp::min(name.len() - begin, MAX_NAME_LEN);

        self.serial.set_sink(sink);
        self.flags = flags;
        self.pos = 0;
        self.write_bytes(b"[");
        self.write_bytes(&name.as_bytes()[begin..begin + len]);
        for _ in len..MAX_NAME_LEN {
            self.write_bytes(b" ");
        }
        self.write_bytes(b"] ");
        self.start_pos = self.pos;
        self.ready = true;
    }
}

impl fmt::Write for Log {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// Initializes the logger
///
/// Calling it again replaces the name, the flags, and the sink.
pub fn init(name: &str, flags: LogFlags, sink: SerialSink) {
    LOG.lock().init(name, flags, sink);
}

/// Changes the enabled log flags of the already initialized logger
pub fn set_flags(flags: LogFlags) {
    LOG.lock().set_flags(flags);
}
