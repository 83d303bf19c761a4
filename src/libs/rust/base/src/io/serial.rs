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

//! Contains the serial struct

use core::fmt;

use crate::errors::{Code, Error};

/// The function that puts bytes on the wire
///
/// On the TRCH this writes to the UART; hosted builds print to the console. Returns the number of
/// bytes that have been written.
pub type SerialSink = fn(&[u8]) -> Result<usize, Error>;

/// The serial line
pub struct Serial {
    sink: Option<SerialSink>,
}

impl Serial {
    pub const fn new() -> Self {
        Self { sink: None }
    }

    pub(crate) fn set_sink(&mut self, sink: SerialSink) {
        self.sink = Some(sink);
    }

    /// Writes all of `buf` to the serial line
    pub fn write(&mut self, mut buf: &[u8]) -> Result<usize, Error> {
        let sink = self.sink.ok_or_else(|| Error::new(Code::NotSup))?;
        let res = buf.len();
        while !buf.is_empty() {
            match sink(buf) {
                Err(e) => return Err(e),
                Ok(0) => return Err(Error::new(Code::SendFailed)),
                Ok(n) => buf = &buf[n..],
            }
        }
        Ok(res)
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial")
    }
}
