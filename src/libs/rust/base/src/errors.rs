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

//! Contains the error handling types

use core::fmt;

use num_enum::{FromPrimitive, IntoPrimitive};

/// The error codes
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Code {
    // success
    Success = 0,
    // generic
    InvArgs,
    NoSpace,
    NotSup,
    NotFound,
    InvState,
    Timeout,
    Busy,
    // links and mailboxes
    NoFreeLink,
    NoFreeMbox,
    MboxClaimFailed,
    MboxBusy,
    SendFailed,
    RecvFailed,
    // commands
    InvCmd,
    QueueFull,
    // boot
    NoSuchFile,
    LoadFailed,
    ResetFailed,
    #[num_enum(default)]
    Unspecified,
}

impl Default for Code {
    fn default() -> Self {
        Self::Success
    }
}

/// The error struct that is passed around
#[derive(Clone, Copy)]
pub struct Error {
    code: Code,
}

impl Error {
    /// Creates a new object for given error code
    pub const fn new(code: Code) -> Self {
        Error { code }
    }

    /// Returns the error code
    pub fn code(&self) -> Code {
        self.code
    }
}

impl From<Code> for Error {
    fn from(code: Code) -> Self {
        Self::new(code)
    }
}

impl From<Error> for Code {
    fn from(err: Error) -> Self {
        err.code()
    }
}

impl From<Code> for Result<(), Error> {
    fn from(code: Code) -> Self {
        match code {
            Code::Success => Ok(()),
            e => Err(Error::new(e)),
        }
    }
}

impl<T> From<Result<T, Error>> for Code {
    fn from(res: Result<T, Error>) -> Self {
        match res {
            Ok(_) => Code::Success,
            Err(e) => e.code(),
        }
    }
}

impl From<u32> for Error {
    fn from(error: u32) -> Self {
        Self::new(Code::from(error))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.code() == other.code()
    }
}

impl Eq for Error {
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code())
    }
}
