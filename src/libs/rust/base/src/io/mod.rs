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

//! Contains the modules for serial output and logging

pub mod log;
mod logflags;
mod serial;

pub use self::logflags::LogFlags;
pub use self::serial::{Serial, SerialSink};

/// Macro for logging (includes a trailing newline)
///
/// The arguments are printed if $flag is enabled (see [`LogFlags`]).
///
/// # Examples
///
/// ```
/// use base::io::LogFlags;
/// use base::log;
///
/// log!(LogFlags::LibMbox, "my log entry: {}, {}", 1, "test");
/// ```
#[macro_export]
macro_rules! log {
    ($flag:expr, $fmt:expr)                   => (
        $crate::log!(@log_impl $flag, concat!($fmt, "\n"))
    );

    ($flag:expr, $fmt:expr, $($arg:tt)*)      => (
        $crate::log!(@log_impl $flag, concat!($fmt, "\n"), $($arg)*)
    );

    (@log_impl $flag:expr, $($args:tt)*)    => ({
        use core::fmt::Write;
        if let Some(mut l) = $crate::io::log::Log::get() {
            if l.flags().contains($flag) {
                // the logger cannot fail; the sink drops what it cannot write
                let _ = l.write_fmt(format_args!($($args)*));
            }
        }
    });
}

/// Macro for unconditional output to the log (includes a trailing newline)
#[macro_export]
macro_rules! println {
    ()                                        => (
        $crate::println!("")
    );

    ($fmt:expr)                               => (
        $crate::println!(@print_impl concat!($fmt, "\n"))
    );

    ($fmt:expr, $($arg:tt)*)                  => (
        $crate::println!(@print_impl concat!($fmt, "\n"), $($arg)*)
    );

    (@print_impl $($args:tt)*)              => ({
        use core::fmt::Write;
        if let Some(mut l) = $crate::io::log::Log::get() {
            let _ = l.write_fmt(format_args!($($args)*));
        }
    });
}

/// Initializes the I/O module
///
/// `name` is used as the line prefix, `flags` selects the enabled log messages and `sink`
/// receives every completed line.
pub fn init(name: &str, flags: LogFlags, sink: SerialSink) {
    log::init(name, flags, sink);
}
