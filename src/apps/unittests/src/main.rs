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

use std::process::ExitCode;

use base::test::WvTester;

fn main() -> ExitCode {
    let tester = unittests::run_all();
    match tester.failures() {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
