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

//! The unittests of the TRCH firmware core, run against simulated hardware on the host

use base::test::{DefaultWvTester, WvTester};
use base::{println, wv_run_suite};

pub mod sim;

mod tboot;
mod tcol;
mod tevent;
mod tlinks;
mod tmboxlink;
mod tserver;
mod tshmemlink;
mod tswtimer;
mod tsyscfg;
mod tworkloop;

/// Runs all test suites and returns the tester with the results
pub fn run_all() -> DefaultWvTester {
    sim::init_log();

    let mut tester = DefaultWvTester::default();
    wv_run_suite!(tester, tcol::run);
    wv_run_suite!(tester, tswtimer::run);
    wv_run_suite!(tester, tevent::run);
    wv_run_suite!(tester, tmboxlink::run);
    wv_run_suite!(tester, tshmemlink::run);
    wv_run_suite!(tester, tlinks::run);
    wv_run_suite!(tester, tsyscfg::run);
    wv_run_suite!(tester, tboot::run);
    wv_run_suite!(tester, tserver::run);
    wv_run_suite!(tester, tworkloop::run);
    println!("{}", tester);
    tester
}

#[cfg(test)]
mod tests {
    use base::test::{DefaultWvTester, WvTester};

    fn run_suite(name: &str, suite: &dyn Fn(&mut dyn WvTester)) {
        let mut tester = DefaultWvTester::default();
        super::sim::init_log();
        tester.run_suite(name, suite);
        assert_eq!(tester.failures(), 0, "{}", tester);
    }

    #[test]
    fn col() {
        run_suite("tcol", &super::tcol::run);
    }

    #[test]
    fn swtimer() {
        run_suite("tswtimer", &super::tswtimer::run);
    }

    #[test]
    fn event() {
        run_suite("tevent", &super::tevent::run);
    }

    #[test]
    fn mboxlink() {
        run_suite("tmboxlink", &super::tmboxlink::run);
    }

    #[test]
    fn shmemlink() {
        run_suite("tshmemlink", &super::tshmemlink::run);
    }

    #[test]
    fn links() {
        run_suite("tlinks", &super::tlinks::run);
    }

    #[test]
    fn syscfg() {
        run_suite("tsyscfg", &super::tsyscfg::run);
    }

    #[test]
    fn boot() {
        run_suite("tboot", &super::tboot::run);
    }

    #[test]
    fn server() {
        run_suite("tserver", &super::tserver::run);
    }

    #[test]
    fn workloop() {
        run_suite("tworkloop", &super::tworkloop::run);
    }
}
