//! TAP (Test Anything Protocol) harness for on-device tests.
//!
//! The host runs the regular `#[test]` suite. Code that must be checked on
//! the board itself (NVS, the radio driver) registers `#[tap_test]` functions
//! that the `device-tests` binary runs over the serial console:
//!
//! ```text
//! TAP version 14
//! 1..3
//! ok 1 - credentials_reject_empty_fields
//! ok 2 - record_roundtrip
//! not ok 3 - nvs_roundtrip
//! # Error: credential write failed: ESP error: ESP_ERR_NVS_NOT_ENOUGH_SPACE
//! ```
//!
//! Only compiled with the `tap-tests` feature so none of this ends up in the
//! firmware image.
//!
//! # Usage
//!
//! ```ignore
//! #[cfg(feature = "tap-tests")]
//! mod tap_tests {
//!     use super::*;
//!     use aqi_monitor_esp32_macros::tap_test;
//!
//!     #[tap_test]
//!     fn empty_ssid_rejected() {
//!         assert!(Credentials::new("", "secret123").is_err());
//!     }
//!
//!     #[tap_test]
//!     fn record_roundtrip() -> crate::testing::TestResult {
//!         let creds = Credentials::new("HomeNet", "secret123")?;
//!         assert_eq!(decode_record(&encode_record(&creds)?)?, creds);
//!         Ok(())
//!     }
//! }
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

// Used by the code `#[tap_test]` expands to.
pub use inventory;

/// Result type for test functions.
pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Registers and runs one test on a runner.
pub type TestRegisterFn = fn(&mut TestRunner);

/// A test collected via `inventory`.
pub struct TapTestEntry {
    pub name: &'static str,
    pub register: TestRegisterFn,
}

impl TapTestEntry {
    pub const fn new(name: &'static str, register: TestRegisterFn) -> Self {
        Self { name, register }
    }
}

inventory::collect!(TapTestEntry);

fn selected(filter: Option<&str>) -> impl Iterator<Item = &'static TapTestEntry> + '_ {
    inventory::iter::<TapTestEntry>
        .into_iter()
        .filter(move |entry| filter.map_or(true, |f| entry.name.contains(f)))
}

/// Number of registered tests whose name contains `filter`.
pub fn test_count(filter: Option<&str>) -> usize {
    selected(filter).count()
}

/// Run every registered test. Returns true if all passed.
pub fn run_all_tests() -> bool {
    run_matching(None)
}

/// Run the registered tests whose name contains `filter`.
pub fn run_matching(filter: Option<&str>) -> bool {
    let mut runner = TestRunner::new();
    runner.print_header(test_count(filter));

    for entry in selected(filter) {
        (entry.register)(&mut runner);
    }

    runner.finish()
}

/// Runs tests and prints TAP lines.
#[derive(Default)]
pub struct TestRunner {
    tests_run: usize,
    tests_passed: usize,
    tests_failed: usize,
}

fn extract_panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl TestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn pass(&mut self, num: usize, name: &str) {
        self.tests_passed += 1;
        println!("ok {} - {}", num, name);
    }

    fn fail(&mut self, num: usize, name: &str, diagnostic: &str) {
        self.tests_failed += 1;
        println!("not ok {} - {}", num, name);
        println!("# {}", diagnostic);
    }

    /// Run a test returning [`TestResult`]. Panics count as failures.
    pub fn run<F>(&mut self, name: &str, test_fn: F)
    where
        F: FnOnce() -> TestResult + std::panic::UnwindSafe,
    {
        self.tests_run += 1;
        let num = self.tests_run;

        match catch_unwind(AssertUnwindSafe(test_fn)) {
            Ok(Ok(())) => self.pass(num, name),
            Ok(Err(e)) => self.fail(num, name, &format!("Error: {}", e)),
            Err(payload) => {
                let msg = extract_panic_message(&payload);
                self.fail(num, name, &format!("Panic: {}", msg))
            }
        }
    }

    /// Run a test that signals failure by panicking.
    pub fn run_assert<F>(&mut self, name: &str, test_fn: F)
    where
        F: FnOnce() + std::panic::UnwindSafe,
    {
        self.run(name, || {
            test_fn();
            Ok(())
        });
    }

    /// Run a test that must panic, with a message containing `expected` if given.
    pub fn run_should_panic<F>(&mut self, name: &str, test_fn: F, expected: Option<&str>)
    where
        F: FnOnce() + std::panic::UnwindSafe,
    {
        self.tests_run += 1;
        let num = self.tests_run;

        match catch_unwind(AssertUnwindSafe(test_fn)) {
            Ok(()) => self.fail(num, name, "Expected panic but test completed normally"),
            Err(payload) => {
                let msg = extract_panic_message(&payload);
                match expected {
                    Some(want) if !msg.contains(want) => self.fail(
                        num,
                        name,
                        &format!("Expected panic containing '{}', got '{}'", want, msg),
                    ),
                    _ => self.pass(num, name),
                }
            }
        }
    }

    pub fn print_header(&self, planned_tests: usize) {
        println!("TAP version 14");
        println!("1..{}", planned_tests);
    }

    pub fn comment(msg: &str) {
        println!("# {}", msg);
    }

    /// Print the summary. Returns true if all tests passed.
    pub fn finish(&self) -> bool {
        println!("# -----------------------");
        println!("# Tests run: {}", self.tests_run);
        println!("# Passed: {}", self.tests_passed);
        println!("# Failed: {}", self.tests_failed);

        let ok = self.tests_failed == 0;
        println!("# Result: {}", if ok { "PASS" } else { "FAIL" });
        ok
    }

    pub fn tests_run(&self) -> usize {
        self.tests_run
    }

    pub fn tests_passed(&self) -> usize {
        self.tests_passed
    }

    pub fn tests_failed(&self) -> usize {
        self.tests_failed
    }
}

mod tap_tests {
    use super::*;
    use aqi_monitor_esp32_macros::tap_test;

    #[tap_test]
    fn runner_counts_results() {
        let mut runner = TestRunner::new();
        runner.run("pass", || Ok(()));
        runner.run("fail", || Err("store unavailable".into()));
        runner.run_assert("panic", || panic!("radio busy"));
        assert_eq!(runner.tests_run(), 3);
        assert_eq!(runner.tests_passed(), 1);
        assert_eq!(runner.tests_failed(), 2);
    }

    #[tap_test]
    fn runner_checks_panic_message() {
        let mut runner = TestRunner::new();
        runner.run_should_panic("matches", || panic!("station and access point"), Some("station"));
        runner.run_should_panic("mismatch", || panic!("other"), Some("station"));
        runner.run_should_panic("no panic", || {}, None);
        assert_eq!(runner.tests_passed(), 1);
        assert_eq!(runner.tests_failed(), 2);
    }

    #[tap_test]
    fn filter_selects_by_name() {
        assert!(test_count(Some("runner_")) >= 2);
        assert_eq!(test_count(Some("no-test-has-this-name")), 0);
        assert_eq!(test_count(None), inventory::iter::<TapTestEntry>.into_iter().count());
    }
}
