//! Compile-fail tests for transient builders.
//!
//! These tests verify that a transient cannot be written to after
//! `immutable` has consumed it.
//!
//! Note: trybuild tests use #[test] as an exception because
//! trybuild's standard usage pattern requires it.

#[test]
fn transient_compile_fail_tests() {
    let test_cases = trybuild::TestCases::new();
    test_cases.compile_fail("tests/compile_fail/transient_*.rs");
}
