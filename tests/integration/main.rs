//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against in-memory adapters.  All tests run on the host with no serial
//! hardware required.

mod engine_tests;
mod mocks;
mod runtime_tests;
