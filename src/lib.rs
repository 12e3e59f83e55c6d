// Library root — exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod compliance;
pub mod error;
pub mod platform;
pub mod reply;
pub mod rules;
pub mod scheduler;
pub mod tracker;

// These modules are only needed by the binary.
// Declared pub so integration tests can reach them if needed, but they
// contain no logic of interest to tests.
pub mod cli;
pub mod config;
pub mod logging;
