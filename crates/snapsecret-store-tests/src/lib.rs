//! Shared conformance harness for SnapSecret store backends.
//! Intended for use in integration tests of store crates.

mod assertions;
mod capabilities;
mod env;
mod fixtures;
mod retry;
mod suite;

pub use assertions::*;
pub use capabilities::*;
pub use env::*;
pub use fixtures::*;
pub use retry::*;
pub use suite::*;
