//! Shared test infrastructure for shadow ledger integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
