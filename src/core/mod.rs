//! Core data types, errors and time sources.
//!
//! # Submodules
//!
//! - [`types`]: Addresses, encrypted handles, bills and aggregate scopes
//! - [`errors`]: Error taxonomy
//! - [`clock`]: Block/wall time sources

pub mod clock;
pub mod errors;
pub mod types;
