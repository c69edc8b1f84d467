//! Test utilities and helpers for SealText
//!
//! Fixtures for ciphers, sessions over an in-memory remote, and assertions
//! over read results, shared by unit and integration tests.

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
