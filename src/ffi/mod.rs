//! Foreign Function Interface (FFI) module for C++ integration
//!
//! This module defines the cxx bridge between Rust and C++, letting a
//! ledger host recompute the message digest of submitted shielded
//! parameters and decode Merkle path positions.

pub mod bridge;

pub use bridge::*;
