//! In-memory data structures.
//!
//! Provides read and write access to slices.
#![no_std]

mod slice;
pub use slice::*;
