//! Wire-format primitives shared by `protoc-gen-sol`.
//!
//! The generator itself never executes a codec, but it still has to read
//! the binary descriptors protoc hands it, write the plugin response back,
//! and agree with the emitted Solidity on how floating point values are
//! scaled. Those pieces live here.

#![deny(clippy::as_conversions)]

pub mod error;
pub mod fixed_point;
pub mod leb128;
pub mod wire;
