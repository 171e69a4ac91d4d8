//! GpBinaryByte codec family
//!
//! Three wire generations share a tag alphabet and a 2-byte message header:
//!
//! * [`v1`] — fixed-width big-endian primitives, `i16` counts
//! * [`v16`] — v1 values with a refined message layer (init generation
//!   marker, nullable parameter coercion)
//! * [`v17`] — compressed generation: zig-zag varint integers, varint
//!   lengths and counts, single-byte body counts, encrypted flag folded
//!   into the type byte

pub mod tags;
pub mod v1;
pub mod v16;
pub mod v17;

pub use tags::GpTag;
