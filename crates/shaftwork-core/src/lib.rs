//! Shaftwork Core -- shared value types for rotating-shaft multiblocks.
//!
//! This crate holds the leaves of the subsystem: positions and orientation
//! frames, the narrow world interface, waveform tags, the energy unit
//! conversion, and the rotating assembly that every segment of a formed
//! structure shares.
//!
//! # Key Types
//!
//! - [`geometry::LocalFrame`] -- orientation-relative coordinates used by
//!   structure matching.
//! - [`world::World`] -- block access plus the neighbour energy hook.
//! - [`waveform::Waveform`] -- AC/DC kind, phase count, and source of a
//!   buffer's energy.
//! - [`assembly::RotatingAssembly`] -- speed, total inertia, losslessness.
//! - [`id::AssemblyId`] -- arena handle segments use to reach their assembly.

pub mod assembly;
pub mod conversion;
pub mod geometry;
pub mod id;
pub mod waveform;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
