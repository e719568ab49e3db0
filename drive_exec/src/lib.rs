//! # Drive library.
//!
//! This library allows other crates (and the drive executable) to access the
//! modules defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drive control module - closed-loop motion primitives for the tank drivetrain
pub mod drive_ctrl;

/// Mechanisms boundary - encoder/actuator access for the two motor banks
pub mod mech;
