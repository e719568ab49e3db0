//! Drive control module
//!
//! Closed-loop control of the tank drivetrain's two motor banks, driving
//! relative shaft position targets read straight from the motor encoders.
//! Three motion primitives share a common per-tick PID pattern:
//!
//! - **Straight** - drive both banks to a common relative target while a
//!   cross-coupled proportional term keeps the sides synchronised.
//! - **Point turn** - same two-sided loop with the right bank's output
//!   negated, rotating the chassis in place.
//! - **Swing turn** - single-axis loop driving one bank while the other is
//!   held at zero command, pivoting about the stationary side.
//!
//! The primitives are peers: none calls another, and each one blocks its
//! caller until the loop converges, times out, stalls or is cancelled. Loop
//! state is constructed fresh at every entry - nothing persists between
//! invocations. The integral terms are deliberately unclamped (no
//! anti-windup); under a sustained stall they grow without bound, which is
//! why the tick budget exists.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod params;
mod state;
mod straight;
mod point_turn;
mod swing_turn;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use params::*;
pub use state::*;

use crate::mech::Bank;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
///
/// All of these are recoverable: the loop zeroes both command channels
/// before returning and control is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error(
        "Loop exceeded its tick budget of {ticks} ticks without converging \
        (final errors L: {final_error_left}, R: {final_error_right})"
    )]
    ConvergenceTimeout {
        ticks: u32,
        final_error_left: i32,
        final_error_right: i32,
        final_integral_left: i64,
        final_integral_right: i64,
    },

    #[error(
        "{bank:?} bank stalled: nonzero command but no position change for \
        {ticks} consecutive ticks"
    )]
    StallDetected { bank: Bank, ticks: u32 },

    #[error("Motion cancelled by the caller")]
    Cancelled,
}
