//! Commands passed into DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::mech::Bank;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command to execute a single motion primitive.
///
/// A command is immutable for the duration of one loop invocation and
/// discarded on return. Targets are relative positions in encoder ticks,
/// interpreted against whatever zero was last set on the encoders.
///
/// `speed` is the nominal speed for the motion. It is part of the command
/// contract but is not applied as an output cap by the present loops - the
/// intended ceiling semantics are unconfirmed, so none are invented here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionCmd {
    /// Drive both banks to a common relative target, keeping the two sides
    /// synchronised. Tares both banks before the loop starts.
    Straight {
        target_ticks: i32,
        speed: i32,
        direction: Direction,
    },

    /// Rotate the chassis about its centre by driving both banks to the same
    /// target magnitude with opposite output polarity.
    PointTurn {
        target_ticks: i32,
        speed: i32,
        sense: TurnSense,
    },

    /// Pivot about one stationary bank by driving only the other toward the
    /// target.
    SwingTurn {
        target_ticks: i32,
        speed: i32,
        side: Bank,
    },
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction multiplier applied to the straight-line outputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Sense of a point turn. `Right` drives the left bank forward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TurnSense {
    Right,
    Left,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Direction {
    /// The output multiplier for this direction.
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

impl TurnSense {
    /// The uniform output multiplier for this sense.
    pub fn sign(&self) -> i32 {
        match self {
            TurnSense::Right => 1,
            TurnSense::Left => -1,
        }
    }
}
