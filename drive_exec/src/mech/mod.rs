//! Mechanisms boundary
//!
//! This module defines the hardware seam consumed by
//! [`drive_ctrl`](crate::drive_ctrl): readable shaft-position counters and
//! writable velocity commands for the two motor banks of the tank drivetrain.
//! The drive software does not own hardware abstraction - anything
//! implementing [`Mech`] can sit on the other side of this boundary, whether
//! that is a serial link to the motor controllers or the simulated drivetrain
//! in [`sim`].
//!
//! Exclusive ownership of the command channels is structural: the controller
//! takes the `Mech` implementation by value, so no second caller can issue
//! conflicting commands while a motion is in progress.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Duration;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of physically linked motors in each bank.
pub const MOTORS_PER_BANK: usize = 3;

/// Nominal scale of the actuator velocity command. Values beyond this are
/// saturated by the actuator itself, not by the control loops.
pub const ACTUATOR_SCALE: i32 = 127;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// One side of the chassis - a set of physically linked motors commanded and
/// read as a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    Left,
    Right,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Bank {
    /// Index of this bank into left/right pairs (left = 0, right = 1).
    pub fn index(&self) -> usize {
        match self {
            Bank::Left => 0,
            Bank::Right => 1,
        }
    }

    /// The opposite bank.
    pub fn other(&self) -> Bank {
        match self {
            Bank::Left => Bank::Right,
            Bank::Right => Bank::Left,
        }
    }
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Access to the drivetrain's encoders, actuators and tick delay.
pub trait Mech {
    /// Cumulative relative position of a single motor in encoder ticks,
    /// measured from whatever zero was last set by [`Mech::tare`].
    fn motor_position(&self, bank: Bank, motor: usize) -> i32;

    /// Reset the position counters of all motors in one bank to zero.
    fn tare(&mut self, bank: Bank);

    /// Command a signed velocity on one bank (nominal scale
    /// -[`ACTUATOR_SCALE`]..+[`ACTUATOR_SCALE`]).
    fn set_speed(&mut self, bank: Bank, speed: i32);

    /// Block for one control tick. Supplied by the host scheduling
    /// environment - a real drivetrain sleeps, the simulation advances its
    /// plant model.
    fn tick_wait(&mut self, period: Duration);

    /// Averaged relative position of the motors on one side.
    fn bank_position(&self, bank: Bank) -> i32 {
        let mut sum = 0i32;
        for motor in 0..MOTORS_PER_BANK {
            sum += self.motor_position(bank, motor);
        }
        sum / MOTORS_PER_BANK as i32
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// A mech with fixed, distinct motor positions.
    struct FixedMech {
        positions: [i32; MOTORS_PER_BANK],
    }

    impl Mech for FixedMech {
        fn motor_position(&self, _bank: Bank, motor: usize) -> i32 {
            self.positions[motor]
        }

        fn tare(&mut self, _bank: Bank) {}

        fn set_speed(&mut self, _bank: Bank, _speed: i32) {}

        fn tick_wait(&mut self, _period: Duration) {}
    }

    #[test]
    fn test_bank_position_averages_with_integer_division() {
        let mech = FixedMech {
            positions: [10, 20, 40],
        };

        // (10 + 20 + 40) / 3 = 23 with integer truncation
        assert_eq!(mech.bank_position(Bank::Left), 23);
    }

    #[test]
    fn test_bank_other() {
        assert_eq!(Bank::Left.other(), Bank::Right);
        assert_eq!(Bank::Right.other(), Bank::Left);
        assert_eq!(Bank::Left.index(), 0);
        assert_eq!(Bank::Right.index(), 1);
    }
}
