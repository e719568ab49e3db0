//! Simulated drivetrain
//!
//! A bench model of the two motor banks used by the executable's
//! demonstration sequence and by the control loop tests. Each bank is a
//! first-order plant: every tick the motor positions advance by the last
//! commanded velocity (saturated to the actuator scale), scaled by a
//! configurable response and an encoder polarity.
//!
//! The polarity models the sense of the encoder relative to the command.
//! On a tank drivetrain the right bank's motors are mounted mirrored, so a
//! bench model of a point turn gives the right bank a negative polarity; a
//! reversed drivetrain gives both banks negative polarity.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Duration;

// Internal
use super::{Bank, Mech, ACTUATOR_SCALE, MOTORS_PER_BANK};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulated two-bank drivetrain.
pub struct SimMech {
    banks: [SimBank; 2],
}

/// One simulated bank of [`MOTORS_PER_BANK`] linked motors.
struct SimBank {
    /// Motor positions in ticks. Kept as floats so sub-tick responses
    /// accumulate; reads truncate to whole ticks.
    positions: [f64; MOTORS_PER_BANK],

    /// Last commanded velocity.
    cmd: i32,

    /// Encoder counts per commanded unit per tick.
    response: f64,

    /// Sense of the encoder relative to the command.
    polarity: f64,

    /// When true the bank does not move regardless of command.
    frozen: bool,

    /// Every velocity command issued to this bank, in order.
    cmd_log: Vec<i32>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimBank {
    fn new(response: f64, polarity: f64) -> Self {
        SimBank {
            positions: [0.0; MOTORS_PER_BANK],
            cmd: 0,
            response,
            polarity,
            frozen: false,
            cmd_log: Vec::new(),
        }
    }

    fn advance(&mut self) {
        if self.frozen {
            return;
        }

        let clamped = self.cmd.max(-ACTUATOR_SCALE).min(ACTUATOR_SCALE) as f64;
        let delta = clamped * self.polarity * self.response;

        for pos in self.positions.iter_mut() {
            *pos += delta;
        }
    }
}

impl SimMech {
    /// Create a drivetrain in which both banks respond with the given number
    /// of encoder ticks per commanded unit per tick, positive sense.
    pub fn new(response: f64) -> Self {
        Self::with_polarity(response, 1.0, 1.0)
    }

    /// Create a drivetrain with per-bank encoder polarity.
    pub fn with_polarity(response: f64, left_polarity: f64, right_polarity: f64) -> Self {
        SimMech {
            banks: [
                SimBank::new(response, left_polarity),
                SimBank::new(response, right_polarity),
            ],
        }
    }

    /// Freeze one bank in place, simulating a stalled motor group.
    pub fn freeze(&mut self, bank: Bank) {
        self.banks[bank.index()].frozen = true;
    }

    /// Set the response of both banks.
    pub fn set_response(&mut self, response: f64) {
        for bank in self.banks.iter_mut() {
            bank.response = response;
        }
    }

    /// Set the encoder polarity of one bank.
    pub fn set_polarity(&mut self, bank: Bank, polarity: f64) {
        self.banks[bank.index()].polarity = polarity;
    }

    /// All velocity commands issued to one bank, in order.
    pub fn commands(&self, bank: Bank) -> &[i32] {
        &self.banks[bank.index()].cmd_log
    }

    /// The most recent velocity command issued to one bank.
    pub fn last_command(&self, bank: Bank) -> Option<i32> {
        self.banks[bank.index()].cmd_log.last().copied()
    }
}

impl Mech for SimMech {
    fn motor_position(&self, bank: Bank, motor: usize) -> i32 {
        self.banks[bank.index()].positions[motor] as i32
    }

    fn tare(&mut self, bank: Bank) {
        self.banks[bank.index()].positions = [0.0; MOTORS_PER_BANK];
    }

    fn set_speed(&mut self, bank: Bank, speed: i32) {
        let b = &mut self.banks[bank.index()];
        b.cmd = speed;
        b.cmd_log.push(speed);
    }

    fn tick_wait(&mut self, _period: Duration) {
        for bank in self.banks.iter_mut() {
            bank.advance();
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plant_advances_by_saturated_command() {
        let mut mech = SimMech::new(1.0);

        // Command beyond the actuator scale saturates at the actuator
        mech.set_speed(Bank::Left, 10_000);
        mech.tick_wait(Duration::from_millis(10));

        assert_eq!(mech.bank_position(Bank::Left), ACTUATOR_SCALE);
        assert_eq!(mech.bank_position(Bank::Right), 0);
    }

    #[test]
    fn test_polarity_inverts_encoder_sense() {
        let mut mech = SimMech::with_polarity(1.0, 1.0, -1.0);

        mech.set_speed(Bank::Right, -100);
        mech.tick_wait(Duration::from_millis(10));

        // Mirrored gearing: negative command counts positive
        assert_eq!(mech.bank_position(Bank::Right), 100);
    }

    #[test]
    fn test_frozen_bank_does_not_move() {
        let mut mech = SimMech::new(1.0);
        mech.freeze(Bank::Left);

        mech.set_speed(Bank::Left, 100);
        mech.tick_wait(Duration::from_millis(10));

        assert_eq!(mech.bank_position(Bank::Left), 0);
    }

    #[test]
    fn test_tare_zeroes_one_bank_only() {
        let mut mech = SimMech::new(1.0);

        mech.set_speed(Bank::Left, 50);
        mech.set_speed(Bank::Right, 50);
        mech.tick_wait(Duration::from_millis(10));

        mech.tare(Bank::Left);

        assert_eq!(mech.bank_position(Bank::Left), 0);
        assert_eq!(mech.bank_position(Bank::Right), 50);
    }
}
