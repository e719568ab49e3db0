//! Straight-line motion primitive

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use std::time::Duration;

// Internal
use super::*;
use crate::mech::{Bank, Mech};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M: Mech> DriveCtrl<M> {
    /// Drive both banks to a common relative target.
    ///
    /// Both encoders are tared immediately before the loop starts, so the
    /// target is always measured from the position at invocation. The
    /// nominal speed is part of the command contract but is not applied as
    /// an output cap.
    ///
    /// Blocks until both side errors are inside the stop band, or until the
    /// tick budget, stall monitor or cancellation flag aborts the motion.
    pub(crate) fn exec_straight(
        &mut self,
        target: i32,
        _speed: i32,
        direction: Direction,
    ) -> Result<MotionReport, DriveCtrlError> {
        let gains = self.params.gains(self.params.straight_profile);
        let coupling = self.params.p_coupling;
        let stop_band = self.params.straight_stop_band_ticks;
        let period = Duration::from_millis(self.params.tick_period_ms);

        trace!("Straight: {} ticks, {:?}", target, direction);

        // Targets are relative to the position at invocation
        self.mech.tare(Bank::Left);
        self.mech.tare(Bank::Right);

        // Fresh loop state on every entry
        let mut left = LoopState::default();
        let mut right = LoopState::default();

        let mut left_stall =
            StallMonitor::new(self.params.stall_tick_limit, self.params.stall_delta_ticks);
        let mut right_stall =
            StallMonitor::new(self.params.stall_tick_limit, self.params.stall_delta_ticks);

        let mut ticks: u32 = 0;

        loop {
            let left_pos = self.mech.bank_position(Bank::Left);
            let right_pos = self.mech.bank_position(Bank::Right);

            left.update(target.saturating_sub(left_pos));
            right.update(target.saturating_sub(right_pos));

            // Proportional terms through the coupling matrix. With the
            // default matrix each side reacts to the opposite side's error,
            // pulling the slower side along and holding the faster one back.
            let p_left =
                coupling[0][0] * left.error as f64 + coupling[0][1] * right.error as f64;
            let p_right =
                coupling[1][0] * left.error as f64 + coupling[1][1] * right.error as f64;

            let speed_left = (gains.k_p * p_left
                + gains.k_i * left.integral as f64
                + gains.k_d * left.derivative as f64) as i32;
            let speed_right = (gains.k_p * p_right
                + gains.k_i * right.integral as f64
                + gains.k_d * right.derivative as f64) as i32;

            self.flag_saturation(Bank::Left, speed_left);
            self.flag_saturation(Bank::Right, speed_right);

            // Saturating: the f64 cast can pin a speed at the integer limits
            // on extreme targets, where a plain negation would overflow
            let cmd_left = speed_left.saturating_mul(direction.sign());
            let cmd_right = speed_right.saturating_mul(direction.sign());

            self.mech.set_speed(Bank::Left, cmd_left);
            self.mech.set_speed(Bank::Right, cmd_right);

            self.archive_tick(TickRecord {
                tick: ticks,
                error_left: left.error,
                error_right: right.error,
                integral_left: left.integral,
                integral_right: right.integral,
                speed_left: cmd_left,
                speed_right: cmd_right,
            });

            // Converged when both sides are inside the stop band
            if left.error.abs() < stop_band && right.error.abs() < stop_band {
                return Ok(MotionReport {
                    ticks,
                    final_error_left: left.error,
                    final_error_right: right.error,
                    final_integral_left: left.integral,
                    final_integral_right: right.integral,
                });
            }

            ticks += 1;

            if self.cancelled() {
                self.halt_banks();
                return Err(DriveCtrlError::Cancelled);
            }

            if left_stall.check(left_pos, cmd_left) {
                self.halt_banks();
                return Err(DriveCtrlError::StallDetected {
                    bank: Bank::Left,
                    ticks: left_stall.stalled_ticks(),
                });
            }
            if right_stall.check(right_pos, cmd_right) {
                self.halt_banks();
                return Err(DriveCtrlError::StallDetected {
                    bank: Bank::Right,
                    ticks: right_stall.stalled_ticks(),
                });
            }

            if let Some(budget) = self.params.timeout_ticks {
                if ticks >= budget {
                    self.halt_banks();
                    return Err(DriveCtrlError::ConvergenceTimeout {
                        ticks,
                        final_error_left: left.error,
                        final_error_right: right.error,
                        final_integral_left: left.integral,
                        final_integral_right: right.integral,
                    });
                }
            }

            self.mech.tick_wait(period);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::mech::sim::SimMech;
    use util::module::State;

    fn straight(target: i32, direction: Direction) -> InputData {
        InputData {
            cmd: Some(MotionCmd::Straight {
                target_ticks: target,
                speed: 100,
                direction,
            }),
        }
    }

    #[test]
    fn test_converges_on_forward_target() {
        let mut ctrl = DriveCtrl::new(SimMech::new(1.0));

        let (output, status) = ctrl.proc(&straight(1000, Direction::Forward)).unwrap();
        let report = output.report.unwrap();

        assert!(status.executed);
        assert!(report.ticks < 100);
        assert!(report.final_error_left.abs() < 50);
        assert!(report.final_error_right.abs() < 50);

        // Final position on both sides is the target within the stop band
        assert!((ctrl.mech().bank_position(Bank::Left) - 1000).abs() < 50);
        assert!((ctrl.mech().bank_position(Bank::Right) - 1000).abs() < 50);

        // Net commanded motion matches the direction
        let net: i64 = ctrl
            .mech()
            .commands(Bank::Left)
            .iter()
            .map(|&c| c as i64)
            .sum();
        assert!(net > 0);

        // The unclamped loop ran the output well past the actuator scale
        assert!(status.saturated_left);
        assert!(status.saturated_right);
    }

    #[test]
    fn test_reverse_direction_drives_negative() {
        // Reversed drivetrain: encoders count positive against a negative
        // command on both banks
        let mut ctrl = DriveCtrl::new(SimMech::with_polarity(1.0, -1.0, -1.0));

        let (output, _) = ctrl.proc(&straight(1000, Direction::Reverse)).unwrap();
        let report = output.report.unwrap();

        assert!(report.final_error_left.abs() < 50);
        assert!(report.final_error_right.abs() < 50);

        // Net commanded motion matches the reversed direction
        for bank in [Bank::Left, Bank::Right].iter() {
            let net: i64 = ctrl
                .mech()
                .commands(*bank)
                .iter()
                .map(|&c| c as i64)
                .sum();
            assert!(net < 0);
        }
    }

    #[test]
    fn test_tares_at_every_entry() {
        let mut ctrl = DriveCtrl::new(SimMech::new(1.0));

        ctrl.proc(&straight(1000, Direction::Forward)).unwrap();
        let first_pos = ctrl.mech().bank_position(Bank::Left);

        // A second invocation measures from a fresh zero, not from the
        // position left behind by the first
        ctrl.proc(&straight(1000, Direction::Forward)).unwrap();
        let second_pos = ctrl.mech().bank_position(Bank::Left);

        assert!((first_pos - 1000).abs() < 50);
        assert!((second_pos - 1000).abs() < 50);
    }

    #[test]
    fn test_integral_grows_unclamped_during_stall() {
        let mut mech = SimMech::new(1.0);
        mech.freeze(Bank::Left);
        mech.freeze(Bank::Right);

        let mut ctrl = DriveCtrl::new(mech);
        ctrl.params.timeout_ticks = Some(40);

        match ctrl.proc(&straight(1000, Direction::Forward)) {
            Err(DriveCtrlError::ConvergenceTimeout {
                ticks,
                final_error_left,
                final_integral_left,
                final_integral_right,
                ..
            }) => {
                assert_eq!(ticks, 40);
                assert_eq!(final_error_left, 1000);

                // No anti-windup: the integral is exactly the error summed
                // over every tick of the stall
                assert_eq!(final_integral_left, 40 * 1000);
                assert_eq!(final_integral_right, 40 * 1000);
            }
            other => panic!("Expected ConvergenceTimeout, got {:?}", other),
        }

        // The aborted loop left both banks halted
        assert_eq!(ctrl.mech().last_command(Bank::Left), Some(0));
        assert_eq!(ctrl.mech().last_command(Bank::Right), Some(0));
    }

    #[test]
    fn test_stall_detection_on_one_bank() {
        let mut mech = SimMech::new(1.0);
        mech.freeze(Bank::Left);

        let mut ctrl = DriveCtrl::new(mech);
        ctrl.params.stall_tick_limit = Some(5);

        match ctrl.proc(&straight(1000, Direction::Forward)) {
            Err(DriveCtrlError::StallDetected { bank, ticks }) => {
                assert_eq!(bank, Bank::Left);
                assert_eq!(ticks, 5);
            }
            other => panic!("Expected StallDetected, got {:?}", other),
        }

        assert_eq!(ctrl.mech().last_command(Bank::Left), Some(0));
        assert_eq!(ctrl.mech().last_command(Bank::Right), Some(0));
    }

    #[test]
    fn test_extreme_target_saturates_commands() {
        // A target at the integer limit pins the computed speeds at
        // i32::MIN; the reverse multiplier on that value used to overflow.
        // The loop must keep running and fail by returning, not panicking.
        let mut ctrl = DriveCtrl::new(SimMech::with_polarity(1.0, -1.0, -1.0));
        ctrl.params.timeout_ticks = Some(5);

        match ctrl.proc(&straight(i32::MIN, Direction::Reverse)) {
            Err(DriveCtrlError::ConvergenceTimeout { ticks, .. }) => assert_eq!(ticks, 5),
            other => panic!("Expected ConvergenceTimeout, got {:?}", other),
        }

        assert_eq!(ctrl.mech().last_command(Bank::Left), Some(0));
        assert_eq!(ctrl.mech().last_command(Bank::Right), Some(0));
    }

    #[test]
    fn test_cancel_aborts_on_first_tick() {
        let mut ctrl = DriveCtrl::new(SimMech::new(1.0));
        let handle = ctrl.cancel_handle();
        handle.cancel();

        match ctrl.proc(&straight(1000, Direction::Forward)) {
            Err(DriveCtrlError::Cancelled) => (),
            other => panic!("Expected Cancelled, got {:?}", other),
        }

        assert_eq!(ctrl.mech().last_command(Bank::Left), Some(0));
        assert_eq!(ctrl.mech().last_command(Bank::Right), Some(0));

        // Clearing the flag lets a subsequent motion run to convergence
        handle.clear();

        let (output, _) = ctrl.proc(&straight(1000, Direction::Forward)).unwrap();
        assert!(output.report.unwrap().final_error_left.abs() < 50);
    }

    #[test]
    fn test_cross_coupling_is_load_bearing() {
        // Freeze the right bank. With the cross-coupled proportional term
        // the left side keeps chasing the right side's stuck error and runs
        // far past its own target.
        let mut mech = SimMech::new(1.0);
        mech.freeze(Bank::Right);

        let mut ctrl = DriveCtrl::new(mech);
        ctrl.params.timeout_ticks = Some(50);

        match ctrl.proc(&straight(1000, Direction::Forward)) {
            Err(DriveCtrlError::ConvergenceTimeout {
                final_error_left, ..
            }) => assert!(final_error_left < -1000),
            other => panic!("Expected ConvergenceTimeout, got {:?}", other),
        }

        // With an identity coupling matrix the left side settles near its
        // own target instead
        let mut mech = SimMech::new(1.0);
        mech.freeze(Bank::Right);

        let mut ctrl = DriveCtrl::new(mech);
        ctrl.params.timeout_ticks = Some(50);
        ctrl.params.p_coupling = [[1.0, 0.0], [0.0, 1.0]];

        match ctrl.proc(&straight(1000, Direction::Forward)) {
            Err(DriveCtrlError::ConvergenceTimeout {
                final_error_left, ..
            }) => assert!(final_error_left.abs() < 200),
            other => panic!("Expected ConvergenceTimeout, got {:?}", other),
        }
    }
}
