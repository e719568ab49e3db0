//! Point-turn motion primitive

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
    /// Rotate the chassis in place.
    ///
    /// The per-tick structure matches the straight-line loop - both sides
    /// are driven toward the same target with the same cross-coupled
    /// proportional terms - but the right bank's output is negated, and the
    /// turn sense is a uniform multiplier on both outputs. Unlike the
    /// straight-line loop the encoders are NOT tared at entry: the target is
    /// interpreted against whatever zero was last set.
    pub(crate) fn exec_point_turn(
        &mut self,
        target: i32,
        _speed: i32,
        sense: TurnSense,
    ) -> Result<MotionReport, DriveCtrlError> {
        let gains = self.params.gains(self.params.point_turn_profile);
        let coupling = self.params.p_coupling;
        let stop_band = self.params.point_turn_stop_band_ticks;
        let period = Duration::from_millis(self.params.tick_period_ms);

        trace!("Point turn: {} ticks, {:?}", target, sense);

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

            // Opposite output polarity rotates in place. Saturating: the f64
            // cast can pin a speed at the integer limits on extreme targets,
            // where a plain negation would overflow
            let cmd_left = speed_left.saturating_mul(sense.sign());
            let cmd_right = speed_right.saturating_neg().saturating_mul(sense.sign());

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

    fn point_turn(target: i32, sense: TurnSense) -> InputData {
        InputData {
            cmd: Some(MotionCmd::PointTurn {
                target_ticks: target,
                speed: 80,
                sense,
            }),
        }
    }

    /// Bench model of a right turn: the left bank drives forward, the
    /// mirrored right bank counts positive against its negated command.
    fn right_turn_mech() -> SimMech {
        SimMech::with_polarity(1.0, 1.0, -1.0)
    }

    #[test]
    fn test_converges_with_opposite_commands() {
        let mut ctrl = DriveCtrl::new(right_turn_mech());

        let (output, _) = ctrl.proc(&point_turn(600, TurnSense::Right)).unwrap();
        let report = output.report.unwrap();

        assert!(report.final_error_left.abs() < 50);
        assert!(report.final_error_right.abs() < 50);

        // At every tick where both commands are nonzero they are opposite
        // in sign
        let left_cmds = ctrl.mech().commands(Bank::Left);
        let right_cmds = ctrl.mech().commands(Bank::Right);
        assert_eq!(left_cmds.len(), right_cmds.len());
        for (l, r) in left_cmds.iter().zip(right_cmds.iter()) {
            if *l != 0 && *r != 0 {
                assert_eq!(l.signum(), -r.signum());
            }
        }
    }

    #[test]
    fn test_left_sense_mirrors_outputs() {
        // Mirror bench: for a left turn the left bank is the one driven
        // backwards
        let mut ctrl = DriveCtrl::new(SimMech::with_polarity(1.0, -1.0, 1.0));

        let (output, _) = ctrl.proc(&point_turn(600, TurnSense::Left)).unwrap();
        let report = output.report.unwrap();

        assert!(report.final_error_left.abs() < 50);
        assert!(report.final_error_right.abs() < 50);

        let net_left: i64 = ctrl
            .mech()
            .commands(Bank::Left)
            .iter()
            .map(|&c| c as i64)
            .sum();
        assert!(net_left < 0);
    }

    #[test]
    fn test_extreme_target_saturates_commands() {
        // A target at the integer limit pins the computed speeds at
        // i32::MIN, where negating the right output used to overflow. The
        // loop must keep running and fail by returning, not by panicking.
        let mut ctrl = DriveCtrl::new(right_turn_mech());
        ctrl.params.timeout_ticks = Some(5);

        match ctrl.proc(&point_turn(i32::MIN, TurnSense::Right)) {
            Err(DriveCtrlError::ConvergenceTimeout { ticks, .. }) => assert_eq!(ticks, 5),
            other => panic!("Expected ConvergenceTimeout, got {:?}", other),
        }

        // Saturated outputs still drive each bank in its commanded sense
        assert!(ctrl.mech().commands(Bank::Left).iter().all(|&c| c <= 0));
        assert!(ctrl.mech().commands(Bank::Right).iter().all(|&c| c >= 0));
        assert_eq!(ctrl.mech().last_command(Bank::Left), Some(0));
        assert_eq!(ctrl.mech().last_command(Bank::Right), Some(0));
    }

    #[test]
    fn test_measures_from_last_set_zero() {
        let mut ctrl = DriveCtrl::new(right_turn_mech());

        ctrl.proc(&point_turn(600, TurnSense::Right)).unwrap();
        let pos_after_first = ctrl.mech().bank_position(Bank::Left);

        // No tare at entry: a second identical command sees the residual
        // error from the first motion already inside the stop band and
        // returns without moving
        let (output, _) = ctrl.proc(&point_turn(600, TurnSense::Right)).unwrap();
        let report = output.report.unwrap();

        assert_eq!(report.ticks, 0);
        assert_eq!(ctrl.mech().bank_position(Bank::Left), pos_after_first);
    }
}
