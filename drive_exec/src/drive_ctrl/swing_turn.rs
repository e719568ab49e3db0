//! Swing-turn motion primitive

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
    /// Pivot about one stationary side.
    ///
    /// A single-axis loop: only the moving bank is position-controlled, and
    /// its feedback is the raw position of the bank's front motor rather
    /// than the three-motor average used by the two-sided primitives. The
    /// stationary bank is commanded to zero on every tick. The stop band is
    /// tighter than the other primitives' by design. No tare at entry.
    pub(crate) fn exec_swing_turn(
        &mut self,
        target: i32,
        _speed: i32,
        side: Bank,
    ) -> Result<MotionReport, DriveCtrlError> {
        let gains = self.params.gains(self.params.swing_profile);
        let stop_band = self.params.swing_stop_band_ticks;
        let period = Duration::from_millis(self.params.tick_period_ms);

        let held = side.other();

        trace!("Swing turn: {} ticks about {:?} side", target, held);

        // Fresh loop state on every entry
        let mut axis = LoopState::default();

        let mut stall =
            StallMonitor::new(self.params.stall_tick_limit, self.params.stall_delta_ticks);

        let mut ticks: u32 = 0;

        loop {
            // Front motor raw position, not a bank average
            let pos = self.mech.motor_position(side, 0);

            axis.update(target.saturating_sub(pos));

            let speed = (gains.k_p * axis.error as f64
                + gains.k_i * axis.integral as f64
                + gains.k_d * axis.derivative as f64) as i32;

            self.flag_saturation(side, speed);

            self.mech.set_speed(side, speed);
            self.mech.set_speed(held, 0);

            let (error_left, error_right) = match side {
                Bank::Left => (axis.error, 0),
                Bank::Right => (0, axis.error),
            };
            let (speed_left, speed_right) = match side {
                Bank::Left => (speed, 0),
                Bank::Right => (0, speed),
            };

            self.archive_tick(TickRecord {
                tick: ticks,
                error_left,
                error_right,
                integral_left: if side == Bank::Left { axis.integral } else { 0 },
                integral_right: if side == Bank::Right { axis.integral } else { 0 },
                speed_left,
                speed_right,
            });

            if axis.error.abs() < stop_band {
                return Ok(MotionReport {
                    ticks,
                    final_error_left: error_left,
                    final_error_right: error_right,
                    final_integral_left: if side == Bank::Left { axis.integral } else { 0 },
                    final_integral_right: if side == Bank::Right { axis.integral } else { 0 },
                });
            }

            ticks += 1;

            if self.cancelled() {
                self.halt_banks();
                return Err(DriveCtrlError::Cancelled);
            }

            if stall.check(pos, speed) {
                self.halt_banks();
                return Err(DriveCtrlError::StallDetected {
                    bank: side,
                    ticks: stall.stalled_ticks(),
                });
            }

            if let Some(budget) = self.params.timeout_ticks {
                if ticks >= budget {
                    self.halt_banks();
                    return Err(DriveCtrlError::ConvergenceTimeout {
                        ticks,
                        final_error_left: error_left,
                        final_error_right: error_right,
                        final_integral_left: if side == Bank::Left { axis.integral } else { 0 },
                        final_integral_right: if side == Bank::Right { axis.integral } else { 0 },
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
