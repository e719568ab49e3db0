//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Internal
use super::{DriveCtrlError, MotionCmd, Params};
use crate::mech::{Bank, Mech, ACTUATOR_SCALE};
use util::{
    archive::{Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state.
///
/// Owns the mechanisms boundary for the duration of its life - exactly one
/// control loop can write to a bank's command channel at any time, and the
/// loops are not re-entrant.
pub struct DriveCtrl<M: Mech> {
    pub(crate) params: Params,

    pub(crate) mech: M,

    pub(crate) report: StatusReport,

    /// Cooperative cancellation flag, checked once per tick.
    cancel: Arc<AtomicBool>,

    pub(crate) arch_ticks: Archiver,
    arch_reports: Archiver,
    arch_motions: Archiver,
}

/// Input data to drive control.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputData {
    /// The motion command to be executed, or `None` if there is nothing to
    /// do on this cycle.
    pub cmd: Option<MotionCmd>,
}

/// Output from one processing cycle of DriveCtrl.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct OutputData {
    /// The report of the completed motion, or `None` if no command was given.
    pub report: Option<MotionReport>,
}

/// Summary of one converged motion.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MotionReport {
    /// Number of completed control ticks before convergence.
    pub ticks: u32,

    /// Final left/right side errors in ticks. A swing turn reports only its
    /// moving side, the other entry is zero.
    pub final_error_left: i32,
    pub final_error_right: i32,

    /// Final integral accumulations. Unclamped by design.
    pub final_integral_left: i64,
    pub final_integral_right: i64,
}

/// Status report for DriveCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if a motion primitive was executed this cycle.
    pub executed: bool,

    /// Raised when a computed output exceeded the actuator scale and was
    /// left for the actuator to saturate.
    pub saturated_left: bool,
    pub saturated_right: bool,
}

/// Per-axis loop state, constructed fresh at every loop entry.
///
/// Never held at module level: each invocation of a primitive starts with
/// error, integral and previous-error at zero.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LoopState {
    pub error: i32,
    pub integral: i64,
    pub derivative: i32,
    prev_error: i32,
}

/// Per-tick telemetry record archived by the loops.
#[derive(Serialize)]
pub(crate) struct TickRecord {
    pub tick: u32,
    pub error_left: i32,
    pub error_right: i32,
    pub integral_left: i64,
    pub integral_right: i64,
    pub speed_left: i32,
    pub speed_right: i32,
}

/// Watches one axis for a stall: a nonzero command with no position change.
pub(crate) struct StallMonitor {
    limit: Option<u32>,
    delta: i32,
    prev_pos: Option<i32>,
    count: u32,
}

/// Handle used to cooperatively abort a running motion from another thread.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoopState {
    /// Fold a fresh error measurement into the state: accumulate the
    /// integral (no anti-windup clamp, deliberately) and difference the
    /// error against the previous tick's.
    pub fn update(&mut self, error: i32) {
        self.error = error;
        self.integral += error as i64;
        self.derivative = error.saturating_sub(self.prev_error);
        self.prev_error = error;
    }
}

impl StallMonitor {
    pub fn new(limit: Option<u32>, delta: i32) -> Self {
        StallMonitor {
            limit,
            delta,
            prev_pos: None,
            count: 0,
        }
    }

    /// Feed one tick's position and command. Returns true once the axis has
    /// been stalled for the configured number of consecutive ticks.
    pub fn check(&mut self, pos: i32, cmd: i32) -> bool {
        let limit = match self.limit {
            Some(l) => l,
            None => return false,
        };

        match self.prev_pos {
            Some(prev) => {
                if cmd != 0 && (pos - prev).abs() <= self.delta {
                    self.count += 1;
                } else {
                    self.count = 0;
                }
            }
            None => (),
        }
        self.prev_pos = Some(pos);

        self.count >= limit
    }

    /// Number of consecutive stalled ticks observed so far.
    pub fn stalled_ticks(&self) -> u32 {
        self.count
    }
}

impl CancelHandle {
    /// Request that the running motion abort at its next tick.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clear a previously raised cancellation request.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

impl<M: Mech> DriveCtrl<M> {
    /// Create a new drive controller owning the given mechanisms boundary.
    ///
    /// Parameters start at their defaults; `init` replaces them with the
    /// parameter file and attaches the session archivers.
    pub fn new(mech: M) -> Self {
        DriveCtrl {
            params: Params::default(),
            mech,
            report: StatusReport::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            arch_ticks: Archiver::default(),
            arch_reports: Archiver::default(),
            arch_motions: Archiver::default(),
        }
    }

    /// Get a handle which can cancel a running motion from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    /// Read-only access to the mechanisms boundary.
    pub fn mech(&self) -> &M {
        &self.mech
    }

    /// Mutable access to the mechanisms boundary. Ownership stays with the
    /// controller - the borrow cannot outlive a motion in progress.
    pub fn mech_mut(&mut self) -> &mut M {
        &mut self.mech
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Zero both command channels. Used on every abnormal exit so a failed
    /// loop never leaves the drivetrain running.
    pub(crate) fn halt_banks(&mut self) {
        self.mech.set_speed(Bank::Left, 0);
        self.mech.set_speed(Bank::Right, 0);
    }

    /// Raise the saturation flag for a bank if the computed output exceeds
    /// the actuator scale.
    pub(crate) fn flag_saturation(&mut self, bank: Bank, speed: i32) {
        if speed.abs() > ACTUATOR_SCALE {
            match bank {
                Bank::Left => self.report.saturated_left = true,
                Bank::Right => self.report.saturated_right = true,
            }
        }
    }

    /// Archive one tick of loop telemetry.
    pub(crate) fn archive_tick(&mut self, record: TickRecord) {
        if let Err(e) = self.arch_ticks.serialise(record) {
            warn!("Could not archive tick record: {}", e);
        }
    }
}

impl<M: Mech> State for DriveCtrl<M> {
    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        // Load the parameters
        self.params = match params::load(init_data) {
            Ok(p) => p,
            Err(e) => return Err(e),
        };

        // Create the arch folder for drive_ctrl
        let mut arch_path = session.arch_root.clone();
        arch_path.push("drive_ctrl");
        std::fs::create_dir_all(arch_path).unwrap();

        // Initialise the archivers
        self.arch_ticks = Archiver::from_path(session, "drive_ctrl/ticks.csv").unwrap();
        self.arch_reports = Archiver::from_path(session, "drive_ctrl/status_report.csv").unwrap();
        self.arch_motions = Archiver::from_path(session, "drive_ctrl/motion_reports.csv").unwrap();

        Ok(())
    }

    /// Execute at most one motion primitive.
    ///
    /// Blocks until the commanded motion converges or fails. With no command
    /// this is a no-op cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        let cmd = match input_data.cmd {
            Some(c) => c,
            None => return Ok((OutputData { report: None }, self.report)),
        };

        debug!("DriveCtrl executing {:?}", cmd);
        self.report.executed = true;

        let motion_report = match cmd {
            MotionCmd::Straight {
                target_ticks,
                speed,
                direction,
            } => self.exec_straight(target_ticks, speed, direction)?,
            MotionCmd::PointTurn {
                target_ticks,
                speed,
                sense,
            } => self.exec_point_turn(target_ticks, speed, sense)?,
            MotionCmd::SwingTurn {
                target_ticks,
                speed,
                side,
            } => self.exec_swing_turn(target_ticks, speed, side)?,
        };

        if let Err(e) = self.arch_motions.serialise(motion_report) {
            warn!("Could not archive motion report: {}", e);
        }

        Ok((
            OutputData {
                report: Some(motion_report),
            },
            self.report,
        ))
    }
}

impl<M: Mech> Archived for DriveCtrl<M> {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_reports.serialise(self.report)?;

        Ok(())
    }
}
