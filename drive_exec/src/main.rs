//! Main drive-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Construct a drivetrain behind the `Mech` boundary
//!     - Initialise the drive control module
//!     - Execute motion commands one at a time, blocking on each until the
//!       loop converges or fails
//!
//! The executable drives a bench model of the drivetrain. Before each motion
//! the bench is reconfigured for the manouvre being demonstrated, since the
//! encoder sense of a bank relative to its command depends on the manouvre
//! (a point turn drives the mirrored right bank backwards).
//!
//! # Modules
//!
//! All modules (e.g. `drive_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State`
//!        trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};

// Internal
use drive_lib::{
    drive_ctrl::{Direction, DriveCtrl, InputData, MotionCmd, TurnSense},
    mech::{sim::SimMech, Bank},
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One step of the demonstration sequence: a motion command and the bench
/// drivetrain configuration it runs against.
struct DemoStep {
    cmd: MotionCmd,
    response: f64,
    left_polarity: f64,
    right_polarity: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Tank Bot Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut drive_ctrl = DriveCtrl::new(SimMech::new(1.0));
    drive_ctrl
        .init("drive_ctrl.toml", &session)
        .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete\n");

    // ---- DEMONSTRATION SEQUENCE ----

    let sequence = vec![
        DemoStep {
            cmd: MotionCmd::Straight {
                target_ticks: 1000,
                speed: 100,
                direction: Direction::Forward,
            },
            response: 1.0,
            left_polarity: 1.0,
            right_polarity: 1.0,
        },
        DemoStep {
            cmd: MotionCmd::PointTurn {
                target_ticks: 600,
                speed: 80,
                sense: TurnSense::Right,
            },
            response: 1.0,
            left_polarity: 1.0,
            right_polarity: -1.0,
        },
        DemoStep {
            cmd: MotionCmd::SwingTurn {
                target_ticks: 200,
                speed: 60,
                side: Bank::Left,
            },
            response: 0.02,
            left_polarity: 1.0,
            right_polarity: 1.0,
        },
    ];

    for step in sequence {
        // Reconfigure the bench for this manouvre
        {
            let bench = drive_ctrl.mech_mut();
            bench.set_response(step.response);
            bench.set_polarity(Bank::Left, step.left_polarity);
            bench.set_polarity(Bank::Right, step.right_polarity);
        }

        info!("Executing {:?}", step.cmd);

        match drive_ctrl.proc(&InputData {
            cmd: Some(step.cmd),
        }) {
            Ok((output, status_rpt)) => {
                info!("Motion report: {:?}", output.report);
                info!("Status report: {:?}", status_rpt);
            }
            // Loop failures are recoverable: the motors are already halted
            Err(e) => warn!("Motion failed: {}", e),
        }

        if let Err(e) = drive_ctrl.write() {
            warn!("Could not write DriveCtrl archives: {}", e);
        }
    }

    info!("Demonstration sequence complete");

    Ok(())
}
