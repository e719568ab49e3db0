//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
#[derive(Debug, Deserialize)]
pub struct Params {
    // ---- TIMING ----
    /// Fixed period of one control tick.
    ///
    /// Units: milliseconds
    pub tick_period_ms: u64,

    /// Maximum number of ticks a loop may run before it is aborted with a
    /// `ConvergenceTimeout`. `None` reproduces the legacy unbounded loop,
    /// which will hang if the target is unreachable.
    #[serde(default)]
    pub timeout_ticks: Option<u32>,

    // ---- STALL DETECTION ----
    /// Number of consecutive ticks of no position change under a nonzero
    /// command after which a bank is declared stalled. `None` disables stall
    /// detection.
    #[serde(default)]
    pub stall_tick_limit: Option<u32>,

    /// Largest per-tick position change still considered "no movement" by
    /// the stall monitor.
    ///
    /// Units: encoder ticks
    pub stall_delta_ticks: i32,

    // ---- TERMINATION ----
    /// Stop band for the straight-line loop, applied to both side errors.
    ///
    /// Units: encoder ticks
    pub straight_stop_band_ticks: i32,

    /// Stop band for the point-turn loop, applied to both side errors.
    ///
    /// Units: encoder ticks
    pub point_turn_stop_band_ticks: i32,

    /// Stop band for the swing-turn loop. Tighter than the other two by
    /// design - do not harmonise.
    ///
    /// Units: encoder ticks
    pub swing_stop_band_ticks: i32,

    // ---- GAINS ----
    /// Gain set nominally used for linear motion.
    pub linear_gains: Gains,

    /// Gain set nominally used for angular motion.
    pub angular_gains: Gains,

    /// Which gain set the straight-line loop uses.
    pub straight_profile: GainProfile,

    /// Which gain set the point-turn loop uses. The as-tuned wiring reuses
    /// the linear set here even though the motion is angular.
    pub point_turn_profile: GainProfile,

    /// Which gain set the swing-turn loop uses.
    pub swing_profile: GainProfile,

    // ---- COUPLING ----
    /// Proportional coupling matrix for the two-sided loops. Row i gives the
    /// weights of (left error, right error) in side i's proportional term.
    /// The default `[[0, 1], [1, 0]]` feeds each side the opposite side's
    /// error - the synchronisation design, not a typo.
    pub p_coupling: [[f64; 2]; 2],
}

/// A single PID gain triple, read-only during a loop.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Gains {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Selects one of the two shared gain sets.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GainProfile {
    Linear,
    Angular,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Resolve a gain profile to its gain set.
    pub fn gains(&self, profile: GainProfile) -> Gains {
        match profile {
            GainProfile::Linear => self.linear_gains,
            GainProfile::Angular => self.angular_gains,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params {
            tick_period_ms: 10,
            timeout_ticks: Some(1500),
            stall_tick_limit: None,
            stall_delta_ticks: 0,
            straight_stop_band_ticks: 50,
            point_turn_stop_band_ticks: 50,
            swing_stop_band_ticks: 5,
            linear_gains: Gains {
                k_p: 10.0,
                k_i: 0.0,
                k_d: 3.0,
            },
            angular_gains: Gains {
                k_p: 2.0,
                k_i: 0.0,
                k_d: 10.0,
            },
            straight_profile: GainProfile::Linear,
            point_turn_profile: GainProfile::Linear,
            swing_profile: GainProfile::Angular,
            p_coupling: [[0.0, 1.0], [1.0, 0.0]],
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Mirror of `params/drive_ctrl.toml`.
    const PARAM_FILE: &str = r#"
        tick_period_ms = 10
        timeout_ticks = 1500
        stall_delta_ticks = 0

        straight_stop_band_ticks = 50
        point_turn_stop_band_ticks = 50
        swing_stop_band_ticks = 5

        straight_profile = "linear"
        point_turn_profile = "linear"
        swing_profile = "angular"

        p_coupling = [[0.0, 1.0], [1.0, 0.0]]

        [linear_gains]
        k_p = 10.0
        k_i = 0.0
        k_d = 3.0

        [angular_gains]
        k_p = 2.0
        k_i = 0.0
        k_d = 10.0
    "#;

    #[test]
    fn test_param_file_matches_defaults() {
        let params: Params = toml::from_str(PARAM_FILE).unwrap();

        assert_eq!(params.tick_period_ms, 10);
        assert_eq!(params.timeout_ticks, Some(1500));
        assert_eq!(params.stall_tick_limit, None);
        assert_eq!(params.straight_stop_band_ticks, 50);
        assert_eq!(params.point_turn_stop_band_ticks, 50);
        assert_eq!(params.swing_stop_band_ticks, 5);
        assert_eq!(params.linear_gains, Params::default().linear_gains);
        assert_eq!(params.angular_gains, Params::default().angular_gains);
        assert_eq!(params.straight_profile, GainProfile::Linear);
        assert_eq!(params.point_turn_profile, GainProfile::Linear);
        assert_eq!(params.swing_profile, GainProfile::Angular);
        assert_eq!(params.p_coupling, [[0.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_gain_profile_resolution() {
        let params = Params::default();

        assert_eq!(params.gains(GainProfile::Linear), params.linear_gains);
        assert_eq!(params.gains(GainProfile::Angular), params.angular_gains);
    }
}
