//! Analysis thresholds.
//!
//! One immutable [`AnalysisConfig`] is built by the host (usually from JSON)
//! and passed by reference to every component that needs a threshold.

use serde::{Deserialize, Serialize};

use crate::error::FlightLogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// `E1 %Pwr` strictly above this means the engine is running.
    pub engine_on_threshold: f64,
    /// `GndSpd` strictly above this (kt) means the aircraft is moving.
    pub moving_threshold: f64,
    /// Consecutive moving samples required before taxi counts as started.
    pub moving_min_run: usize,
    /// `IAS` strictly above this (kt) means the aircraft is flying.
    pub flying_ias_threshold: f64,
    /// Rolling window length for flight phase classification.
    pub phase_window: usize,
    /// Observations needed in the window before a phase is emitted.
    pub phase_min_observations: usize,
    /// `IAS` strictly above this (kt) means airborne for phase purposes.
    pub phase_ias_threshold: f64,
    /// Altitude change (ft) across the window that separates climb/descent from cruise.
    pub phase_altitude_delta: f64,
    /// Bucket size for interval leg segmentation, in seconds.
    pub leg_interval_secs: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            engine_on_threshold: 0.0,
            moving_threshold: 0.0,
            moving_min_run: 5,
            flying_ias_threshold: 35.0,
            phase_window: 20,
            phase_min_observations: 15,
            phase_ias_threshold: 35.0,
            phase_altitude_delta: 50.0,
            leg_interval_secs: 60,
        }
    }
}

impl AnalysisConfig {
    /// Decode a configuration, filling missing keys with defaults.
    pub fn from_json(json: &str) -> Result<Self, FlightLogError> {
        let config: AnalysisConfig =
            serde_json::from_str(json).map_err(|e| FlightLogError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FlightLogError> {
        if self.phase_window == 0 {
            return Err(FlightLogError::InvalidConfig(
                "phase_window must be > 0".to_string(),
            ));
        }
        if self.phase_min_observations > self.phase_window {
            return Err(FlightLogError::InvalidConfig(format!(
                "phase_min_observations ({}) exceeds phase_window ({})",
                self.phase_min_observations, self.phase_window
            )));
        }
        if self.moving_min_run == 0 {
            return Err(FlightLogError::InvalidConfig(
                "moving_min_run must be > 0".to_string(),
            ));
        }
        if self.leg_interval_secs <= 0 {
            return Err(FlightLogError::InvalidConfig(
                "leg_interval_secs must be > 0".to_string(),
            ));
        }
        let thresholds = [
            self.engine_on_threshold,
            self.moving_threshold,
            self.flying_ias_threshold,
            self.phase_ias_threshold,
            self.phase_altitude_delta,
        ];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(FlightLogError::InvalidConfig(
                "thresholds must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
