//! Engine-on, moving and flying windows of a flight.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::field::Field;
use crate::series::TimeSeries;
use crate::time_range::TimeRange;

/// Trim `store` to the span between the first run of `min_run` samples of
/// `field` satisfying `matching` and the last matching sample.
///
/// `None` when the field is absent or no run qualifies.
pub fn detect_window<P>(
    store: &TimeSeries<Field, f64>,
    field: Field,
    min_run: usize,
    matching: P,
) -> Option<(TimeSeries<Field, f64>, TimeRange)>
where
    P: Fn(&f64) -> bool,
{
    store.position_first(field, min_run, &matching)?;
    let trimmed = store
        .drop_first(field, min_run, &matching)?
        .drop_last(field, &matching)?;
    let range = TimeRange::new(trimmed.first_date()?, trimmed.last_date()?);
    Some((trimmed, range))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightWindows {
    pub engine_on: Option<TimeRange>,
    pub moving: Option<TimeRange>,
    pub flying: Option<TimeRange>,
}

impl FlightWindows {
    /// Moving and flying are searched inside the engine-on window only.
    pub fn detect(store: &TimeSeries<Field, f64>, config: &AnalysisConfig) -> Self {
        let Some((engine_store, engine_on)) = detect_window(store, Field::E1PctPwr, 1, |v| {
            *v > config.engine_on_threshold
        }) else {
            tracing::debug!("no engine-on window");
            return Self::default();
        };

        let moving = detect_window(&engine_store, Field::GndSpd, config.moving_min_run, |v| {
            *v > config.moving_threshold
        })
        .map(|(_, range)| range);
        let flying = detect_window(&engine_store, Field::Ias, 1, |v| {
            *v > config.flying_ias_threshold
        })
        .map(|(_, range)| range);

        Self {
            engine_on: Some(engine_on),
            moving,
            flying,
        }
    }
}
