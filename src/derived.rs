//! Derived channels computed while a log is parsed.
//!
//! Row calculations are pure functions of values at the same row (plus the
//! previous output for running totals). Flight phase is a look-back
//! classification over a rolling window of airspeed and altitude, labelled in
//! a pass over the finished columns.

use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::fmt;

use crate::config::AnalysisConfig;
use crate::field::Field;
use crate::models::Coordinate;

/// What a row calculation does when an input is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInputs {
    /// Any non-finite input makes every output `NaN`.
    Propagate,
    /// Inputs are passed through as-is; the function skips `NaN`s itself.
    Skip,
}

/// A numeric function of several inputs at one row producing one or more outputs.
///
/// An input that is also an output reads the value produced for it on the
/// previous row, or `initial` on the first row. A `NaN` output therefore
/// carries forward into every later row.
#[derive(Debug, Clone)]
pub struct RowCalculation {
    pub outputs: Vec<Field>,
    pub inputs: Vec<Field>,
    pub initial: f64,
    pub missing: MissingInputs,
    compute: fn(&[f64], &mut Vec<f64>),
}

impl RowCalculation {
    pub fn new(
        outputs: Vec<Field>,
        inputs: Vec<Field>,
        missing: MissingInputs,
        compute: fn(&[f64], &mut Vec<f64>),
    ) -> Self {
        Self {
            outputs,
            inputs,
            initial: 0.0,
            missing,
            compute,
        }
    }

    pub fn with_initial(mut self, initial: f64) -> Self {
        self.initial = initial;
        self
    }

    /// Calculations applied to every log.
    pub fn builtin() -> Vec<RowCalculation> {
        vec![
            RowCalculation::new(
                vec![Field::FQtyT],
                vec![Field::FQtyL, Field::FQtyR],
                MissingInputs::Propagate,
                sum,
            ),
            RowCalculation::new(
                vec![Field::E1EgtMax, Field::E1EgtMin, Field::E1EgtMaxIdx],
                vec![
                    Field::E1Egt1,
                    Field::E1Egt2,
                    Field::E1Egt3,
                    Field::E1Egt4,
                    Field::E1Egt5,
                    Field::E1Egt6,
                ],
                MissingInputs::Skip,
                extremes,
            ),
            RowCalculation::new(
                vec![Field::E1ChtMax, Field::E1ChtMin, Field::E1ChtMaxIdx],
                vec![
                    Field::E1Cht1,
                    Field::E1Cht2,
                    Field::E1Cht3,
                    Field::E1Cht4,
                    Field::E1Cht5,
                    Field::E1Cht6,
                ],
                MissingInputs::Skip,
                extremes,
            ),
            RowCalculation::new(
                vec![Field::WndCross, Field::WndDirect],
                vec![Field::WndDr, Field::WndSpd, Field::Crs],
                MissingInputs::Propagate,
                wind,
            ),
            RowCalculation::new(
                vec![Field::FTotalizerT],
                vec![Field::FTotalizerT, Field::E1FFlow],
                MissingInputs::Propagate,
                totalizer,
            )
            .with_initial(0.0),
        ]
    }

    fn is_self_input(&self, field: Field) -> bool {
        self.outputs.contains(&field)
    }
}

fn sum(x: &[f64], out: &mut Vec<f64>) {
    out.push(x.iter().sum());
}

/// Fuel flow is in gallons per hour and samples are one second apart.
fn totalizer(x: &[f64], out: &mut Vec<f64>) {
    out.push(x[0] + x[1] / 3600.0);
}

fn wind(x: &[f64], out: &mut Vec<f64>) {
    let components = wind_components(x[0], x[1], x[2]);
    out.push(components.cross);
    out.push(components.direct);
}

/// Max, min and 0-based position of the first max over the finite inputs.
fn extremes(x: &[f64], out: &mut Vec<f64>) {
    let best = x
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |acc: Option<(usize, f64, f64)>, (i, &v)| match acc {
            None => Some((i, v, v)),
            Some((_, max, min)) if v > max => Some((i, v, min.min(v))),
            Some((idx, max, min)) => Some((idx, max, min.min(v))),
        });
    match best {
        Some((idx, max, min)) => {
            out.push(max);
            out.push(min);
            out.push(idx as f64);
        }
        None => out.extend([f64::NAN; 3]),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindComponents {
    /// Crosswind magnitude, always >= 0.
    pub cross: f64,
    /// Along-track component: negative for a headwind, positive for a tailwind.
    pub direct: f64,
}

/// Split a wind (direction it blows from, in degrees) against a course.
pub fn wind_components(direction_deg: f64, speed: f64, course_deg: f64) -> WindComponents {
    let direction = direction_deg.rem_euclid(360.0);
    let course = course_deg.rem_euclid(360.0);
    let mut diff = (direction - course).abs();
    if diff > 180.0 {
        diff = 360.0 - diff;
    }
    let angle = PI * diff / 180.0;
    WindComponents {
        cross: speed * angle.sin(),
        direct: -speed * angle.cos(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Column(usize),
    Previous(usize),
    Missing,
}

#[derive(Debug)]
struct BoundCalculation<'a> {
    calc: &'a RowCalculation,
    sources: Vec<Source>,
    previous: Vec<f64>,
}

/// Calculations bound to one file's numeric column layout.
///
/// `evaluate` appends `Distance` (when tracked) and then every active
/// calculation's outputs to a row holding the file's numeric columns, in the
/// order given by [`RowEvaluator::output_fields`].
#[derive(Debug)]
pub struct RowEvaluator<'a> {
    active: Vec<BoundCalculation<'a>>,
    output_fields: Vec<Field>,
    track_distance: bool,
    last_fix: Option<Coordinate>,
    distance_nm: f64,
    inputs: Vec<f64>,
    outputs: Vec<f64>,
}

impl<'a> RowEvaluator<'a> {
    fn new(calculations: &'a [RowCalculation], numeric_fields: &[Field]) -> Self {
        let mut index: HashMap<Field, usize> = HashMap::new();
        for (i, field) in numeric_fields.iter().enumerate() {
            if *field != Field::Unknown {
                index.entry(*field).or_insert(i);
            }
        }
        let mut width = numeric_fields.len();
        let mut output_fields = Vec::new();

        let track_distance = !index.contains_key(&Field::Distance);
        if track_distance {
            index.insert(Field::Distance, width);
            output_fields.push(Field::Distance);
            width += 1;
        }

        let mut active = Vec::new();
        for calc in calculations {
            if let Some(existing) = calc.outputs.iter().find(|f| index.contains_key(f)) {
                tracing::debug!(field = %existing, "derived field already present, skipping calculation");
                continue;
            }
            let has_input = calc
                .inputs
                .iter()
                .any(|f| !calc.is_self_input(*f) && index.contains_key(f));
            if !has_input {
                continue;
            }

            let sources = calc
                .inputs
                .iter()
                .map(|f| match calc.outputs.iter().position(|o| o == f) {
                    Some(k) => Source::Previous(k),
                    None => index.get(f).map_or(Source::Missing, |&i| Source::Column(i)),
                })
                .collect();
            for output in &calc.outputs {
                index.insert(*output, width);
                output_fields.push(*output);
                width += 1;
            }
            active.push(BoundCalculation {
                calc,
                sources,
                previous: vec![calc.initial; calc.outputs.len()],
            });
        }

        Self {
            active,
            output_fields,
            track_distance,
            last_fix: None,
            distance_nm: 0.0,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Fields appended to every row, in order.
    pub fn output_fields(&self) -> &[Field] {
        &self.output_fields
    }

    pub fn evaluate(&mut self, row: &mut Vec<f64>, coordinate: Coordinate) {
        if self.track_distance {
            if coordinate.is_valid() {
                if let Some(last) = self.last_fix {
                    self.distance_nm += last.distance_nm(&coordinate);
                }
                self.last_fix = Some(coordinate);
            }
            row.push(self.distance_nm);
        }

        for bound in &mut self.active {
            self.inputs.clear();
            for source in &bound.sources {
                self.inputs.push(match *source {
                    Source::Column(i) => row.get(i).copied().unwrap_or(f64::NAN),
                    Source::Previous(k) => bound.previous[k],
                    Source::Missing => f64::NAN,
                });
            }

            self.outputs.clear();
            if bound.calc.missing == MissingInputs::Propagate
                && self.inputs.iter().any(|v| !v.is_finite())
            {
                self.outputs.resize(bound.calc.outputs.len(), f64::NAN);
            } else {
                (bound.calc.compute)(&self.inputs, &mut self.outputs);
                self.outputs.resize(bound.calc.outputs.len(), f64::NAN);
            }

            for (k, value) in self.outputs.iter().enumerate() {
                bound.previous[k] = *value;
                row.push(*value);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlightPhase {
    Ground,
    Climb,
    Cruise,
    Descent,
}

impl FlightPhase {
    pub fn label(&self) -> &'static str {
        match self {
            FlightPhase::Ground => "Ground",
            FlightPhase::Climb => "Climb",
            FlightPhase::Cruise => "Cruise",
            FlightPhase::Descent => "Descent",
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSample {
    pub ias: f64,
    pub altitude: f64,
}

/// Classify the latest window of airspeed/altitude observations.
pub fn classify_phase(
    window: &[PhaseSample],
    previous: Option<FlightPhase>,
    config: &AnalysisConfig,
) -> FlightPhase {
    let fallback = previous.unwrap_or(FlightPhase::Ground);
    if window.len() < config.phase_min_observations {
        return fallback;
    }
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return fallback;
    };

    if last.ias > config.phase_ias_threshold {
        if last.altitude > first.altitude + config.phase_altitude_delta {
            FlightPhase::Climb
        } else if last.altitude < first.altitude - config.phase_altitude_delta {
            FlightPhase::Descent
        } else {
            FlightPhase::Cruise
        }
    } else {
        FlightPhase::Ground
    }
}

/// Row calculations plus the phase classifier, built once per configuration.
#[derive(Debug, Clone)]
pub struct DerivedFieldEngine {
    calculations: Vec<RowCalculation>,
    config: AnalysisConfig,
}

impl DerivedFieldEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_calculations(RowCalculation::builtin(), config)
    }

    pub fn with_calculations(calculations: Vec<RowCalculation>, config: &AnalysisConfig) -> Self {
        Self {
            calculations,
            config: config.clone(),
        }
    }

    pub fn calculations(&self) -> &[RowCalculation] {
        &self.calculations
    }

    pub fn bind(&self, numeric_fields: &[Field]) -> RowEvaluator<'_> {
        RowEvaluator::new(&self.calculations, numeric_fields)
    }

    /// Label every row with a flight phase.
    ///
    /// Rows with a missing input keep the previous label and are not added to
    /// the window. When the label changes, the rows the window already covers
    /// take the new label and the window restarts at the current row.
    pub fn label_phases(&self, ias: &[f64], altitude: &[f64]) -> Vec<FlightPhase> {
        let n = ias.len().min(altitude.len());
        let capacity = self.config.phase_window.max(1);
        let mut labels: Vec<FlightPhase> = Vec::with_capacity(n);
        let mut window: VecDeque<(usize, PhaseSample)> = VecDeque::with_capacity(capacity + 1);
        let mut previous: Option<FlightPhase> = None;

        for row in 0..n {
            let sample = PhaseSample {
                ias: ias[row],
                altitude: altitude[row],
            };
            if !sample.ias.is_finite() || !sample.altitude.is_finite() {
                labels.push(previous.unwrap_or(FlightPhase::Ground));
                continue;
            }

            window.push_back((row, sample));
            if window.len() > capacity {
                window.pop_front();
            }
            let samples: Vec<PhaseSample> = window.iter().map(|(_, s)| *s).collect();
            let phase = classify_phase(&samples, previous, &self.config);

            if previous.is_some_and(|p| p != phase) {
                if let Some((first_row, _)) = window.front() {
                    for label in &mut labels[*first_row..row] {
                        *label = phase;
                    }
                }
                window.clear();
                window.push_back((row, sample));
            }
            labels.push(phase);
            previous = Some(phase);
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn window(ias: f64, alt_start: f64, alt_end: f64, len: usize) -> Vec<PhaseSample> {
        (0..len)
            .map(|i| PhaseSample {
                ias,
                altitude: alt_start + (alt_end - alt_start) * i as f64 / (len - 1) as f64,
            })
            .collect()
    }

    #[test]
    fn test_wind_headwind_and_crosswind() {
        let head = wind_components(90.0, 20.0, 90.0);
        assert_abs_diff_eq!(head.direct, -20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(head.cross, 0.0, epsilon = 1e-9);

        let cross = wind_components(180.0, 20.0, 90.0);
        assert_abs_diff_eq!(cross.cross, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cross.direct, 0.0, epsilon = 1e-9);

        let tail = wind_components(270.0, 20.0, 90.0);
        assert_abs_diff_eq!(tail.direct, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wind_wraps_direction() {
        let a = wind_components(-10.0, 10.0, 350.0);
        assert_abs_diff_eq!(a.direct, -10.0, epsilon = 1e-9);
        let b = wind_components(10.0, 10.0, 350.0);
        assert_abs_diff_eq!(b.cross, 10.0 * (PI * 20.0 / 180.0).sin(), epsilon = 1e-9);
    }

    #[test]
    fn test_classify_phase() {
        let config = AnalysisConfig::default();
        assert_eq!(
            classify_phase(&window(60.0, 1000.0, 1200.0, 20), None, &config),
            FlightPhase::Climb
        );
        assert_eq!(
            classify_phase(&window(60.0, 1200.0, 1000.0, 20), None, &config),
            FlightPhase::Descent
        );
        assert_eq!(
            classify_phase(&window(60.0, 1000.0, 1000.0, 20), None, &config),
            FlightPhase::Cruise
        );
        assert_eq!(
            classify_phase(&window(30.0, 1000.0, 1200.0, 20), None, &config),
            FlightPhase::Ground
        );
        assert_eq!(
            classify_phase(&window(35.0, 1200.0, 1000.0, 20), Some(FlightPhase::Cruise), &config),
            FlightPhase::Ground
        );
    }

    #[test]
    fn test_classify_phase_needs_observations() {
        let config = AnalysisConfig::default();
        let short = window(60.0, 1000.0, 1200.0, 10);
        assert_eq!(classify_phase(&short, None, &config), FlightPhase::Ground);
        assert_eq!(
            classify_phase(&short, Some(FlightPhase::Cruise), &config),
            FlightPhase::Cruise
        );
        assert_eq!(classify_phase(&[], None, &config), FlightPhase::Ground);
    }

    #[test]
    fn test_label_phases_backfills_on_change() {
        let engine = DerivedFieldEngine::new(&AnalysisConfig::default());
        let mut ias = vec![0.0; 30];
        let mut alt = vec![100.0; 30];
        for i in 30..60 {
            ias.push(80.0);
            alt.push(100.0 + (i - 30) as f64 * 20.0);
        }
        let labels = engine.label_phases(&ias, &alt);
        assert_eq!(labels.len(), 60);
        assert_eq!(labels[0], FlightPhase::Ground);
        assert_eq!(labels[59], FlightPhase::Climb);

        // airborne but level when the window first sees airspeed: cruise is
        // backfilled over the ground rows the window covered
        assert_eq!(labels[10], FlightPhase::Ground);
        assert!(labels[11..30].iter().all(|p| *p == FlightPhase::Cruise));
        // the climb is detected once 15 samples accumulate, and backfilled
        assert!(labels[30..].iter().all(|p| *p == FlightPhase::Climb));
    }

    #[test]
    fn test_label_phases_skips_missing_samples() {
        let engine = DerivedFieldEngine::new(&AnalysisConfig::default());
        let ias = vec![0.0, f64::NAN, 0.0];
        let alt = vec![100.0, 100.0, f64::NAN];
        let labels = engine.label_phases(&ias, &alt);
        assert_eq!(labels, vec![FlightPhase::Ground; 3]);
    }

    #[test]
    fn test_row_evaluator_outputs() {
        let engine = DerivedFieldEngine::new(&AnalysisConfig::default());
        let fields = vec![Field::FQtyL, Field::FQtyR, Field::E1FFlow];
        let mut evaluator = engine.bind(&fields);
        assert_eq!(
            evaluator.output_fields(),
            &[Field::Distance, Field::FQtyT, Field::FTotalizerT]
        );

        let mut row = vec![20.0, 21.0, 3600.0];
        evaluator.evaluate(&mut row, Coordinate::new(50.0, 0.0));
        assert_eq!(row, vec![20.0, 21.0, 3600.0, 0.0, 41.0, 1.0]);

        let mut row = vec![19.0, f64::NAN, f64::NAN];
        evaluator.evaluate(&mut row, Coordinate::new(51.0, 0.0));
        assert!(row[4].is_nan());
        assert!(row[5].is_nan());
        assert_abs_diff_eq!(row[3], 60.0, epsilon = 0.5);

        // a missing flow sample leaves the running total undefined
        let mut row = vec![19.0, 20.0, 3600.0];
        evaluator.evaluate(&mut row, Coordinate::INVALID);
        assert_eq!(row[4], 39.0);
        assert!(row[5].is_nan());
        assert_abs_diff_eq!(row[3], 60.0, epsilon = 0.5);
    }

    #[test]
    fn test_row_evaluator_extremes() {
        let engine = DerivedFieldEngine::new(&AnalysisConfig::default());
        let fields = vec![Field::E1Egt1, Field::E1Egt2, Field::E1Egt3, Field::E1Egt4];
        let mut evaluator = engine.bind(&fields);
        assert_eq!(
            evaluator.output_fields(),
            &[Field::Distance, Field::E1EgtMax, Field::E1EgtMin, Field::E1EgtMaxIdx]
        );
        let mut row = vec![1300.0, 1350.0, f64::NAN, 1320.0];
        evaluator.evaluate(&mut row, Coordinate::INVALID);
        assert_eq!(&row[5..], &[1350.0, 1300.0, 1.0]);

        let mut row = vec![1300.0, 1300.0, 1290.0, f64::NAN];
        evaluator.evaluate(&mut row, Coordinate::INVALID);
        assert_eq!(&row[5..], &[1300.0, 1290.0, 0.0]);
    }

    #[test]
    fn test_row_evaluator_skips_present_outputs() {
        let engine = DerivedFieldEngine::new(&AnalysisConfig::default());
        let fields = vec![Field::FQtyL, Field::FQtyR, Field::FQtyT, Field::Distance];
        let evaluator = engine.bind(&fields);
        assert!(evaluator.output_fields().is_empty());
    }
}
