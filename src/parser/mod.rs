//! Recorder log parser.
//!
//! A log is a CSV-like text file with three kinds of header lines followed by
//! data rows:
//!
//! ```text
//! #airframe_info, log_version="1.00", airframe_name="Cirrus SR22T", ...
//! #yyy-mm-dd, hh:mm:ss,   hh:mm, ident, degrees, degrees, ft Baro, ...
//!   Lcl Date, Lcl Time, UTCOfst, AtvWpt,Latitude,Longitude,  AltInd, ...
//! 2022-05-07, 10:00:00,  -05:00,   KSFO, 37.61, -122.38,  10.0, ...
//! ```
//!
//! The parser reads line by line, keeps rows whose token count matches the
//! unit header, folds the three timestamp columns into one UTC date, and runs
//! the derived field engine on each accepted row. Data-quality problems never
//! fail the parse: they are counted in a [`ParseReport`].

pub mod line;

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::derived::DerivedFieldEngine;
use crate::error::FlightLogError;
use crate::field::{Field, FieldCatalog, MetaField, ValueType};
use crate::models::Coordinate;
use crate::progress::{ProgressReport, ProgressState};
use crate::series::Date;

use line::{meta_token, split_line};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%d/%m/%Y %H:%M:%S %z"];
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Lines between progress events and cancellation checks.
const PROGRESS_INTERVAL: usize = 1000;
/// Bad dates logged individually before going quiet.
const MAX_LOGGED_DATE_FAILURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    /// Date/time columns, folded into the row timestamp.
    Ignored,
}

impl ColumnKind {
    fn from_unit(unit: &str) -> Self {
        if unit.starts_with("yyy-") || unit.starts_with("hh:") {
            ColumnKind::Ignored
        } else if unit == "ident" || unit == "enum" {
            ColumnKind::Categorical
        } else {
            ColumnKind::Numeric
        }
    }

    fn from_value_type(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Value => ColumnKind::Numeric,
            ValueType::Categorical => ColumnKind::Categorical,
            ValueType::Timestamp => ColumnKind::Ignored,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub field: Field,
    /// Header text as written in the file.
    pub name: String,
    pub unit: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Stop after this many lines (headers included).
    pub max_line_count: Option<usize>,
    /// Keep one data row in N.
    pub line_sampling_frequency: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_line_count: None,
            line_sampling_frequency: 1,
        }
    }
}

impl ParseOptions {
    /// Only read enough lines to get the metadata and headers.
    pub fn headers_only() -> Self {
        Self {
            max_line_count: Some(3),
            ..Default::default()
        }
    }
}

/// Counts of what happened to each line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub lines_read: usize,
    pub rows_accepted: usize,
    pub rows_wrong_token_count: usize,
    pub rows_blank_date: usize,
    pub rows_bad_date: usize,
    pub rows_duplicate_date: usize,
    pub rows_out_of_order: usize,
    pub rows_sampled_out: usize,
    pub unknown_fields: Vec<String>,
}

impl ParseReport {
    /// Data rows dropped for a data-quality reason (sampling excluded).
    pub fn rows_skipped(&self) -> usize {
        self.rows_wrong_token_count
            + self.rows_blank_date
            + self.rows_bad_date
            + self.rows_duplicate_date
            + self.rows_out_of_order
    }
}

/// Row-oriented parse result. Every numeric row has one value per entry of
/// `numeric_fields`, every categorical row one per `categorical_fields`, and
/// there is one date and one coordinate per row.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub meta: BTreeMap<MetaField, String>,
    pub columns: Vec<Column>,
    pub numeric_fields: Vec<Field>,
    pub categorical_fields: Vec<Field>,
    pub units: HashMap<Field, String>,
    pub dates: Vec<Date>,
    pub numeric_rows: Vec<Vec<f64>>,
    pub categorical_rows: Vec<Vec<String>>,
    pub coordinates: Vec<Coordinate>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Copy one numeric column out of the rows.
    pub fn numeric_column(&self, field: Field) -> Option<Vec<f64>> {
        let idx = self.numeric_fields.iter().position(|f| *f == field)?;
        Some(self.numeric_rows.iter().map(|row| row[idx]).collect())
    }

    pub fn categorical_column(&self, field: Field) -> Option<Vec<String>> {
        let idx = self.categorical_fields.iter().position(|f| *f == field)?;
        Some(self.categorical_rows.iter().map(|row| row[idx].clone()).collect())
    }
}

#[derive(Debug)]
pub struct ParsedLog {
    pub table: SampleTable,
    pub report: ParseReport,
}

/// Parse the three timestamp cells of a row into a UTC date.
pub fn parse_date(date: &str, time: &str, offset: &str) -> Option<Date> {
    let date = date.trim();
    let time = time.trim();
    let offset = offset.trim().replace(':', "");

    if offset.is_empty() {
        let text = format!("{date} {time}");
        return NAIVE_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
            .map(|naive| naive.and_utc());
    }
    let text = format!("{date} {time} {offset}");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&text, fmt).ok())
        .map(|d| d.with_timezone(&Utc))
}

pub struct LogParser<'a> {
    catalog: &'a FieldCatalog,
    engine: DerivedFieldEngine,
    options: ParseOptions,
}

impl<'a> LogParser<'a> {
    pub fn new(catalog: &'a FieldCatalog, config: &AnalysisConfig) -> Self {
        Self {
            catalog,
            engine: DerivedFieldEngine::new(config),
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse_str(
        &self,
        contents: &str,
        progress: Option<&dyn ProgressReport>,
    ) -> Result<ParsedLog, FlightLogError> {
        self.parse_reader(contents.as_bytes(), Some(contents.len() as u64), progress)
    }

    /// Parse from any buffered reader. `size_hint` (total bytes) enables
    /// fractional progress events.
    pub fn parse_reader<R: BufRead>(
        &self,
        mut reader: R,
        size_hint: Option<u64>,
        progress: Option<&dyn ProgressReport>,
    ) -> Result<ParsedLog, FlightLogError> {
        if let Some(p) = progress {
            p.update(ProgressState::Start);
        }

        let mut state = ParseState::new(self.catalog, &self.engine, self.options);
        let mut buf = Vec::new();
        let mut bytes_read: u64 = 0;

        loop {
            if state.report.lines_read % PROGRESS_INTERVAL == 0 {
                if let Some(p) = progress {
                    if p.is_cancelled() {
                        tracing::info!(lines = state.report.lines_read, "parsing cancelled");
                        return Err(FlightLogError::Cancelled);
                    }
                    if let Some(total) = size_hint.filter(|t| *t > 0) {
                        p.update(ProgressState::Progressing(
                            (bytes_read as f64 / total as f64).min(1.0),
                        ));
                    }
                }
            }
            if self
                .options
                .max_line_count
                .is_some_and(|max| state.report.lines_read >= max)
            {
                break;
            }

            buf.clear();
            let n = match reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(err) => {
                    if let Some(p) = progress {
                        p.update(ProgressState::Error(err.to_string()));
                    }
                    return Err(err.into());
                }
            };
            if n == 0 {
                break;
            }
            bytes_read += n as u64;

            let line = String::from_utf8_lossy(&buf);
            state.process(&line);
        }

        let parsed = state.finish();
        tracing::debug!(
            rows = parsed.report.rows_accepted,
            skipped = parsed.report.rows_skipped(),
            "parsed log"
        );
        if let Some(p) = progress {
            p.update(ProgressState::Complete);
        }
        Ok(parsed)
    }
}

struct ParseState<'a> {
    catalog: &'a FieldCatalog,
    engine: &'a DerivedFieldEngine,
    options: ParseOptions,
    evaluator: Option<crate::derived::RowEvaluator<'a>>,
    table: SampleTable,
    report: ParseReport,
    units: Vec<String>,
    kinds: Vec<ColumnKind>,
    date_columns: [usize; 3],
    latitude: Option<usize>,
    longitude: Option<usize>,
    data_rows_seen: usize,
}

impl<'a> ParseState<'a> {
    fn new(catalog: &'a FieldCatalog, engine: &'a DerivedFieldEngine, options: ParseOptions) -> Self {
        Self {
            catalog,
            engine,
            options,
            evaluator: None,
            table: SampleTable::default(),
            report: ParseReport::default(),
            units: Vec::new(),
            kinds: Vec::new(),
            date_columns: [0, 1, 2],
            latitude: None,
            longitude: None,
            data_rows_seen: 0,
        }
    }

    fn process(&mut self, line: &str) {
        self.report.lines_read += 1;
        if line.trim().is_empty() {
            return;
        }
        let tokens = split_line(line);
        let Some(first) = tokens.first() else {
            return;
        };

        if first.starts_with("#airframe") {
            self.process_meta(&tokens);
        } else if let Some(stripped) = first.strip_prefix('#') {
            let mut units = tokens.clone();
            units[0] = stripped.to_string();
            self.kinds = units.iter().map(|u| ColumnKind::from_unit(u)).collect();
            self.units = units;
        } else if self.table.columns.is_empty() {
            self.process_header(&tokens);
        } else {
            self.process_row(&tokens);
        }
    }

    fn process_meta(&mut self, tokens: &[String]) {
        for (key, value) in tokens.iter().filter_map(|t| meta_token(t)) {
            match MetaField::from_key(&key) {
                Some(meta) => {
                    self.table.meta.insert(meta, value);
                }
                None => tracing::warn!(key = %key, "unknown meta field"),
            }
        }
    }

    fn process_header(&mut self, tokens: &[String]) {
        let mut columns = Vec::with_capacity(tokens.len());
        for (idx, name) in tokens.iter().enumerate() {
            let field = Field::from_header(name);
            if field == Field::Unknown {
                tracing::warn!(field = %name, "unknown field");
                self.report.unknown_fields.push(name.clone());
            }
            let mut kind = match self.kinds.get(idx) {
                Some(kind) => *kind,
                None => ColumnKind::from_value_type(self.catalog.value_type(field)),
            };
            if field != Field::Unknown && self.catalog.value_type(field) == ValueType::Categorical {
                kind = ColumnKind::Categorical;
            }
            match field {
                Field::LclDate => self.date_columns[0] = idx,
                Field::LclTime => self.date_columns[1] = idx,
                Field::UtcOfst => self.date_columns[2] = idx,
                Field::Latitude => self.latitude = Some(idx),
                Field::Longitude => self.longitude = Some(idx),
                _ => {}
            }
            columns.push(Column {
                field,
                name: name.clone(),
                unit: self.units.get(idx).cloned().unwrap_or_default(),
                kind,
            });
        }

        for column in &columns {
            match column.kind {
                ColumnKind::Numeric => {
                    self.table.numeric_fields.push(column.field);
                    if column.field != Field::Unknown {
                        self.table.units.insert(column.field, column.unit.clone());
                    }
                }
                ColumnKind::Categorical => self.table.categorical_fields.push(column.field),
                ColumnKind::Ignored => {}
            }
        }

        let evaluator = self.engine.bind(&self.table.numeric_fields);
        for field in evaluator.output_fields() {
            self.table.numeric_fields.push(*field);
            self.table
                .units
                .insert(*field, self.catalog.unit(*field).to_string());
        }
        self.evaluator = Some(evaluator);
        self.table.columns = columns;
    }

    fn process_row(&mut self, tokens: &[String]) {
        if tokens.len() != self.table.columns.len() {
            self.report.rows_wrong_token_count += 1;
            return;
        }
        let sampling = self.options.line_sampling_frequency.max(1);
        let seen = self.data_rows_seen;
        self.data_rows_seen += 1;
        if seen % sampling != 0 {
            self.report.rows_sampled_out += 1;
            return;
        }

        let [d, t, o] = self.date_columns;
        let cell = |i: usize| tokens.get(i).map(String::as_str).unwrap_or("");
        if cell(d).trim().is_empty() && cell(t).trim().is_empty() && cell(o).trim().is_empty() {
            self.report.rows_blank_date += 1;
            return;
        }
        let Some(date) = parse_date(cell(d), cell(t), cell(o)) else {
            if self.report.rows_bad_date < MAX_LOGGED_DATE_FAILURES {
                tracing::warn!(
                    date = %format!("{} {} {}", cell(d), cell(t), cell(o)),
                    "failed to parse date, row skipped"
                );
            }
            self.report.rows_bad_date += 1;
            return;
        };
        if let Some(last) = self.table.dates.last() {
            if date == *last {
                self.report.rows_duplicate_date += 1;
                return;
            }
            if date < *last {
                self.report.rows_out_of_order += 1;
                return;
            }
        }

        let mut numeric = Vec::with_capacity(self.table.numeric_fields.len());
        let mut categorical = Vec::with_capacity(self.table.categorical_fields.len());
        let mut coordinate = Coordinate::INVALID;
        for (idx, (token, column)) in tokens.iter().zip(&self.table.columns).enumerate() {
            match column.kind {
                ColumnKind::Numeric => {
                    let value = token.trim().parse::<f64>().unwrap_or(f64::NAN);
                    if Some(idx) == self.latitude {
                        coordinate.latitude = value;
                    }
                    if Some(idx) == self.longitude {
                        coordinate.longitude = value;
                    }
                    numeric.push(value);
                }
                ColumnKind::Categorical => categorical.push(token.trim().to_string()),
                ColumnKind::Ignored => {}
            }
        }
        if let Some(evaluator) = self.evaluator.as_mut() {
            evaluator.evaluate(&mut numeric, coordinate);
        }

        self.table.dates.push(date);
        self.table.numeric_rows.push(numeric);
        self.table.categorical_rows.push(categorical);
        self.table.coordinates.push(coordinate);
        self.report.rows_accepted += 1;
    }

    fn finish(mut self) -> ParsedLog {
        let has_phase = self.table.categorical_fields.contains(&Field::FltPhase);
        if !has_phase && !self.table.is_empty() {
            if let (Some(ias), Some(alt)) = (
                self.table.numeric_column(Field::Ias),
                self.table.numeric_column(Field::AltMsl),
            ) {
                let phases = self.engine.label_phases(&ias, &alt);
                for (row, phase) in self.table.categorical_rows.iter_mut().zip(phases) {
                    row.push(phase.label().to_string());
                }
                self.table.categorical_fields.push(Field::FltPhase);
            }
        }
        ParsedLog {
            table: self.table,
            report: self.report,
        }
    }
}
