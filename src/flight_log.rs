//! One log file end to end: parse, summarise, segment.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::airports::AirportLocator;
use crate::config::AnalysisConfig;
use crate::error::{FlightLogError, StoreError};
use crate::export::{AggregatedData, Schema};
use crate::field::{Field, FieldCatalog};
use crate::flight_data::FlightData;
use crate::leg::{FlightLeg, Segmentation};
use crate::parser::{LogParser, ParseReport, ParsedLog};
use crate::progress::ProgressReport;
use crate::summary::FlightSummary;

/// Shared, read-only inputs of an analysis. Cheap to copy into rayon workers.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub catalog: &'a FieldCatalog,
    pub config: &'a AnalysisConfig,
    pub locator: Option<&'a (dyn AirportLocator + Sync)>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(catalog: &'a FieldCatalog, config: &'a AnalysisConfig) -> Self {
        Self {
            catalog,
            config,
            locator: None,
        }
    }

    pub fn with_locator(mut self, locator: &'a (dyn AirportLocator + Sync)) -> Self {
        self.locator = Some(locator);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FlightLog {
    name: String,
    data: FlightData,
    report: ParseReport,
    summary: FlightSummary,
    route: Vec<FlightLeg>,
    phases: Vec<FlightLeg>,
}

impl FlightLog {
    pub fn parse_reader<R: BufRead>(
        name: &str,
        reader: R,
        size_hint: Option<u64>,
        ctx: AnalysisContext<'_>,
        progress: Option<&dyn ProgressReport>,
    ) -> Result<Self, FlightLogError> {
        let parsed = LogParser::new(ctx.catalog, ctx.config).parse_reader(reader, size_hint, progress)?;
        Self::from_parsed(name, parsed, ctx)
    }

    pub fn parse_str(
        name: &str,
        contents: &str,
        ctx: AnalysisContext<'_>,
        progress: Option<&dyn ProgressReport>,
    ) -> Result<Self, FlightLogError> {
        let parsed = LogParser::new(ctx.catalog, ctx.config).parse_str(contents, progress)?;
        Self::from_parsed(name, parsed, ctx)
    }

    pub fn parse_file(
        path: &Path,
        ctx: AnalysisContext<'_>,
        progress: Option<&dyn ProgressReport>,
    ) -> Result<Self, FlightLogError> {
        let file = File::open(path)?;
        let size = file.metadata().ok().map(|m| m.len());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(path = %path.display(), "parsing log");
        Self::parse_reader(&name, BufReader::new(file), size, ctx, progress)
    }

    /// Parse several files on the rayon pool. Results come back in the order
    /// of `paths`.
    pub fn parse_all(paths: &[PathBuf], ctx: AnalysisContext<'_>) -> Vec<Result<Self, FlightLogError>> {
        tracing::debug!(files = paths.len(), "parsing logs");
        paths
            .par_iter()
            .map(|path| Self::parse_file(path, ctx, None))
            .collect()
    }

    fn from_parsed(name: &str, parsed: ParsedLog, ctx: AnalysisContext<'_>) -> Result<Self, FlightLogError> {
        let ParsedLog { table, report } = parsed;
        let data = FlightData::from_table(table)?;
        let locator = ctx.locator.map(|l| l as &dyn AirportLocator);
        let summary = FlightSummary::from_data(&data, ctx.config, locator);

        let route_start = summary.flying.map(|flying| flying.start);
        let route = FlightLeg::legs(&data, Segmentation::Waypoint, route_start);
        let phases = FlightLeg::legs(&data, Segmentation::Phase, None);

        tracing::info!(
            log = name,
            rows = report.rows_accepted,
            skipped = report.rows_skipped(),
            legs = route.len(),
            "analysed log"
        );
        Ok(Self {
            name: name.to_string(),
            data,
            report,
            summary,
            route,
            phases,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &FlightData {
        &self.data
    }

    pub fn report(&self) -> &ParseReport {
        &self.report
    }

    pub fn summary(&self) -> &FlightSummary {
        &self.summary
    }

    /// Waypoint legs from the start of the flying window.
    pub fn route(&self) -> &[FlightLeg] {
        &self.route
    }

    pub fn phases(&self) -> &[FlightLeg] {
        &self.phases
    }

    pub fn interval_legs(&self, interval_secs: i64) -> Vec<FlightLeg> {
        FlightLeg::legs(&self.data, Segmentation::Interval(interval_secs), None)
    }

    /// Export rows tagged with this log's name.
    pub fn aggregated(&self, schema: &Schema, segmentation: Segmentation) -> Result<AggregatedData, StoreError> {
        let legs = match segmentation {
            Segmentation::Waypoint => self.route.clone(),
            Segmentation::Phase => self.phases.clone(),
            Segmentation::Interval(_) => FlightLeg::legs(&self.data, segmentation, None),
        };
        let constants = BTreeMap::from([(Field::LogFileName, self.name.clone())]);
        AggregatedData::from_legs(&legs, schema, &constants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airports::test_support::airport;
    use crate::airports::KnownAirports;
    use crate::field::MetaField;
    use crate::parser::test_support::create_test_log;
    use crate::progress::test_support::RecordingProgress;
    use crate::stats::Metric;
    use crate::summary::SummaryType;
    use std::io::Write;

    fn write_temp_log(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("flightlog_{}_{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_str() {
        let catalog = FieldCatalog::builtin();
        let config = AnalysisConfig::default();
        let airports = KnownAirports::new(vec![
            airport("KSFO", 37.6188, -122.3756),
            airport("KOAK", 37.7210, -122.3740),
        ]);
        let ctx = AnalysisContext::new(&catalog, &config).with_locator(&airports);

        let log = FlightLog::parse_str("log_1.csv", &create_test_log(), ctx, None).unwrap();
        assert_eq!(log.name(), "log_1.csv");
        assert_eq!(log.report().rows_accepted, 130);
        assert_eq!(log.summary().summary_type, SummaryType::Flight);
        assert_eq!(log.summary().route_summary(), "KSFO-KOAK");

        let flying = log.summary().flying.unwrap();
        assert_eq!(log.route().first().unwrap().time_range().start, flying.start);
        assert_eq!(log.route().len(), 2);
        assert!(!log.phases().is_empty());
        assert_eq!(log.interval_legs(60).len(), 3);
    }

    #[test]
    fn test_aggregated() {
        let catalog = FieldCatalog::builtin();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&catalog, &config);
        let log = FlightLog::parse_str("log_1.csv", &create_test_log(), ctx, None).unwrap();

        let schema = Schema::default().with_values(Field::Ias, &[Metric::Max]);
        let data = log.aggregated(&schema, Segmentation::Waypoint).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.log_file_names(), vec!["log_1.csv"]);
    }

    #[test]
    fn test_empty_log() {
        let catalog = FieldCatalog::builtin();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&catalog, &config);
        let log = FlightLog::parse_str("empty.csv", "", ctx, None).unwrap();
        assert_eq!(log.summary().summary_type, SummaryType::Empty);
        assert!(log.route().is_empty());
        assert!(log.phases().is_empty());
        assert_eq!(log.summary().distance_nm, 0.0);
    }

    #[test]
    fn test_header_only_log() {
        let catalog = FieldCatalog::builtin();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&catalog, &config);
        let headers: String = create_test_log().lines().take(3).map(|l| format!("{l}\n")).collect();

        let log = FlightLog::parse_str("headers.csv", &headers, ctx, None).unwrap();
        assert_eq!(log.report().rows_accepted, 0);
        assert!(log.data().is_empty());
        assert_eq!(log.data().meta(MetaField::AirframeName), Some("Cirrus SR22T"));
        assert_eq!(log.summary().summary_type, SummaryType::Empty);
        assert!(log.summary().hobbs.is_none());
        assert_eq!(log.summary().distance_nm, 0.0);
        assert!(log.route().is_empty());
        assert!(log.phases().is_empty());
        assert!(log.interval_legs(60).is_empty());
    }

    #[test]
    fn test_cancelled_parse() {
        let catalog = FieldCatalog::builtin();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&catalog, &config);
        let progress = RecordingProgress::cancelling_after(1);
        let result = FlightLog::parse_str("log_1.csv", &create_test_log(), ctx, Some(&progress));
        assert!(matches!(result, Err(FlightLogError::Cancelled)));
    }

    #[test]
    fn test_parse_all_keeps_order() {
        let catalog = FieldCatalog::builtin();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&catalog, &config);

        let log = create_test_log();
        let truncated: String = log.lines().take(40).map(|l| format!("{l}\n")).collect();
        let paths = vec![
            write_temp_log("a.csv", &log),
            std::env::temp_dir().join("flightlog_missing_file.csv"),
            write_temp_log("b.csv", &truncated),
        ];

        let results = FlightLog::parse_all(&paths, ctx);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().report().rows_accepted, 130);
        assert!(matches!(results[1], Err(FlightLogError::Io(_))));
        let second = results[2].as_ref().unwrap();
        assert_eq!(second.report().rows_accepted, 37);
        assert!(second.name().ends_with("b.csv"));

        for path in [&paths[0], &paths[2]] {
            let _ = std::fs::remove_file(path);
        }
        assert!(FlightLog::parse_all(&[], ctx).is_empty());
    }
}
