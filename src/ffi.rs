//! Entry points exported to the host application.
//!
//! The host passes file contents and JSON configuration as strings and gets
//! back plain records; no handle crosses the boundary.

use crate::config::AnalysisConfig;
use crate::error::FlightLogError;
use crate::field::FieldCatalog;
use crate::flight_data::FlightData;
use crate::parser::LogParser;
use crate::summary::{FlightSummary, FlightSummaryRecord, SummaryType};

fn summarize(contents: &str, config: &AnalysisConfig) -> Result<FlightSummaryRecord, FlightLogError> {
    let catalog = FieldCatalog::builtin();
    let parsed = LogParser::new(&catalog, config).parse_str(contents, None)?;
    let data = FlightData::from_table(parsed.table)?;
    Ok(FlightSummary::from_data(&data, config, None).to_record())
}

/// Summarise a log with the default thresholds.
#[uniffi::export]
pub fn summarize_log(contents: String) -> Result<FlightSummaryRecord, FlightLogError> {
    summarize(&contents, &AnalysisConfig::default())
}

#[uniffi::export]
pub fn summarize_log_with_config(
    contents: String,
    config_json: String,
) -> Result<FlightSummaryRecord, FlightLogError> {
    let config = AnalysisConfig::from_json(&config_json)?;
    summarize(&contents, &config)
}

/// Classification of a persisted summary, recomputed from its windows.
#[uniffi::export]
pub fn classify_summary_record(record: FlightSummaryRecord) -> SummaryType {
    FlightSummary::from_record(&record, None).summary_type
}

#[uniffi::export]
pub fn init_logging(filter: String) {
    crate::logging::init_logging(&filter);
}
