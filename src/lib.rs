//! Flight data recorder log analysis. The modules below are plain Rust; `ffi`
//! holds the functions exported through uniffi, and the records they return
//! derive their uniffi traits where they are defined.

pub mod airports;
pub mod config;
pub mod derived;
pub mod error;
pub mod export;
pub mod ffi;
pub mod field;
pub mod flight_data;
pub mod flight_log;
pub mod leg;
pub mod logging;
pub mod models;
pub mod parser;
pub mod progress;
pub mod series;
pub mod stats;
pub mod summary;
pub mod time_range;
pub mod trip;
pub mod window;

uniffi::setup_scaffolding!();

pub use airports::{AirportLocator, KnownAirports};
pub use config::AnalysisConfig;
pub use error::{FlightLogError, StoreError};
pub use export::{AggregatedData, Schema};
pub use field::{Field, FieldCatalog, MetaField};
pub use flight_data::FlightData;
pub use flight_log::{AnalysisContext, FlightLog};
pub use leg::{FlightLeg, Segmentation};
pub use models::{Airport, Coordinate, FuelQuantity, Waypoint};
pub use parser::{LogParser, ParseOptions, ParseReport};
pub use progress::{ProgressReport, ProgressState};
pub use series::{Date, TimeSeries};
pub use stats::{CategoricalStats, Metric, ValueStats};
pub use summary::{FlightSummary, FlightSummaryRecord, SummaryField, SummaryType};
pub use time_range::TimeRange;
pub use trip::{Aggregation, Trip, Trips};
pub use window::FlightWindows;
