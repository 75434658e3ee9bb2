use thiserror::Error;

/// Structural errors raised while building a columnar time series.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("inconsistent date order: {date} is before last date {last}")]
    InconsistentDateOrder { date: String, last: String },

    #[error("inconsistent data size for {field}: has {got} values, expected {expected}")]
    InconsistentDataSize {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Error type for log parsing and flight analysis.
#[derive(Error, Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum FlightLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("parsing cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
