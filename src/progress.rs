/// Progress event emitted by long-running operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressState {
    Start,
    /// Fraction of work done, in `0.0..=1.0`.
    Progressing(f64),
    Complete,
    Error(String),
}

/// Receives progress events and can request cancellation.
///
/// Implementations must be cheap: `update` is called from the parsing loop.
pub trait ProgressReport {
    fn update(&self, state: ProgressState);

    fn is_cancelled(&self) -> bool {
        false
    }
}
