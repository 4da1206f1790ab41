pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::TriageError;
pub use models::*;

/// Current unix time in fractional seconds.
///
/// Window scores, incident timestamps, and circuit breaker bookkeeping all
/// use this representation so values written by different workers compare
/// directly inside the shared store.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
