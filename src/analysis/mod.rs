//! Pure computation over sensor records: time windows, period grouping and statistics.
//!
//! Nothing here touches the database except to build query conditions, so all
//! of it is exercised directly by the integration tests.

pub mod grouping;
pub mod stats;
pub mod window;

/// A request parameter that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {param}: {reason}")]
pub struct ParamError {
    pub param: &'static str,
    pub reason: String,
}

impl ParamError {
    #[must_use]
    pub fn new(param: &'static str, reason: impl Into<String>) -> Self {
        Self {
            param,
            reason: reason.into(),
        }
    }
}

/// Rounds half away from zero to `places` decimals.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}
