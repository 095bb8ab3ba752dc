use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the rolling regression estimates for
/// `dependent = alpha + beta * base`.
///
/// The four estimate fields are `None` until the warmup count is reached.
/// `var_base`, `var_dep` and `cov` are raw sums of squares / cross-products
/// over the current window (no division by n or n-1) and are populated even
/// before warmup. Whenever `beta_smoothed` is present, `alpha` was derived
/// from it, never from `beta_instant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSnapshot {
    /// Observations currently in the rolling window.
    pub n: usize,
    /// Intercept estimate, computed from the smoothed beta.
    pub alpha: Option<f64>,
    /// Instantaneous (non-smoothed) window OLS beta.
    pub beta_instant: Option<f64>,
    /// EWMA-smoothed beta.
    pub beta_smoothed: Option<f64>,
    /// Coefficient of determination over the current window.
    pub r_squared: Option<f64>,
    pub var_base: f64,
    pub var_dep: f64,
    pub cov: f64,
    /// Timestamp supplied with the most recent observation.
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Per-step result of feeding one closing price into the returns tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnUpdate {
    /// Log-returns currently held in this symbol's window.
    pub count: usize,
    /// Log-return produced by this update, if any.
    pub last_log_return: Option<f64>,
    /// Compounded return over whatever is in the window, as a fraction
    /// (0.01 == +1%). Present once at least one return exists.
    pub cumulative_return_pct: Option<f64>,
}

/// Direction of an idiosyncratic move of the dependent instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Up,
    Down,
}

/// Divergence signal emitted when the dependent instrument moves on its own
/// beyond the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSignal {
    pub direction: SignalDirection,
    /// Compounded residual move at emission time, as a fraction.
    pub own_move_pct: f64,
    pub timestamp: Option<DateTime<Utc>>,
}
