//! Streaming regression and residual-signal engine for a correlated
//! instrument pair.
//!
//! Three cooperating stateful processors, each updated once per bar close:
//! [`ReturnsTracker`] turns closing prices into log-returns,
//! [`RollingBetaEwma`] maintains a rolling-window OLS regression with an
//! EWMA-smoothed beta, and [`ResidualAccumulator`] keeps the windowed sum of
//! regression residuals. All three do O(1) amortized work per observation.

pub mod beta;
pub mod residuals;
pub mod returns;
pub mod window;


pub use beta::RollingBetaEwma;
pub use residuals::{residual, ResidualAccumulator};
pub use returns::{cumulative_return, log_return, winsorize, ReturnsTracker};
