use chrono::{DateTime, Utc};
use pairs_core::{PairsError, RegressionSnapshot};
use tracing::debug;

use crate::window::{BoundedWindow, WindowAggregate};

/// Running sums over the (base, dependent) return pairs in the window.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PairSums {
    pub sx: f64,
    pub sy: f64,
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

impl WindowAggregate<(f64, f64)> for PairSums {
    fn combine(&mut self, &(x, y): &(f64, f64)) {
        self.sx += x;
        self.sy += y;
        self.sxx += x * x;
        self.syy += y * y;
        self.sxy += x * y;
    }

    fn uncombine(&mut self, &(x, y): &(f64, f64)) {
        self.sx -= x;
        self.sy -= y;
        self.sxx -= x * x;
        self.syy -= y * y;
        self.sxy -= x * y;
    }

    fn clear(&mut self) {
        *self = PairSums::default();
    }
}

/// Online rolling-window OLS estimate of alpha and beta for
/// `dependent = alpha + beta * base`, with EWMA smoothing of beta:
/// `beta_sm_t = lambda * beta_sm_{t-1} + (1 - lambda) * beta_instant_t`.
///
/// The window statistics are maintained through five running sums updated on
/// insert and eviction; nothing is ever recomputed from the full window.
/// When the base-instrument variance drops below `variance_epsilon` the
/// betas are frozen at their previous values and R^2 is forced to zero
/// rather than dividing by a near-singular denominator.
///
/// Warmup only gates exposure: estimates accumulate from the first
/// observation, but every snapshot reports them as `None` while
/// `n < warmup`.
pub struct RollingBetaEwma {
    ewma_lambda: f64,
    warmup: usize,
    variance_epsilon: f64,
    window: BoundedWindow<(f64, f64), PairSums>,
    beta_instant: Option<f64>,
    beta_smoothed: Option<f64>,
    alpha: Option<f64>,
    r_squared: Option<f64>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl RollingBetaEwma {
    pub fn new(
        window_size: usize,
        ewma_lambda: f64,
        warmup: usize,
        variance_epsilon: f64,
    ) -> Result<Self, PairsError> {
        if window_size <= 1 {
            return Err(PairsError::InvalidConfig("window_size must be > 1".into()));
        }
        if !(ewma_lambda > 0.0 && ewma_lambda < 1.0) {
            return Err(PairsError::InvalidConfig(
                "ewma_lambda must be in (0, 1)".into(),
            ));
        }
        if warmup < 1 {
            return Err(PairsError::InvalidConfig("warmup must be >= 1".into()));
        }
        if variance_epsilon <= 0.0 {
            return Err(PairsError::InvalidConfig(
                "variance_epsilon must be > 0".into(),
            ));
        }

        Ok(Self {
            ewma_lambda,
            warmup,
            variance_epsilon,
            window: BoundedWindow::new(window_size, PairSums::default()),
            beta_instant: None,
            beta_smoothed: None,
            alpha: None,
            r_squared: None,
            last_timestamp: None,
        })
    }

    /// Feed one (base, dependent) return pair and return the updated
    /// snapshot. Never fails for finite inputs; non-finite inputs must be
    /// filtered by the caller.
    pub fn update(
        &mut self,
        base_return: f64,
        dependent_return: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> RegressionSnapshot {
        // Eviction subtracts the outgoing pair from the five sums before the
        // new pair is added (see BoundedWindow::push).
        self.window.push((base_return, dependent_return));
        self.last_timestamp = timestamp;

        let n = self.window.len();
        if n < 2 {
            return self.snapshot(n, 0.0, 0.0, 0.0);
        }

        let s = *self.window.aggregate();
        let nf = n as f64;
        let mean_x = s.sx / nf;
        let mean_y = s.sy / nf;

        // Raw sums of squares around the mean; deliberately not divided by n
        // or (n - 1); the scale cancels out of beta and R^2.
        let var_x = s.sxx - nf * mean_x * mean_x;
        let var_y = s.syy - nf * mean_y * mean_y;
        let cov = s.sxy - nf * mean_x * mean_y;

        if var_x < self.variance_epsilon {
            // Freeze: keep the previous betas rather than dividing by a
            // near-zero variance. Alpha is refreshed only if a smoothed beta
            // already exists.
            debug!(n, var_x, "base variance degenerate, beta frozen");
            self.r_squared = Some(0.0);
            self.alpha = self.beta_smoothed.map(|b| mean_y - b * mean_x);
            return self.snapshot(n, var_x, var_y, cov);
        }

        let beta_instant = cov / var_x;
        self.beta_instant = Some(beta_instant);

        self.r_squared = Some(if var_y > self.variance_epsilon {
            (cov * cov) / (var_x * var_y)
        } else {
            0.0
        });

        self.beta_smoothed = Some(match self.beta_smoothed {
            Some(prev) => self.ewma_lambda * prev + (1.0 - self.ewma_lambda) * beta_instant,
            None => beta_instant,
        });

        // Intercept always comes from the smoothed beta; the instantaneous
        // estimator is too noisy for it.
        self.alpha = self.beta_smoothed.map(|b| mean_y - b * mean_x);

        self.snapshot(n, var_x, var_y, cov)
    }

    /// Clear the window, running sums and all held estimates. Configuration
    /// is unchanged.
    pub fn reset(&mut self) {
        self.window.clear();
        self.beta_instant = None;
        self.beta_smoothed = None;
        self.alpha = None;
        self.r_squared = None;
        self.last_timestamp = None;
    }

    pub fn n(&self) -> usize {
        self.window.len()
    }

    pub fn alpha(&self) -> Option<f64> {
        self.expose(self.alpha)
    }

    pub fn beta_instant(&self) -> Option<f64> {
        self.expose(self.beta_instant)
    }

    pub fn beta_smoothed(&self) -> Option<f64> {
        self.expose(self.beta_smoothed)
    }

    pub fn r_squared(&self) -> Option<f64> {
        self.expose(self.r_squared)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    fn expose(&self, value: Option<f64>) -> Option<f64> {
        if self.window.len() >= self.warmup {
            value
        } else {
            None
        }
    }

    fn snapshot(&self, n: usize, var_base: f64, var_dep: f64, cov: f64) -> RegressionSnapshot {
        let visible = n >= self.warmup;
        RegressionSnapshot {
            n,
            alpha: if visible { self.alpha } else { None },
            beta_instant: if visible { self.beta_instant } else { None },
            beta_smoothed: if visible { self.beta_smoothed } else { None },
            r_squared: if visible { self.r_squared } else { None },
            var_base,
            var_dep,
            cov,
            last_timestamp: self.last_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_configuration() {
        assert!(RollingBetaEwma::new(1, 0.94, 10, 1e-12).is_err());
        assert!(RollingBetaEwma::new(100, 0.0, 10, 1e-12).is_err());
        assert!(RollingBetaEwma::new(100, 1.0, 10, 1e-12).is_err());
        assert!(RollingBetaEwma::new(100, 0.94, 0, 1e-12).is_err());
        assert!(RollingBetaEwma::new(100, 0.94, 10, 0.0).is_err());
        assert!(RollingBetaEwma::new(100, 0.94, 10, 1e-12).is_ok());
    }

    #[test]
    fn single_observation_has_no_estimates() {
        let mut est = RollingBetaEwma::new(10, 0.9, 1, 1e-12).unwrap();
        let state = est.update(0.01, 0.02, None);
        assert_eq!(state.n, 1);
        assert!(state.beta_instant.is_none());
        assert!(state.alpha.is_none());
        assert_eq!(state.var_base, 0.0);
        assert_eq!(state.cov, 0.0);
    }

    #[test]
    fn reset_clears_window_and_estimates() {
        let mut est = RollingBetaEwma::new(10, 0.9, 2, 1e-12).unwrap();
        est.update(0.01, 0.02, None);
        est.update(-0.02, -0.03, None);
        assert!(est.beta_instant().is_some());

        est.reset();
        assert_eq!(est.n(), 0);
        assert!(est.beta_instant().is_none());
        assert!(est.last_timestamp().is_none());

        let state = est.update(0.01, 0.02, None);
        assert_eq!(state.n, 1);
    }
}
