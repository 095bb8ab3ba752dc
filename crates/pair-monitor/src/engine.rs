use anyhow::Result;
use chrono::{DateTime, Utc};
use pair_regression::{residual, ResidualAccumulator, ReturnsTracker, RollingBetaEwma};
use pairs_core::{PairSignal, RegressionSnapshot};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::signal::SignalGate;

/// Everything produced by one fully processed bar-close step.
#[derive(Debug, Clone, Serialize)]
pub struct EngineUpdate {
    pub timestamp: Option<DateTime<Utc>>,
    pub base_return: Option<f64>,
    pub dependent_return: Option<f64>,
    pub regression: Option<RegressionSnapshot>,
    /// Windowed residual sum over the configured horizon.
    pub residual_sum: Option<f64>,
    /// Compounded residual move, `exp(residual_sum) - 1`.
    pub own_move_pct: Option<f64>,
    pub signal: Option<PairSignal>,
}

/// Per-pair processing pipeline.
///
/// One engine instance owns the three stream processors for one
/// (base, dependent) pair and applies the mandatory per-observation order:
/// update returns for both legs, feed the latest return pair into the
/// regression, then, once alpha and the smoothed beta are exposed,
/// accumulate the residual and evaluate the signal gate. Calls must be
/// strictly sequential; nothing here suspends or blocks.
pub struct PairEngine {
    symbol_base: String,
    symbol_dep: String,
    tracker: ReturnsTracker,
    beta: RollingBetaEwma,
    residuals: ResidualAccumulator,
    gate: SignalGate,
}

impl PairEngine {
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            symbol_base: config.symbol_base.to_uppercase(),
            symbol_dep: config.symbol_dep.to_uppercase(),
            tracker: ReturnsTracker::new(config.window_cum)?,
            beta: RollingBetaEwma::new(
                config.window_reg,
                config.ewma_lambda,
                config.window_warmup,
                config.var_epsilon,
            )?,
            residuals: ResidualAccumulator::new(config.residual_horizon)?,
            gate: SignalGate::new(
                config.threshold_pct,
                config.hysteresis_pct,
                config.cooldown_bars,
            )?,
        })
    }

    pub fn symbols(&self) -> (&str, &str) {
        (&self.symbol_base, &self.symbol_dep)
    }

    /// Process one paired bar close.
    ///
    /// The very first observation of either leg produces no return and the
    /// regression is skipped for that step.
    pub fn on_bar_close(
        &mut self,
        base_close: f64,
        dependent_close: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> EngineUpdate {
        let mut update = EngineUpdate {
            timestamp,
            base_return: None,
            dependent_return: None,
            regression: None,
            residual_sum: None,
            own_move_pct: None,
            signal: None,
        };

        self.tracker.update(&self.symbol_base, base_close);
        self.tracker.update(&self.symbol_dep, dependent_close);

        let r_base = self.tracker.last_return(&self.symbol_base);
        let r_dep = self.tracker.last_return(&self.symbol_dep);
        let (Some(r_base), Some(r_dep)) = (r_base, r_dep) else {
            debug!("first observation of a leg, skipping regression step");
            return update;
        };
        update.base_return = Some(r_base);
        update.dependent_return = Some(r_dep);

        let snapshot = self.beta.update(r_base, r_dep, timestamp);

        if let (Some(alpha), Some(beta_smoothed)) = (snapshot.alpha, snapshot.beta_smoothed) {
            let eps = residual(r_dep, r_base, alpha, beta_smoothed);
            let sum = self.residuals.push(eps);
            let own_move_pct = sum.exp() - 1.0;
            update.residual_sum = Some(sum);
            update.own_move_pct = Some(own_move_pct);

            update.signal = self.gate.observe(own_move_pct, timestamp);
            if let Some(signal) = &update.signal {
                info!(
                    direction = ?signal.direction,
                    own_move_pct,
                    beta_smoothed,
                    "pair divergence signal"
                );
            }
        }

        update.regression = Some(snapshot);
        update
    }

    /// Clear all three processors and the gate; configuration is kept.
    pub fn reset(&mut self) {
        self.tracker.reset(&self.symbol_base);
        self.tracker.reset(&self.symbol_dep);
        self.beta.reset();
        self.residuals.reset();
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            window_reg: 60,
            window_warmup: 10,
            window_cum: 30,
            residual_horizon: 15,
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn first_bar_produces_no_regression_update() {
        let mut engine = PairEngine::from_config(&test_config()).unwrap();
        let update = engine.on_bar_close(50_000.0, 3_000.0, None);
        assert!(update.base_return.is_none());
        assert!(update.regression.is_none());
        assert!(update.signal.is_none());
    }

    #[test]
    fn residuals_flow_only_after_warmup() {
        let mut engine = PairEngine::from_config(&test_config()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(0.0, 0.003).unwrap();

        let mut base = 50_000.0;
        let mut dep = 3_000.0;
        for i in 0..30 {
            let r: f64 = noise.sample(&mut rng);
            base *= r.exp();
            dep *= (0.9 * r).exp();
            let update = engine.on_bar_close(base, dep, None);

            // Bar 0 warms the price memory; regression counts from bar 1.
            let n = i; // observations seen by the regression
            if n == 0 {
                assert!(update.regression.is_none());
            } else if n < 10 {
                let snapshot = update.regression.as_ref().unwrap();
                assert!(snapshot.beta_smoothed.is_none());
                assert!(update.residual_sum.is_none());
            } else {
                let snapshot = update.regression.as_ref().unwrap();
                assert!(snapshot.beta_smoothed.is_some());
                assert!(update.residual_sum.is_some());
                assert!(update.own_move_pct.is_some());
            }
        }
    }

    #[test]
    fn identical_legs_converge_to_unit_beta_and_zero_own_move() {
        let config = MonitorConfig {
            threshold_pct: 0.001,
            hysteresis_pct: 0.0001,
            ..test_config()
        };
        let mut engine = PairEngine::from_config(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let noise = Normal::new(0.0, 0.004).unwrap();

        let mut price = 100.0;
        let mut last = None;
        for _ in 0..60 {
            let r: f64 = noise.sample(&mut rng);
            price *= r.exp();
            last = Some(engine.on_bar_close(price, price, None));
        }
        let update = last.unwrap();
        let snapshot = update.regression.unwrap();

        assert!((snapshot.beta_smoothed.unwrap() - 1.0).abs() < 0.05);
        assert!(snapshot.alpha.unwrap().abs() < 1e-4);
        assert!(update.own_move_pct.unwrap().abs() < 1e-3);
        assert!(update.signal.is_none());
    }

    #[test]
    fn dependent_only_move_emits_divergence_signal() {
        let config = MonitorConfig {
            window_warmup: 5,
            threshold_pct: 0.01,
            hysteresis_pct: 0.002,
            cooldown_bars: 3,
            ..test_config()
        };
        let mut engine = PairEngine::from_config(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let noise = Normal::new(0.0, 0.004).unwrap();

        // Establish the relationship on correlated legs.
        let mut base = 50_000.0;
        let mut dep = 3_000.0;
        for _ in 0..20 {
            let r: f64 = noise.sample(&mut rng);
            base *= r.exp();
            dep *= r.exp();
            engine.on_bar_close(base, dep, None);
        }

        // Dependent leg rallies on its own while the base keeps wiggling.
        let mut fired = false;
        for _ in 0..10 {
            let r: f64 = noise.sample(&mut rng);
            base *= r.exp();
            dep *= (r + 0.004).exp();
            let update = engine.on_bar_close(base, dep, None);
            if let Some(signal) = update.signal {
                assert_eq!(signal.direction, pairs_core::SignalDirection::Up);
                assert!(signal.own_move_pct >= 0.01);
                fired = true;
                break;
            }
        }
        assert!(fired, "idiosyncratic rally must trip the gate");
    }

    #[test]
    fn reset_returns_engine_to_cold_start() {
        let mut engine = PairEngine::from_config(&test_config()).unwrap();
        for i in 0..15 {
            let drift = 1.0 + 0.001 * (i % 5) as f64;
            engine.on_bar_close(50_000.0 * drift, 3_000.0 / drift, None);
        }

        engine.reset();
        let update = engine.on_bar_close(50_000.0, 3_000.0, None);
        assert!(update.base_return.is_none());
        assert!(update.regression.is_none());
    }
}
