use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Monitoring configuration, loaded from `.env` / environment variables.
///
/// Window sizes are in bars (minutes at a 1m timeframe). Percentage values
/// are fractions: 0.01 == 1%.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Base (explanatory) instrument symbol.
    pub symbol_base: String,
    /// Dependent instrument symbol.
    pub symbol_dep: String,

    /// Rolling OLS window size.
    pub window_reg: usize,
    /// Minimum observations before estimates are exposed.
    pub window_warmup: usize,
    /// Window for the per-symbol cumulative return.
    pub window_cum: usize,
    /// EWMA smoothing factor for beta.
    pub ewma_lambda: f64,
    /// Variance below which the base instrument is considered degenerate.
    pub var_epsilon: f64,
    /// Residual accumulation horizon, in bars.
    pub residual_horizon: usize,

    /// Own-move magnitude that fires a divergence signal.
    pub threshold_pct: f64,
    /// Re-arm band below the threshold.
    pub hysteresis_pct: f64,
    /// Minimum bars between consecutive signals.
    pub cooldown_bars: usize,

    /// Per-symbol bar cache capacity.
    pub cache_len: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbol_base: "BTCUSDT".to_string(),
            symbol_dep: "ETHUSDT".to_string(),
            window_reg: 240,
            window_warmup: 120,
            window_cum: 60,
            ewma_lambda: 0.94,
            var_epsilon: 1e-12,
            residual_horizon: 60,
            threshold_pct: 0.01,
            hysteresis_pct: 0.002,
            cooldown_bars: 30,
            cache_len: 600,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            symbol_base: env::var("SYMBOL_BASE").unwrap_or(defaults.symbol_base),
            symbol_dep: env::var("SYMBOL_DEP").unwrap_or(defaults.symbol_dep),
            window_reg: env::var("WINDOW_REG")
                .unwrap_or_else(|_| "240".to_string())
                .parse()?,
            window_warmup: env::var("WINDOW_WARMUP")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            window_cum: env::var("WINDOW_CUM")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            ewma_lambda: env::var("EWMA_LAMBDA")
                .unwrap_or_else(|_| "0.94".to_string())
                .parse()?,
            var_epsilon: env::var("VAR_EPSILON")
                .unwrap_or_else(|_| "1e-12".to_string())
                .parse()?,
            residual_horizon: env::var("RESIDUAL_HORIZON")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            threshold_pct: env::var("THRESHOLD_PCT")
                .unwrap_or_else(|_| "0.01".to_string())
                .parse()?,
            hysteresis_pct: env::var("HYSTERESIS_PCT")
                .unwrap_or_else(|_| "0.002".to_string())
                .parse()?,
            cooldown_bars: env::var("COOLDOWN_BARS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            cache_len: env::var("CACHE_LEN")
                .unwrap_or_else(|_| "600".to_string())
                .parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Misconfiguration fails startup loudly; data conditions never get
    /// this far.
    pub fn validate(&self) -> Result<()> {
        if self.symbol_base.trim().is_empty() || self.symbol_dep.trim().is_empty() {
            bail!("SYMBOL_BASE and SYMBOL_DEP must be non-empty");
        }
        if self.symbol_base.eq_ignore_ascii_case(&self.symbol_dep) {
            bail!("SYMBOL_BASE and SYMBOL_DEP must differ");
        }
        if self.window_reg <= 1 {
            bail!("WINDOW_REG must be > 1");
        }
        if self.window_warmup < 1 {
            bail!("WINDOW_WARMUP must be >= 1");
        }
        if self.window_cum < 1 {
            bail!("WINDOW_CUM must be >= 1");
        }
        if !(self.ewma_lambda > 0.0 && self.ewma_lambda < 1.0) {
            bail!("EWMA_LAMBDA must be in (0, 1)");
        }
        if self.var_epsilon <= 0.0 {
            bail!("VAR_EPSILON must be > 0");
        }
        if self.residual_horizon < 1 {
            bail!("RESIDUAL_HORIZON must be >= 1");
        }
        if self.threshold_pct <= 0.0 {
            bail!("THRESHOLD_PCT must be > 0");
        }
        if self.hysteresis_pct < 0.0 || self.hysteresis_pct >= self.threshold_pct {
            bail!("HYSTERESIS_PCT must be in [0, THRESHOLD_PCT)");
        }
        if self.cache_len < 1 {
            bail!("CACHE_LEN must be >= 1");
        }
        Ok(())
    }
}
