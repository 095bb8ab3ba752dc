use std::collections::HashMap;

use pairs_core::{PairsError, ReturnUpdate};

use crate::window::BoundedWindow;

/// Log-return between two closes: `ln(curr / prev)`.
///
/// Non-positive prices are not economically meaningful; they yield `0.0`
/// instead of propagating NaN or -inf into downstream accumulators.
pub fn log_return(prev_close: f64, curr_close: f64) -> f64 {
    if prev_close <= 0.0 || curr_close <= 0.0 {
        return 0.0;
    }
    (curr_close / prev_close).ln()
}

/// Compounded return implied by a sequence of log-returns:
/// `exp(sum) - 1`, as a fraction (0.01 == +1%). Empty input yields `0.0`.
pub fn cumulative_return<I>(log_returns: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let total: f64 = log_returns.into_iter().sum();
    total.exp() - 1.0
}

/// Clip values to the `[p_low, p_high]` percentile bounds of the input.
///
/// Non-finite values are filtered out first. Percentile bounds use
/// nearest-rank indexing into the sorted values; interpolation is not needed
/// for clipping. The input is not modified. Not used internally by the
/// tracker; exposed for callers that pre-clean raw return series.
pub fn winsorize(values: &[f64], p_low: f64, p_high: f64) -> Result<Vec<f64>, PairsError> {
    if !(0.0 <= p_low && p_low <= p_high && p_high <= 1.0) {
        return Err(PairsError::InvalidConfig(
            "percentiles must satisfy 0 <= p_low <= p_high <= 1".into(),
        ));
    }

    let vals: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return Ok(vals);
    }

    let mut sorted = vals.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let rank = |p: f64| -> usize {
        let i = (p * (n - 1) as f64).round() as isize;
        i.clamp(0, n as isize - 1) as usize
    };
    let q_low = sorted[rank(p_low)];
    let q_high = sorted[rank(p_high)];

    Ok(vals.into_iter().map(|v| v.clamp(q_low, q_high)).collect())
}

#[derive(Debug)]
struct SeriesState {
    last_close: Option<f64>,
    window: BoundedWindow<f64, ()>,
}

/// Per-symbol log-return accumulator with a bounded window for the
/// cumulative return.
///
/// Symbol keys are normalized to upper case; state is created lazily on the
/// first observation of a new symbol. The cumulative return is recomputed
/// over the live window on every update: it is a nonlinear function of the
/// whole window, so the incremental add/subtract trick does not apply.
pub struct ReturnsTracker {
    window_size: usize,
    series: HashMap<String, SeriesState>,
}

impl ReturnsTracker {
    pub fn new(window_size: usize) -> Result<Self, PairsError> {
        if window_size == 0 {
            return Err(PairsError::InvalidConfig("window_size must be > 0".into()));
        }
        Ok(Self {
            window_size,
            series: HashMap::new(),
        })
    }

    /// Feed one closing price for `symbol`.
    ///
    /// The first observation only initializes the last-price memory and
    /// produces no return. Afterwards, each positive price yields a
    /// log-return pushed into the window; the cumulative return covers
    /// whatever the window currently holds, so partial windows report
    /// partial compounding rather than nothing.
    pub fn update(&mut self, symbol: &str, close: f64) -> ReturnUpdate {
        let window_size = self.window_size;
        let state = self
            .series
            .entry(symbol.to_uppercase())
            .or_insert_with(|| SeriesState {
                last_close: None,
                window: BoundedWindow::new(window_size, ()),
            });

        let mut last_log_return = None;
        if let Some(prev) = state.last_close {
            if close > 0.0 {
                let r = log_return(prev, close);
                state.window.push(r);
                last_log_return = Some(r);
            }
        }
        if close > 0.0 {
            state.last_close = Some(close);
        }

        let cumulative_return_pct = if state.window.is_empty() {
            None
        } else {
            Some(cumulative_return(state.window.iter().copied()))
        };

        ReturnUpdate {
            count: state.window.len(),
            last_log_return,
            cumulative_return_pct,
        }
    }

    /// Most recent log-return for `symbol`, if any.
    pub fn last_return(&self, symbol: &str) -> Option<f64> {
        self.series
            .get(&symbol.to_uppercase())
            .and_then(|s| s.window.back().copied())
    }

    /// Discard all state for `symbol`; the next update behaves like a first
    /// observation.
    pub fn reset(&mut self, symbol: &str) {
        self.series.remove(&symbol.to_uppercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs().max(a.abs()).max(f64::MIN_POSITIVE)
    }

    #[test]
    fn log_return_zero_for_non_positive_prices() {
        assert_eq!(log_return(0.0, 100.0), 0.0);
        assert_eq!(log_return(100.0, 0.0), 0.0);
        assert_eq!(log_return(-100.0, 110.0), 0.0);
        assert_eq!(log_return(100.0, -110.0), 0.0);
        assert_eq!(log_return(-100.0, -200.0), 0.0);
    }

    #[test]
    fn log_return_and_cumulative_round_trip() {
        assert!(close_to(log_return(100.0, 110.0), 0.0953102, 1e-6));

        // +5% then back down: compounded change is zero.
        let r = [log_return(100.0, 105.0), log_return(105.0, 100.0)];
        assert!(cumulative_return(r).abs() < 1e-12);

        assert_eq!(cumulative_return(std::iter::empty()), 0.0);
    }

    #[test]
    fn partial_windows_report_partial_compounding() {
        let mut t = ReturnsTracker::new(4).unwrap();
        // Each step is ~ +1%.
        let prices = [100.0, 101.0, 102.01, 103.0301, 104.060401];

        let outs: Vec<_> = prices.iter().map(|&p| t.update("ETHUSDT", p)).collect();

        assert_eq!(outs[0].count, 0);
        assert!(outs[0].cumulative_return_pct.is_none());

        for (i, out) in outs.iter().enumerate().skip(1) {
            assert_eq!(out.count, i);
            let expected = 1.01f64.powi(i as i32) - 1.0;
            assert!(close_to(out.cumulative_return_pct.unwrap(), expected, 1e-9));
        }
    }

    #[test]
    fn tracker_flow_and_case_normalization() {
        let mut t = ReturnsTracker::new(3).unwrap();

        let out = t.update("ethusdt", 100.0);
        assert_eq!(out.count, 0);
        assert!(out.last_log_return.is_none());

        let out = t.update("ETHUSDT", 105.0);
        assert_eq!(out.count, 1);
        assert!(out.last_log_return.is_some());
        assert!(out.cumulative_return_pct.is_some());
        assert_eq!(t.last_return("EthUsdt"), out.last_log_return);
    }

    #[test]
    fn non_positive_price_produces_no_return_but_keeps_state() {
        let mut t = ReturnsTracker::new(3).unwrap();
        t.update("BTCUSDT", 100.0);

        let out = t.update("BTCUSDT", 0.0);
        assert_eq!(out.count, 0);
        assert!(out.last_log_return.is_none());

        // Last valid price is still 100; next positive close resumes.
        let out = t.update("BTCUSDT", 110.0);
        assert_eq!(out.count, 1);
        assert!(close_to(out.last_log_return.unwrap(), 0.0953102, 1e-6));
    }

    #[test]
    fn reset_discards_symbol_state() {
        let mut t = ReturnsTracker::new(3).unwrap();
        t.update("ETHUSDT", 100.0);
        t.update("ETHUSDT", 105.0);
        assert!(t.last_return("ETHUSDT").is_some());

        t.reset("ethusdt");
        assert!(t.last_return("ETHUSDT").is_none());
        let out = t.update("ETHUSDT", 100.0);
        assert_eq!(out.count, 0);
    }

    #[test]
    fn window_evicts_oldest_return() {
        let mut t = ReturnsTracker::new(2).unwrap();
        for p in [100.0, 110.0, 121.0, 133.1] {
            t.update("ETHUSDT", p);
        }
        // Window holds the last two +10% returns: (1.1)^2 - 1.
        let out = t.update("ETHUSDT", 146.41);
        assert_eq!(out.count, 2);
        assert!(close_to(out.cumulative_return_pct.unwrap(), 0.21, 1e-9));
    }

    #[test]
    fn winsorize_clips_tails_and_filters_non_finite() {
        let data = [-10.0, -0.2, -0.1, 0.0, 0.1, 0.2, 10.0];
        let w = winsorize(&data, 0.10, 0.90).unwrap();
        assert!(w.iter().all(|v| (-0.2..=0.2).contains(v)));
        assert_eq!(w.len(), data.len());

        // Degenerate bounds are a no-op.
        let w2 = winsorize(&data, 0.0, 1.0).unwrap();
        assert_eq!(w2, data.to_vec());

        let with_bad = [1.0, f64::NAN, 2.0, f64::INFINITY, 3.0];
        let w3 = winsorize(&with_bad, 0.0, 1.0).unwrap();
        assert_eq!(w3, vec![1.0, 2.0, 3.0]);

        assert!(winsorize(&data, 0.9, 0.1).is_err());
        assert!(winsorize(&data, -0.1, 0.5).is_err());
    }
}
