use pairs_core::PairsError;

use crate::window::{BoundedWindow, WindowAggregate};

/// Regression error at one observation:
/// `eps = dependent_return - (alpha + beta * base_return)`.
pub fn residual(dependent_return: f64, base_return: f64, alpha: f64, beta: f64) -> f64 {
    dependent_return - (alpha + beta * base_return)
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningSum(f64);

impl WindowAggregate<f64> for RunningSum {
    fn combine(&mut self, item: &f64) {
        self.0 += *item;
    }
    fn uncombine(&mut self, item: &f64) {
        self.0 -= *item;
    }
    fn clear(&mut self) {
        self.0 = 0.0;
    }
}

/// Windowed sum of the most recent `horizon` residuals, maintained in O(1)
/// per push.
///
/// Callers typically exponentiate the sum (`exp(sum) - 1`) to express it as
/// a compounded "own move" of the dependent instrument; that conversion is a
/// presentation step outside this type.
pub struct ResidualAccumulator {
    window: BoundedWindow<f64, RunningSum>,
}

impl ResidualAccumulator {
    pub fn new(horizon: usize) -> Result<Self, PairsError> {
        if horizon == 0 {
            return Err(PairsError::InvalidConfig("horizon must be > 0".into()));
        }
        Ok(Self {
            window: BoundedWindow::new(horizon, RunningSum::default()),
        })
    }

    /// Append one residual and return the updated windowed sum. At capacity
    /// the evicted value is subtracted from the sum before the new one is
    /// added.
    pub fn push(&mut self, eps: f64) -> f64 {
        self.window.push(eps);
        self.value()
    }

    /// Current windowed sum, without mutation.
    pub fn value(&self) -> f64 {
        self.window.aggregate().0
    }

    pub fn horizon(&self) -> usize {
        self.window.capacity()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}
