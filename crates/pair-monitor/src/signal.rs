use chrono::{DateTime, Utc};
use pairs_core::{PairSignal, PairsError, SignalDirection};
use tracing::debug;

/// Threshold gate over the own-move signal, with hysteresis re-arm and a
/// per-bar cooldown.
///
/// A signal fires when the magnitude reaches `threshold_pct` while the gate
/// is armed and out of cooldown. Firing disarms the gate; it re-arms only
/// once the magnitude falls below `threshold_pct - hysteresis_pct`, so a
/// value oscillating around the threshold cannot re-fire every bar. The
/// cooldown counts observed bars and is independent of the hysteresis
/// condition; both must allow a new emission.
#[derive(Debug)]
pub struct SignalGate {
    threshold_pct: f64,
    hysteresis_pct: f64,
    cooldown_bars: usize,
    armed: bool,
    cooldown_left: usize,
}

impl SignalGate {
    pub fn new(
        threshold_pct: f64,
        hysteresis_pct: f64,
        cooldown_bars: usize,
    ) -> Result<Self, PairsError> {
        if threshold_pct <= 0.0 {
            return Err(PairsError::InvalidConfig("threshold_pct must be > 0".into()));
        }
        if hysteresis_pct < 0.0 || hysteresis_pct >= threshold_pct {
            return Err(PairsError::InvalidConfig(
                "hysteresis_pct must be in [0, threshold_pct)".into(),
            ));
        }
        Ok(Self {
            threshold_pct,
            hysteresis_pct,
            cooldown_bars,
            armed: true,
            cooldown_left: 0,
        })
    }

    /// Observe one bar's own-move value; returns a signal if one fires.
    pub fn observe(
        &mut self,
        own_move_pct: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Option<PairSignal> {
        if self.cooldown_left > 0 {
            self.cooldown_left -= 1;
        }

        let magnitude = own_move_pct.abs();
        if !self.armed && magnitude < self.threshold_pct - self.hysteresis_pct {
            debug!(own_move_pct, "signal gate re-armed");
            self.armed = true;
        }

        if self.armed && self.cooldown_left == 0 && magnitude >= self.threshold_pct {
            self.armed = false;
            self.cooldown_left = self.cooldown_bars;
            return Some(PairSignal {
                direction: if own_move_pct >= 0.0 {
                    SignalDirection::Up
                } else {
                    SignalDirection::Down
                },
                own_move_pct,
                timestamp,
            });
        }
        None
    }

    pub fn reset(&mut self) {
        self.armed = true;
        self.cooldown_left = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_at_threshold_and_reports_direction() {
        let mut gate = SignalGate::new(0.01, 0.002, 0).unwrap();
        assert!(gate.observe(0.005, None).is_none());

        let signal = gate.observe(0.012, None).unwrap();
        assert_eq!(signal.direction, SignalDirection::Up);
        assert_eq!(signal.own_move_pct, 0.012);

        gate.reset();
        let signal = gate.observe(-0.015, None).unwrap();
        assert_eq!(signal.direction, SignalDirection::Down);
    }

    #[test]
    fn holds_through_hysteresis_band() {
        let mut gate = SignalGate::new(0.01, 0.002, 0).unwrap();
        assert!(gate.observe(0.011, None).is_some());
        // Still above the re-arm bound: no re-fire even above threshold.
        assert!(gate.observe(0.009, None).is_none());
        assert!(gate.observe(0.012, None).is_none());
        // Drops below threshold - hysteresis: re-arms, next breach fires.
        assert!(gate.observe(0.007, None).is_none());
        assert!(gate.observe(0.013, None).is_some());
    }

    #[test]
    fn cooldown_blocks_even_after_rearm() {
        let mut gate = SignalGate::new(0.01, 0.002, 3).unwrap();
        assert!(gate.observe(0.02, None).is_some());
        // Re-armed immediately, but cooldown still running.
        assert!(gate.observe(0.0, None).is_none());
        assert!(gate.observe(0.02, None).is_none());
        assert!(gate.observe(0.0, None).is_none());
        // Cooldown expired.
        assert!(gate.observe(0.02, None).is_some());
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(SignalGate::new(0.0, 0.0, 0).is_err());
        assert!(SignalGate::new(0.01, 0.01, 0).is_err());
        assert!(SignalGate::new(0.01, -0.001, 0).is_err());
        assert!(SignalGate::new(0.01, 0.0, 0).is_ok());
    }
}
