//! Replay a recorded bar stream through the pair engine.
//!
//! Input is read from stdin or a file given as the first argument, one line
//! per event. Two line formats are accepted and may be mixed:
//!   - CSV: `timestamp_ms,base_close,dependent_close` (already paired);
//!   - kline JSON: one websocket kline payload per line, routed through the
//!     bar cache and paired on matching close minutes.
//! Lines that do not parse (e.g. a CSV header) are skipped with a warning.
//! Fired signals are written to stdout as JSON lines; logs go to stderr.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use pair_monitor::{BarCacheRegistry, EngineUpdate, MonitorConfig, PairEngine};
use pairs_core::Bar;

fn parse_csv_line(line: &str) -> Option<(Option<DateTime<Utc>>, f64, f64)> {
    let mut fields = line.split(',').map(str::trim);
    let ts_ms: i64 = fields.next()?.parse().ok()?;
    let base: f64 = fields.next()?.parse().ok()?;
    let dep: f64 = fields.next()?.parse().ok()?;
    Some((Utc.timestamp_millis_opt(ts_ms).single(), base, dep))
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

struct Replay {
    config: MonitorConfig,
    engine: PairEngine,
    registry: BarCacheRegistry,
    last_minute: Option<DateTime<Utc>>,
    bars: u64,
    signals: u64,
}

impl Replay {
    fn new(config: MonitorConfig) -> Result<Self> {
        let engine = PairEngine::from_config(&config)?;
        let registry = BarCacheRegistry::new(
            [config.symbol_base.as_str(), config.symbol_dep.as_str()],
            config.cache_len,
        );
        Ok(Self {
            config,
            engine,
            registry,
            last_minute: None,
            bars: 0,
            signals: 0,
        })
    }

    fn step(
        &mut self,
        base_close: f64,
        dependent_close: f64,
        ts: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let update = self.engine.on_bar_close(base_close, dependent_close, ts);
        self.bars += 1;
        self.report(&update)
    }

    /// Cache one kline bar; once both legs have a bar for the same minute,
    /// feed that minute through the engine.
    fn on_kline(&mut self, payload: &serde_json::Value) -> Result<()> {
        let Some(bar) = Bar::from_kline_json(payload) else {
            return Ok(()); // open candle or foreign payload
        };
        self.registry.add(bar);

        let base = self.registry.last(&self.config.symbol_base);
        let dep = self.registry.last(&self.config.symbol_dep);
        let (Some(base), Some(dep)) = (base, dep) else {
            return Ok(());
        };
        if base.minute != dep.minute || self.last_minute == Some(base.minute) {
            return Ok(());
        }
        let (minute, base_close, dep_close) = (base.minute, base.close, dep.close);

        self.last_minute = Some(minute);
        self.step(base_close, dep_close, Some(minute))
    }

    fn report(&mut self, update: &EngineUpdate) -> Result<()> {
        if let Some(snapshot) = &update.regression {
            tracing::debug!(
                n = snapshot.n,
                beta_smoothed = snapshot.beta_smoothed,
                r_squared = snapshot.r_squared,
                own_move_pct = update.own_move_pct,
                "bar processed"
            );
        }
        if let Some(signal) = &update.signal {
            self.signals += 1;
            // Machine-readable signal stream on stdout.
            println!("{}", serde_json::to_string(signal)?);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = MonitorConfig::from_env()?;
    tracing::info!(
        base = %config.symbol_base,
        dependent = %config.symbol_dep,
        window_reg = config.window_reg,
        warmup = config.window_warmup,
        horizon = config.residual_horizon,
        "configuration loaded"
    );

    let reader: Box<dyn BufRead> = match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            let file = File::open(&path).with_context(|| format!("cannot open {path}"))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let mut replay = Replay::new(config)?;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('{') {
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(payload) => replay.on_kline(&payload)?,
                Err(_) => tracing::warn!(line_no, "skipping malformed JSON line"),
            }
            continue;
        }

        let Some((ts, base_close, dep_close)) = parse_csv_line(line) else {
            tracing::warn!(line_no, "skipping unparseable line");
            continue;
        };
        if !(base_close.is_finite() && dep_close.is_finite()) {
            tracing::warn!(line_no, "skipping non-finite prices");
            continue;
        }
        replay.step(base_close, dep_close, ts)?;
    }

    tracing::info!(bars = replay.bars, signals = replay.signals, "replay complete");
    Ok(())
}
