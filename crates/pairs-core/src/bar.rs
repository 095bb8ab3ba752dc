use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed OHLCV bar for one instrument, with a canonical minute label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument symbol, always upper-cased.
    pub symbol: String,
    /// Bar interval, e.g. "1m".
    pub interval: String,
    pub open_ts: DateTime<Utc>,
    pub close_ts: DateTime<Utc>,
    /// Canonical close-minute label (seconds and sub-seconds zeroed).
    pub minute: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub quote_volume: Option<f64>,
    #[serde(default)]
    pub trades: Option<i64>,
    #[serde(default)]
    pub taker_buy_base: Option<f64>,
    #[serde(default)]
    pub taker_buy_quote: Option<f64>,
}

/// Exchange payloads encode prices as JSON strings; REST rows use numbers.
fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl Bar {
    fn dt_from_ms(ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms).single()
    }

    /// Close times arrive as the last millisecond of the minute (...59999).
    /// Take (T + 1) and truncate to the minute boundary.
    fn minute_from_close_ms(close_ms: i64) -> Option<DateTime<Utc>> {
        let minute_epoch = ((close_ms + 1) / 60_000) * 60;
        Utc.timestamp_opt(minute_epoch, 0).single()
    }

    fn ohlc_consistent(open: f64, high: f64, low: f64, close: f64) -> bool {
        low <= open.min(close) && open.max(close) <= high
    }

    /// Parse a websocket kline payload into a `Bar`.
    ///
    /// Both shapes are supported:
    ///   1. combined stream: `{"stream": "...", "data": {"e": "kline", "s": ..., "k": {...}}}`
    ///   2. raw stream:      `{"e": "kline", "s": ..., "k": {...}}`
    ///
    /// Returns `None` for candles that are not yet closed (`k.x == false`) or
    /// for inconsistent data.
    pub fn from_kline_json(payload: &Value) -> Option<Bar> {
        let data = payload.get("data").unwrap_or(payload);
        let k = data.get("k")?.as_object()?;
        if !k.get("x").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }

        let symbol = k
            .get("s")
            .and_then(Value::as_str)
            .or_else(|| data.get("s").and_then(Value::as_str))?
            .to_uppercase();
        if symbol.is_empty() {
            return None;
        }

        let interval = k
            .get("i")
            .and_then(Value::as_str)
            .unwrap_or("1m")
            .to_string();
        let open_ms = k.get("t").and_then(as_i64)?;
        let close_ms = k.get("T").and_then(as_i64)?;

        let open = k.get("o").and_then(as_f64)?;
        let high = k.get("h").and_then(as_f64)?;
        let low = k.get("l").and_then(as_f64)?;
        let close = k.get("c").and_then(as_f64)?;
        let volume = k.get("v").and_then(as_f64)?;
        if !Self::ohlc_consistent(open, high, low, close) {
            return None;
        }

        Some(Bar {
            symbol,
            interval,
            open_ts: Self::dt_from_ms(open_ms)?,
            close_ts: Self::dt_from_ms(close_ms)?,
            minute: Self::minute_from_close_ms(close_ms)?,
            open,
            high,
            low,
            close,
            volume,
            quote_volume: k.get("q").and_then(as_f64),
            trades: k.get("n").and_then(as_i64),
            taker_buy_base: k.get("V").and_then(as_f64),
            taker_buy_quote: k.get("Q").and_then(as_f64),
        })
    }

    /// Parse one REST klines row into a `Bar`.
    ///
    /// Row layout: `[openTime, open, high, low, close, volume, closeTime,
    /// quoteAssetVolume, numberOfTrades, takerBuyBase, takerBuyQuote, ignore]`.
    pub fn from_rest_row(row: &[Value], symbol: &str, interval: &str) -> Option<Bar> {
        let open_ms = row.get(0).and_then(as_i64)?;
        let open = row.get(1).and_then(as_f64)?;
        let high = row.get(2).and_then(as_f64)?;
        let low = row.get(3).and_then(as_f64)?;
        let close = row.get(4).and_then(as_f64)?;
        let volume = row.get(5).and_then(as_f64)?;
        let close_ms = row.get(6).and_then(as_i64)?;
        if !Self::ohlc_consistent(open, high, low, close) {
            return None;
        }

        Some(Bar {
            symbol: symbol.to_uppercase(),
            interval: interval.to_string(),
            open_ts: Self::dt_from_ms(open_ms)?,
            close_ts: Self::dt_from_ms(close_ms)?,
            minute: Self::minute_from_close_ms(close_ms)?,
            open,
            high,
            low,
            close,
            volume,
            quote_volume: row.get(7).and_then(as_f64),
            trades: row.get(8).and_then(as_i64),
            taker_buy_base: row.get(9).and_then(as_f64),
            taker_buy_quote: row.get(10).and_then(as_f64),
        })
    }

    /// Unique key of the bar for caching / deduplication.
    pub fn key(&self) -> (&str, &str, DateTime<Utc>) {
        (&self.symbol, &self.interval, self.minute)
    }
}
