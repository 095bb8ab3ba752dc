//! Orchestration around the streaming pair-regression core: configuration,
//! the per-symbol bar cache, the per-bar processing pipeline and the
//! divergence signal gate.

pub mod cache;
pub mod config;
pub mod engine;
pub mod signal;

pub use cache::{BarCache, BarCacheRegistry};
pub use config::MonitorConfig;
pub use engine::{EngineUpdate, PairEngine};
pub use signal::SignalGate;
