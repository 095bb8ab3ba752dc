use std::collections::{HashMap, VecDeque};

use pairs_core::Bar;

/// Ring cache of the most recent bars for one instrument.
///
/// Updates arrive strictly sequentially (one bar-close at a time), so the
/// cache is a plain single-writer structure with no internal locking.
#[derive(Debug)]
pub struct BarCache {
    symbol: String,
    capacity: usize,
    buf: VecDeque<Bar>,
}

impl BarCache {
    pub fn new(symbol: &str, capacity: usize) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            capacity,
            buf: VecDeque::with_capacity(capacity),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one bar, evicting the oldest at capacity. Bars for another
    /// symbol are ignored.
    pub fn add(&mut self, bar: Bar) {
        if bar.symbol != self.symbol {
            return;
        }
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(bar);
    }

    pub fn last(&self) -> Option<&Bar> {
        self.buf.back()
    }

    /// Up to `n` most recent bars, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &Bar> {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip)
    }
}

/// Registry of per-symbol bar caches, keyed by upper-cased symbol.
#[derive(Debug)]
pub struct BarCacheRegistry {
    capacity: usize,
    caches: HashMap<String, BarCache>,
}

impl BarCacheRegistry {
    pub fn new<I, S>(symbols: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut caches = HashMap::new();
        for symbol in symbols {
            let key = symbol.as_ref().to_uppercase();
            caches
                .entry(key.clone())
                .or_insert_with(|| BarCache::new(&key, capacity));
        }
        Self { capacity, caches }
    }

    pub fn get(&self, symbol: &str) -> Option<&BarCache> {
        self.caches.get(&symbol.to_uppercase())
    }

    /// Route a bar to its symbol's cache, creating the cache on first sight.
    pub fn add(&mut self, bar: Bar) {
        let key = bar.symbol.to_uppercase();
        let capacity = self.capacity;
        self.caches
            .entry(key.clone())
            .or_insert_with(|| BarCache::new(&key, capacity))
            .add(bar);
    }

    pub fn last(&self, symbol: &str) -> Option<&Bar> {
        self.get(symbol).and_then(BarCache::last)
    }

    pub fn last_n(&self, symbol: &str, n: usize) -> Vec<&Bar> {
        self.get(symbol)
            .map(|cache| cache.last_n(n).collect())
            .unwrap_or_default()
    }
}
