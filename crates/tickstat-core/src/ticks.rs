//! Sample tick payloads: trades and quotes
//!
//! The engines are payload-agnostic; these are the market-data types the
//! sample accumulators in [`crate::stats`] interpret. Timestamps are
//! epoch-free millisecond counters owned by the caller (session-relative in
//! the tests and benches).

use serde::{Deserialize, Serialize};

use crate::fixed_point::FixedPoint;
use crate::timed_history::TimedEvent;

/// One price level with size: a trade print or one side of the book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub price: FixedPoint,
    pub size: u32,
}

impl Tick {
    pub fn new(price: FixedPoint, size: u32) -> Self {
        Tick { price, size }
    }
}

/// A trade print with the quote that was standing when it occurred.
///
/// Carrying the contemporaneous bid/ask lets trade accumulators classify
/// the print against the midpoint (relative value).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeData {
    /// Millisecond timestamp
    pub time: u64,
    pub trade: Tick,
    pub bid: Tick,
    pub ask: Tick,
}

impl TradeData {
    pub fn new(time: u64, trade: Tick, bid: Tick, ask: Tick) -> Self {
        TradeData {
            time,
            trade,
            bid,
            ask,
        }
    }

    /// Quote midpoint at trade time, in raw fixed-point units
    pub fn mid_raw(&self) -> i64 {
        (self.bid.price.0 + self.ask.price.0) / 2
    }
}

impl TimedEvent for TradeData {
    fn time(&self) -> u64 {
        self.time
    }
}

/// A top-of-book quote update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteData {
    /// Millisecond timestamp
    pub time: u64,
    pub bid: Tick,
    pub ask: Tick,
}

impl QuoteData {
    pub fn new(time: u64, bid: Tick, ask: Tick) -> Self {
        QuoteData { time, bid, ask }
    }
}

impl TimedEvent for QuoteData {
    fn time(&self) -> u64 {
        self.time
    }
}
