//! Sample accumulators over the tick payloads
//!
//! [`TradeStats`] is event-weighted: a print contributes once, on its fresh
//! flag. [`QuoteStats`] is duration-weighted: bid/ask values accrue by the
//! time they stay in effect, so its accessors are time-weighted means. Both
//! keep all internal sums in integers so add/sub and combine/uncombine stay
//! exactly inverse as windows slide.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::accumulator::Accumulator;
use crate::fixed_point::FixedPoint;
use crate::ticks::{QuoteData, TradeData};

/// Prints larger than this size are treated as block crosses and excluded
/// from flow statistics.
const OUTSIZED_PRINT: u32 = 20_000;

/// Rolling trade-flow summary: volume, VWAP input sums and relative value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStats {
    duration: i64,
    /// Σ price·size in raw fixed-point units
    notional: i128,
    volume: i64,
    trades: i64,
    /// Σ (price − mid)·size: signed flow-toxicity input
    relative_value: i128,
}

impl TradeStats {
    /// Volume-weighted average price over the window
    pub fn vwap(&self) -> FixedPoint {
        if self.volume == 0 {
            return FixedPoint(0);
        }
        FixedPoint((self.notional / self.volume as i128) as i64)
    }

    pub fn volume(&self) -> i64 {
        self.volume
    }

    pub fn trades(&self) -> i64 {
        self.trades
    }

    /// Σ (price − mid)·size in raw fixed-point units
    pub fn relative_value(&self) -> i128 {
        self.relative_value
    }
}

impl Accumulator for TradeStats {
    type Payload = TradeData;

    fn add_data(&mut self, duration: u64, payload: &TradeData, fresh: bool) {
        self.duration += duration as i64;
        if !fresh {
            return;
        }
        let trade = payload.trade;
        if trade.size > OUTSIZED_PRINT {
            return;
        }
        self.notional += trade.price.raw_i128() * trade.size as i128;
        self.volume += trade.size as i64;
        self.trades += 1;
        self.relative_value += (trade.price.0 - payload.mid_raw()) as i128 * trade.size as i128;
    }

    fn sub_data(&mut self, duration: u64, payload: &TradeData, fresh: bool) {
        self.duration -= duration as i64;
        if !fresh {
            return;
        }
        let trade = payload.trade;
        if trade.size > OUTSIZED_PRINT {
            return;
        }
        if self.volume < trade.size as i64 || self.trades == 0 {
            // Subtracting what was never added is an algorithmic invariant
            // violation upstream, not a recoverable input error.
            error!(
                volume = self.volume,
                size = trade.size,
                trades = self.trades,
                "trade stats underflow"
            );
            debug_assert!(false, "trade stats underflow");
            return;
        }
        self.notional -= trade.price.raw_i128() * trade.size as i128;
        self.volume -= trade.size as i64;
        self.trades -= 1;
        self.relative_value -= (trade.price.0 - payload.mid_raw()) as i128 * trade.size as i128;
    }

    fn add_duration(&mut self, duration: u64) {
        self.duration += duration as i64;
    }

    fn sub_duration(&mut self, duration: u64) {
        self.duration -= duration as i64;
    }

    fn combine(&mut self, other: &Self) {
        self.duration += other.duration;
        self.notional += other.notional;
        self.volume += other.volume;
        self.trades += other.trades;
        self.relative_value += other.relative_value;
    }

    fn uncombine(&mut self, other: &Self) {
        self.duration -= other.duration;
        self.notional -= other.notional;
        self.volume -= other.volume;
        self.trades -= other.trades;
        self.relative_value -= other.relative_value;
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn reset(&mut self) {
        *self = TradeStats::default();
    }
}

/// Rolling top-of-book summary with duration-weighted sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteStats {
    duration: i64,
    /// Σ bid·duration in raw fixed-point units
    bid_notional: i128,
    ask_notional: i128,
    /// Σ bid_size·duration
    bid_depth: i128,
    ask_depth: i128,
    quotes: i64,
}

impl QuoteStats {
    /// Time-weighted mean bid over the window
    pub fn mean_bid(&self) -> FixedPoint {
        self.weighted(self.bid_notional)
    }

    /// Time-weighted mean ask over the window
    pub fn mean_ask(&self) -> FixedPoint {
        self.weighted(self.ask_notional)
    }

    /// Time-weighted mean bid size
    pub fn mean_bid_size(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        self.bid_depth as f64 / self.duration as f64
    }

    /// Time-weighted mean ask size
    pub fn mean_ask_size(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        self.ask_depth as f64 / self.duration as f64
    }

    /// Depth imbalance in [-1, 1]: (bid − ask) / (bid + ask)
    pub fn imbalance(&self) -> f64 {
        let total = self.bid_depth + self.ask_depth;
        if total == 0 {
            return 0.0;
        }
        (self.bid_depth - self.ask_depth) as f64 / total as f64
    }

    /// Quote updates observed inside the window
    pub fn quotes(&self) -> i64 {
        self.quotes
    }

    fn weighted(&self, notional: i128) -> FixedPoint {
        if self.duration == 0 {
            return FixedPoint(0);
        }
        FixedPoint((notional / self.duration as i128) as i64)
    }
}

impl Accumulator for QuoteStats {
    type Payload = QuoteData;

    fn add_data(&mut self, duration: u64, payload: &QuoteData, fresh: bool) {
        let duration = duration as i64;
        self.duration += duration;
        self.bid_notional += payload.bid.price.raw_i128() * duration as i128;
        self.ask_notional += payload.ask.price.raw_i128() * duration as i128;
        self.bid_depth += payload.bid.size as i128 * duration as i128;
        self.ask_depth += payload.ask.size as i128 * duration as i128;
        if fresh {
            self.quotes += 1;
        }
    }

    fn sub_data(&mut self, duration: u64, payload: &QuoteData, fresh: bool) {
        let duration = duration as i64;
        self.duration -= duration;
        self.bid_notional -= payload.bid.price.raw_i128() * duration as i128;
        self.ask_notional -= payload.ask.price.raw_i128() * duration as i128;
        self.bid_depth -= payload.bid.size as i128 * duration as i128;
        self.ask_depth -= payload.ask.size as i128 * duration as i128;
        if fresh {
            self.quotes -= 1;
        }
    }

    fn add_duration(&mut self, duration: u64) {
        self.duration += duration as i64;
    }

    fn sub_duration(&mut self, duration: u64) {
        self.duration -= duration as i64;
    }

    fn combine(&mut self, other: &Self) {
        self.duration += other.duration;
        self.bid_notional += other.bid_notional;
        self.ask_notional += other.ask_notional;
        self.bid_depth += other.bid_depth;
        self.ask_depth += other.ask_depth;
        self.quotes += other.quotes;
    }

    fn uncombine(&mut self, other: &Self) {
        self.duration -= other.duration;
        self.bid_notional -= other.bid_notional;
        self.ask_notional -= other.ask_notional;
        self.bid_depth -= other.bid_depth;
        self.ask_depth -= other.ask_depth;
        self.quotes -= other.quotes;
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn reset(&mut self) {
        *self = QuoteStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticks::Tick;

    fn print(price: i64, size: u32) -> TradeData {
        TradeData::new(
            0,
            Tick::new(FixedPoint::from_units(price), size),
            Tick::new(FixedPoint::from_units(price - 1), 10),
            Tick::new(FixedPoint::from_units(price + 1), 10),
        )
    }

    #[test]
    fn vwap_weights_prints_by_size() {
        let mut stats = TradeStats::default();
        stats.add_data(0, &print(100, 10), true);
        stats.add_data(0, &print(110, 30), true);
        // (100*10 + 110*30) / 40 = 107.5
        assert_eq!(stats.vwap(), FixedPoint::from_str("107.5").unwrap());
        assert_eq!(stats.volume(), 40);
        assert_eq!(stats.trades(), 2);
    }

    #[test]
    fn relative_value_is_signed_against_the_mid() {
        let mut stats = TradeStats::default();
        // Print at 100 with mid 100: no relative value
        let balanced = print(100, 10);
        stats.add_data(0, &balanced, true);
        assert_eq!(stats.relative_value(), 0);

        // Print one unit above the mid, size 5
        let above = TradeData::new(
            0,
            Tick::new(FixedPoint::from_units(101), 5),
            Tick::new(FixedPoint::from_units(99), 10),
            Tick::new(FixedPoint::from_units(101), 10),
        );
        stats.add_data(0, &above, true);
        assert_eq!(
            stats.relative_value(),
            FixedPoint::from_units(1).raw_i128() * 5
        );
    }

    #[test]
    fn outsized_prints_are_excluded() {
        let mut stats = TradeStats::default();
        stats.add_data(5, &print(100, OUTSIZED_PRINT + 1), true);
        assert_eq!(stats.volume(), 0);
        assert_eq!(stats.trades(), 0);
        // Duration still accrues
        assert_eq!(stats.duration(), 5);
        // Symmetric on the way out: no underflow
        stats.sub_data(5, &print(100, OUTSIZED_PRINT + 1), true);
        assert_eq!(stats, TradeStats::default());
    }

    #[test]
    fn carried_prints_do_not_recount() {
        let mut stats = TradeStats::default();
        let p = print(100, 10);
        stats.add_data(0, &p, true);
        stats.add_data(7, &p, false);
        assert_eq!(stats.trades(), 1);
        assert_eq!(stats.volume(), 10);
        assert_eq!(stats.duration(), 7);
    }

    #[test]
    fn trade_combine_uncombine_round_trip() {
        let mut a = TradeStats::default();
        a.add_data(3, &print(100, 10), true);
        let before = a;

        let mut b = TradeStats::default();
        b.add_data(4, &print(105, 20), true);

        a.combine(&b);
        a.uncombine(&b);
        assert_eq!(a, before);
    }

    fn quote(bid: i64, bid_size: u32, ask: i64, ask_size: u32) -> QuoteData {
        QuoteData::new(
            0,
            Tick::new(FixedPoint::from_units(bid), bid_size),
            Tick::new(FixedPoint::from_units(ask), ask_size),
        )
    }

    #[test]
    fn quote_means_are_time_weighted() {
        let mut stats = QuoteStats::default();
        // 100/102 standing for 3 units, then 104/106 for 1 unit
        stats.add_data(3, &quote(100, 10, 102, 10), true);
        stats.add_data(1, &quote(104, 10, 106, 10), true);
        // (100*3 + 104*1) / 4 = 101
        assert_eq!(stats.mean_bid(), FixedPoint::from_units(101));
        assert_eq!(stats.mean_ask(), FixedPoint::from_units(103));
        assert_eq!(stats.quotes(), 2);
    }

    #[test]
    fn imbalance_reflects_depth_skew() {
        let mut stats = QuoteStats::default();
        stats.add_data(10, &quote(100, 30, 101, 10), true);
        // (300 - 100) / 400
        assert!((stats.imbalance() - 0.5).abs() < 1e-12);
        assert_eq!(stats.mean_bid_size(), 30.0);
        assert_eq!(stats.mean_ask_size(), 10.0);
    }

    #[test]
    fn quote_count_tracks_fresh_flag_only() {
        let mut stats = QuoteStats::default();
        let q = quote(100, 10, 101, 10);
        stats.add_data(2, &q, true);
        stats.add_data(5, &q, false);
        assert_eq!(stats.quotes(), 1);
        assert_eq!(stats.duration(), 7);

        stats.sub_data(2, &q, true);
        stats.sub_data(5, &q, false);
        assert_eq!(stats, QuoteStats::default());
    }
}
