//! Builders for consistent test data across unit and integration tests

use crate::fixed_point::FixedPoint;
use crate::ticks::{QuoteData, Tick, TradeData};

/// A trade print at `price` straddled by a one-unit-wide quote
pub fn trade_at(time: u64, price: &str, size: u32) -> TradeData {
    let price = FixedPoint::from_str(price).unwrap();
    TradeData::new(
        time,
        Tick::new(price, size),
        Tick::new(FixedPoint(price.0 - crate::fixed_point::SCALE / 2), size),
        Tick::new(FixedPoint(price.0 + crate::fixed_point::SCALE / 2), size),
    )
}

/// A symmetric quote around `mid` with equal depth on both sides
pub fn quote_around(time: u64, mid: &str, size: u32) -> QuoteData {
    let mid = FixedPoint::from_str(mid).unwrap();
    QuoteData::new(
        time,
        Tick::new(FixedPoint(mid.0 - crate::fixed_point::SCALE / 2), size),
        Tick::new(FixedPoint(mid.0 + crate::fixed_point::SCALE / 2), size),
    )
}

/// A quote with explicit sides
pub fn quote(time: u64, bid: &str, bid_size: u32, ask: &str, ask_size: u32) -> QuoteData {
    QuoteData::new(
        time,
        Tick::new(FixedPoint::from_str(bid).unwrap(), bid_size),
        Tick::new(FixedPoint::from_str(ask).unwrap(), ask_size),
    )
}
