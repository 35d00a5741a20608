//! Incremental rolling-window tick statistics
//!
//! Maintains many simultaneous sliding-window aggregates over a strictly
//! time-ordered event stream, updated on every event at a cost independent
//! of window length. Two engines cover the resolution/memory trade-off:
//!
//! - [`BucketHistory`]: fixed-duration accumulator buckets over a
//!   configured horizon; windowed aggregators are updated by whole buckets
//!   at boundary crossings, real-time aggregators on every event.
//! - [`TimedHistory`]: exact sliding windows over the raw events, retained
//!   only as long as the widest registered window and recycled through an
//!   owned pool.
//!
//! The engines are payload-agnostic behind the [`Accumulator`] trait;
//! [`ticks`] and [`stats`] provide the market-data sample instantiation
//! (trades, quotes, VWAP, depth imbalance).
//!
//! Single-threaded by design: one logical producer per history instance,
//! delivering non-decreasing timestamps. Independent instances (one per
//! symbol) share nothing and may live on separate threads.

pub mod accumulator;
pub mod aggregator;
pub mod bucket_history;
pub mod errors;
pub mod fixed_point;
pub mod pool;
pub mod stats;
pub mod ticks;
pub mod timed_history;

// Test utilities (only available in test builds or with test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use accumulator::{Accumulator, BucketFactory, CountStats, DefaultBucketFactory};
pub use aggregator::{AggregatorId, Window};
pub use bucket_history::{BucketHistory, TimeWeightedBucketHistory};
pub use errors::HistoryError;
pub use fixed_point::FixedPoint;
pub use stats::{QuoteStats, TradeStats};
pub use ticks::{QuoteData, Tick, TradeData};
pub use timed_history::{TimedEvent, TimedHistory};
