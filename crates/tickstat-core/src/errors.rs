//! History engine error types
//!
//! All failure paths are explicit return values; the engines never panic on
//! bad input. See the crate docs for the monotonic-time contract.

use thiserror::Error;

/// Errors reported by the history engines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Rejected at construction: zero bucket duration or an empty horizon.
    #[error(
        "invalid bucket configuration: bucket_duration={bucket_duration}, begin_time={begin_time}, end_time={end_time}"
    )]
    InvalidBucketConfig {
        bucket_duration: u64,
        begin_time: u64,
        end_time: u64,
    },

    /// The bucket factory produced a different number of accumulators than
    /// the horizon requires.
    #[error("bucket factory produced {produced} buckets, expected {expected}")]
    FactoryCount { expected: usize, produced: usize },

    /// Window offsets are inverted or empty (`begin_offset >= end_offset`).
    #[error("invalid window: [{begin_offset}, {end_offset})")]
    InvalidWindow { begin_offset: u64, end_offset: u64 },

    /// Window does not span a full bucket at the history's granularity, so
    /// its far edge would pass a bucket its near edge never entered.
    #[error(
        "window [{begin_offset}, {end_offset}) is narrower than one bucket of {bucket_duration}"
    )]
    WindowTooNarrow {
        begin_offset: u64,
        end_offset: u64,
        bucket_duration: u64,
    },

    /// Input time moved backwards. The call was rejected and no state was
    /// mutated; the caller must drop or re-sequence the event.
    #[error("out of order input: current={current} is before previous={previous}")]
    OutOfOrder { previous: u64, current: u64 },
}
