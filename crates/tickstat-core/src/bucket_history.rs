//! Fixed-bucket rolling-window engine
//!
//! [`BucketHistory`] maintains a contiguous sequence of fixed-duration
//! accumulator buckets over a configured horizon and keeps every registered
//! aggregator current at O(1) amortized cost per event: real-time
//! aggregators are touched on every update, windowed aggregators only when
//! a bucket boundary is crossed. Whole closed buckets are combined in as a
//! window's near edge reaches them and uncombined out as its far edge
//! passes them, so the cost per boundary is O(#aggregators) regardless of
//! window length.
//!
//! [`TimeWeightedBucketHistory`] runs the same bucket machinery but carries
//! the most recent payload forward and attributes elapsed time *at that
//! value*, for series (quotes) whose observation persists between events.

use tracing::{debug, warn};

use crate::accumulator::{Accumulator, AnchorState, BucketFactory, DefaultBucketFactory};
use crate::aggregator::{AggregatorId, AggregatorSet, Window};
use crate::errors::HistoryError;

/// Fixed-duration bucket engine over a configured time horizon.
///
/// Time is a caller-defined unsigned counter (milliseconds in the sample
/// instantiation); the engine defines no epoch. Input times must be
/// non-decreasing: a decreasing time is rejected with
/// [`HistoryError::OutOfOrder`] and mutates nothing.
///
/// Edge policy: times before `begin_time` are treated as `begin_time`;
/// times past the horizon close out the final bucket, after which the
/// engine is frozen and every update returns the terminal index
/// (`bucket_count`) without further work. A timestamp exactly on a bucket
/// boundary belongs to the later bucket.
pub struct BucketHistory<A: Accumulator> {
    bucket_duration: u64,
    begin_time: u64,
    /// Last time unit inside the horizon (`end_time - 1`)
    last_time: u64,
    buckets: Vec<A>,
    /// Index of the bucket currently open
    current_bucket: usize,
    previous_time: Option<u64>,
    /// While false (after `stop`), time advances roll buckets but
    /// attribute no duration.
    active: bool,
    aggregators: AggregatorSet<A>,
}

impl<A: Accumulator> BucketHistory<A> {
    /// Create a history of `ceil((end_time - begin_time) / bucket_duration)`
    /// default-initialized buckets.
    pub fn new(bucket_duration: u64, begin_time: u64, end_time: u64) -> Result<Self, HistoryError> {
        Self::with_factory(bucket_duration, begin_time, end_time, &DefaultBucketFactory)
    }

    /// Create a history with buckets produced by `factory`.
    ///
    /// Fails with [`HistoryError::InvalidBucketConfig`] on a zero bucket
    /// duration or an empty horizon, and with
    /// [`HistoryError::FactoryCount`] if the factory produces the wrong
    /// number of buckets.
    pub fn with_factory<F: BucketFactory<A>>(
        bucket_duration: u64,
        begin_time: u64,
        end_time: u64,
        factory: &F,
    ) -> Result<Self, HistoryError> {
        if bucket_duration == 0 || end_time <= begin_time {
            return Err(HistoryError::InvalidBucketConfig {
                bucket_duration,
                begin_time,
                end_time,
            });
        }

        let bucket_count = (end_time - begin_time).div_ceil(bucket_duration) as usize;
        let buckets = factory.generate(bucket_count);
        if buckets.len() != bucket_count {
            return Err(HistoryError::FactoryCount {
                expected: bucket_count,
                produced: buckets.len(),
            });
        }

        debug!(bucket_count, bucket_duration, begin_time, end_time, "bucket history initialized");

        Ok(BucketHistory {
            bucket_duration,
            begin_time,
            last_time: end_time - 1,
            buckets,
            current_bucket: 0,
            previous_time: None,
            active: true,
            aggregators: AggregatorSet::new(),
        })
    }

    /// Register an aggregator over `window`; returns its handle.
    ///
    /// Window offsets are interpreted at bucket granularity. A window that
    /// does not span a full bucket is rejected with
    /// [`HistoryError::WindowTooNarrow`]: its far edge would pass a bucket
    /// its near edge never entered.
    pub fn add_aggregator(&mut self, window: Window) -> Result<AggregatorId, HistoryError> {
        if window.end_offset() / self.bucket_duration <= window.begin_offset() / self.bucket_duration
        {
            return Err(HistoryError::WindowTooNarrow {
                begin_offset: window.begin_offset(),
                end_offset: window.end_offset(),
                bucket_duration: self.bucket_duration,
            });
        }
        Ok(self.aggregators.insert(window))
    }

    /// Record one event: advance time to `current_time`, then apply
    /// `payload` (with the partial duration since the previous update) to
    /// the open bucket and to every real-time aggregator.
    ///
    /// Returns the index of the bucket the event landed in, or the terminal
    /// index once the horizon is exhausted (the event is then dropped).
    pub fn add_data(
        &mut self,
        current_time: u64,
        payload: &A::Payload,
    ) -> Result<usize, HistoryError> {
        self.advance(current_time, Some(payload))
    }

    /// Advance the clock without recording an event.
    ///
    /// Calling twice with the same time is a no-op on the second call.
    pub fn add_time(&mut self, current_time: u64) -> Result<usize, HistoryError> {
        self.advance(current_time, None)
    }

    /// Close out accumulation as of `current_time` and mark the series
    /// inactive: until the next [`BucketHistory::add_data`], time advances
    /// still roll buckets through aggregator windows but attribute no
    /// duration.
    pub fn stop(&mut self, current_time: u64) -> Result<usize, HistoryError> {
        let bucket = self.advance(current_time, None)?;
        self.active = false;
        Ok(bucket)
    }

    /// Zero every bucket and aggregator and rewind to the start of the
    /// horizon.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.reset();
        }
        self.aggregators.reset();
        self.current_bucket = 0;
        self.previous_time = None;
        self.active = true;
    }

    fn advance(
        &mut self,
        current_time: u64,
        payload: Option<&A::Payload>,
    ) -> Result<usize, HistoryError> {
        // Times before the horizon start count as its first instant.
        let mut current_time = current_time.max(self.begin_time);

        if let Some(previous) = self.previous_time {
            if current_time < previous {
                warn!(current_time, previous, "out of order input rejected");
                return Err(HistoryError::OutOfOrder {
                    previous,
                    current: current_time,
                });
            }
        }

        if self.current_bucket == self.buckets.len() {
            // Horizon exhausted; frozen.
            return Ok(self.buckets.len());
        }
        if current_time > self.last_time {
            current_time = self.last_time + 1;
        }

        let target_bucket = ((current_time - self.begin_time) / self.bucket_duration) as usize;
        let mut previous = self.previous_time.unwrap_or(self.begin_time);

        // Close out prior buckets.
        while target_bucket > self.current_bucket {
            let bucket_end =
                self.begin_time + (self.current_bucket as u64 + 1) * self.bucket_duration;

            if self.active {
                let elapsed = bucket_end - previous;
                self.buckets[self.current_bucket].add_duration(elapsed);
                self.aggregators
                    .for_each_real_time(|acc| acc.add_duration(elapsed));
            }

            self.aggregators.roll_closed_bucket(
                self.current_bucket,
                &self.buckets,
                self.bucket_duration,
            );

            previous = bucket_end;
            self.current_bucket += 1;
            if self.current_bucket == self.buckets.len() {
                self.previous_time = Some(previous);
                return Ok(self.buckets.len());
            }
        }

        // Partial interval into the open bucket.
        let partial = if self.active {
            current_time - previous
        } else {
            0
        };
        match payload {
            Some(payload) => {
                self.buckets[self.current_bucket].add_data(partial, payload, true);
                self.aggregators
                    .for_each_real_time(|acc| acc.add_data(partial, payload, true));
                self.active = true;
            }
            None => {
                if partial > 0 {
                    self.buckets[self.current_bucket].add_duration(partial);
                    self.aggregators
                        .for_each_real_time(|acc| acc.add_duration(partial));
                }
            }
        }

        self.previous_time = Some(current_time);
        Ok(self.current_bucket)
    }

    /// Number of buckets covering the horizon
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_duration(&self) -> u64 {
        self.bucket_duration
    }

    pub fn begin_time(&self) -> u64 {
        self.begin_time
    }

    pub fn end_time(&self) -> u64 {
        self.last_time + 1
    }

    /// Time of the most recent update, if any
    pub fn last_update_time(&self) -> Option<u64> {
        self.previous_time
    }

    /// Bucket index a time maps to, clamped to the horizon
    pub fn bucket_index_for_time(&self, time: u64) -> usize {
        if time < self.begin_time {
            return 0;
        }
        if time > self.last_time {
            return self.buckets.len() - 1;
        }
        ((time - self.begin_time) / self.bucket_duration) as usize
    }

    /// Read a bucket's accumulator
    pub fn bucket(&self, index: usize) -> Option<&A> {
        self.buckets.get(index)
    }

    /// Read an aggregator's accumulator
    pub fn aggregator(&self, id: AggregatorId) -> Option<&A> {
        self.aggregators.get(id).map(|slot| &slot.acc)
    }

    /// The window an aggregator was registered with
    pub fn window(&self, id: AggregatorId) -> Option<Window> {
        self.aggregators.get(id).map(|slot| slot.window)
    }
}

/// Bucket engine that carries the most recent payload across time.
///
/// Where [`BucketHistory`] attributes elapsed time as bare duration, this
/// engine attributes it *at the carried value*
/// (`add_data(elapsed, carried, fresh)`), `fresh` only on the carried
/// payload's first attribution, so the accumulator can count the observation
/// once and then keep weighting its value by the time it stays in effect.
pub struct TimeWeightedBucketHistory<A: Accumulator>
where
    A::Payload: Clone,
{
    bucket_duration: u64,
    begin_time: u64,
    last_time: u64,
    buckets: Vec<A>,
    current_bucket: usize,
    previous_time: Option<u64>,
    carried: Option<A::Payload>,
    carry_state: AnchorState,
    aggregators: AggregatorSet<A>,
}

impl<A: Accumulator> TimeWeightedBucketHistory<A>
where
    A::Payload: Clone,
{
    /// See [`BucketHistory::new`].
    pub fn new(bucket_duration: u64, begin_time: u64, end_time: u64) -> Result<Self, HistoryError> {
        Self::with_factory(bucket_duration, begin_time, end_time, &DefaultBucketFactory)
    }

    /// See [`BucketHistory::with_factory`].
    pub fn with_factory<F: BucketFactory<A>>(
        bucket_duration: u64,
        begin_time: u64,
        end_time: u64,
        factory: &F,
    ) -> Result<Self, HistoryError> {
        if bucket_duration == 0 || end_time <= begin_time {
            return Err(HistoryError::InvalidBucketConfig {
                bucket_duration,
                begin_time,
                end_time,
            });
        }

        let bucket_count = (end_time - begin_time).div_ceil(bucket_duration) as usize;
        let buckets = factory.generate(bucket_count);
        if buckets.len() != bucket_count {
            return Err(HistoryError::FactoryCount {
                expected: bucket_count,
                produced: buckets.len(),
            });
        }

        Ok(TimeWeightedBucketHistory {
            bucket_duration,
            begin_time,
            last_time: end_time - 1,
            buckets,
            current_bucket: 0,
            previous_time: None,
            carried: None,
            carry_state: AnchorState::Applied,
            aggregators: AggregatorSet::new(),
        })
    }

    /// See [`BucketHistory::add_aggregator`].
    pub fn add_aggregator(&mut self, window: Window) -> Result<AggregatorId, HistoryError> {
        if window.end_offset() / self.bucket_duration <= window.begin_offset() / self.bucket_duration
        {
            return Err(HistoryError::WindowTooNarrow {
                begin_offset: window.begin_offset(),
                end_offset: window.end_offset(),
                bucket_duration: self.bucket_duration,
            });
        }
        Ok(self.aggregators.insert(window))
    }

    /// Replace the carried payload as of `current_time`.
    ///
    /// The payload itself is not applied yet; it accrues over subsequent
    /// time advances, flagged fresh on its first attribution.
    pub fn add_data(
        &mut self,
        current_time: u64,
        payload: &A::Payload,
    ) -> Result<usize, HistoryError> {
        let bucket = self.advance(current_time)?;
        self.carried = Some(payload.clone());
        self.carry_state = AnchorState::Pending;
        Ok(bucket)
    }

    /// Advance the clock, attributing the elapsed interval at the carried
    /// value (no-op while nothing is carried).
    pub fn add_time(&mut self, current_time: u64) -> Result<usize, HistoryError> {
        self.advance(current_time)
    }

    /// Close out as of `current_time` and drop the carried payload; the
    /// quiet period until the next [`TimeWeightedBucketHistory::add_data`]
    /// accrues nothing.
    pub fn stop(&mut self, current_time: u64) -> Result<usize, HistoryError> {
        let bucket = self.advance(current_time)?;
        self.carried = None;
        self.carry_state = AnchorState::Applied;
        Ok(bucket)
    }

    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.reset();
        }
        self.aggregators.reset();
        self.current_bucket = 0;
        self.previous_time = None;
        self.carried = None;
        self.carry_state = AnchorState::Applied;
    }

    fn advance(&mut self, current_time: u64) -> Result<usize, HistoryError> {
        let mut current_time = current_time.max(self.begin_time);

        if let Some(previous) = self.previous_time {
            if current_time < previous {
                warn!(current_time, previous, "out of order input rejected");
                return Err(HistoryError::OutOfOrder {
                    previous,
                    current: current_time,
                });
            }
        }

        if self.current_bucket == self.buckets.len() {
            return Ok(self.buckets.len());
        }
        if current_time > self.last_time {
            current_time = self.last_time + 1;
        }

        let target_bucket = ((current_time - self.begin_time) / self.bucket_duration) as usize;
        let mut previous = self.previous_time.unwrap_or(self.begin_time);

        while target_bucket > self.current_bucket {
            let bucket_end =
                self.begin_time + (self.current_bucket as u64 + 1) * self.bucket_duration;

            if let Some(carried) = &self.carried {
                let elapsed = bucket_end - previous;
                let fresh = self.carry_state == AnchorState::Pending;
                self.buckets[self.current_bucket].add_data(elapsed, carried, fresh);
                self.aggregators
                    .for_each_real_time(|acc| acc.add_data(elapsed, carried, fresh));
                self.carry_state = AnchorState::Applied;
            }

            self.aggregators.roll_closed_bucket(
                self.current_bucket,
                &self.buckets,
                self.bucket_duration,
            );

            previous = bucket_end;
            self.current_bucket += 1;
            if self.current_bucket == self.buckets.len() {
                self.previous_time = Some(previous);
                return Ok(self.buckets.len());
            }
        }

        if let Some(carried) = &self.carried {
            let partial = current_time - previous;
            if partial > 0 {
                let fresh = self.carry_state == AnchorState::Pending;
                self.buckets[self.current_bucket].add_data(partial, carried, fresh);
                self.aggregators
                    .for_each_real_time(|acc| acc.add_data(partial, carried, fresh));
                self.carry_state = AnchorState::Applied;
            }
        }

        self.previous_time = Some(current_time);
        Ok(self.current_bucket)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_duration(&self) -> u64 {
        self.bucket_duration
    }

    pub fn begin_time(&self) -> u64 {
        self.begin_time
    }

    pub fn end_time(&self) -> u64 {
        self.last_time + 1
    }

    pub fn last_update_time(&self) -> Option<u64> {
        self.previous_time
    }

    pub fn bucket(&self, index: usize) -> Option<&A> {
        self.buckets.get(index)
    }

    pub fn aggregator(&self, id: AggregatorId) -> Option<&A> {
        self.aggregators.get(id).map(|slot| &slot.acc)
    }

    pub fn window(&self, id: AggregatorId) -> Option<Window> {
        self.aggregators.get(id).map(|slot| slot.window)
    }
}
