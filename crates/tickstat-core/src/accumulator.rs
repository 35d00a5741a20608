//! Accumulator capability interface and the bucket factory
//!
//! An accumulator is a mutable numeric summary of events over some span of
//! observed time. The history engines drive accumulators exclusively through
//! this trait: additively on the way into a window, subtractively on the way
//! out, so the state inside a window is always the exact difference of the
//! two passes.

use serde::{Deserialize, Serialize};

/// Mutable numeric summary of events over a span of observed time.
///
/// Implementations must keep `add_*` and `sub_*` exactly inverse and
/// `combine`/`uncombine` exactly inverse for the windowing arithmetic to
/// stay consistent (integer fields are exact; duration-weighted floating
/// accessors accept bounded drift).
///
/// The `fresh` flag distinguishes a brand-new observation from a
/// carry-forward of the previous value: event-counting fields move only on
/// `fresh` calls, duration-weighted fields accrue on every call.
pub trait Accumulator: Default {
    /// Payload type this accumulator knows how to interpret
    type Payload;

    /// Fold `duration` units of `payload` being in effect into the summary;
    /// `fresh` marks the payload's first contribution.
    fn add_data(&mut self, duration: u64, payload: &Self::Payload, fresh: bool);

    /// Exact inverse of [`Accumulator::add_data`]
    fn sub_data(&mut self, duration: u64, payload: &Self::Payload, fresh: bool);

    /// Attribute observed time with no associated payload
    fn add_duration(&mut self, duration: u64);

    /// Exact inverse of [`Accumulator::add_duration`]
    fn sub_duration(&mut self, duration: u64);

    /// Fold another accumulator of the same kind into this one (`+=`)
    fn combine(&mut self, other: &Self);

    /// Exact inverse of [`Accumulator::combine`] (`-=`)
    fn uncombine(&mut self, other: &Self);

    /// Total observed duration currently in the summary
    fn duration(&self) -> i64;

    /// Clear back to the empty state
    fn reset(&mut self);
}

/// Whether a carried payload (or cursor anchor) has already made its first,
/// `fresh`-flagged contribution. Explicit so the first-touch state machine
/// reads as what it is instead of a bare boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnchorState {
    /// Payload is in effect but has not contributed as a fresh observation yet
    Pending,
    /// The fresh contribution happened; further attributions carry the value
    Applied,
}

/// Allocates the contiguous bucket sequence for a [`BucketHistory`].
///
/// Supplied by the caller at construction; must produce exactly
/// `bucket_count` accumulators in their empty state.
///
/// [`BucketHistory`]: crate::bucket_history::BucketHistory
pub trait BucketFactory<A> {
    fn generate(&self, bucket_count: usize) -> Vec<A>;
}

/// Factory for accumulator kinds with a meaningful `Default`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBucketFactory;

impl<A: Default> BucketFactory<A> for DefaultBucketFactory {
    fn generate(&self, bucket_count: usize) -> Vec<A> {
        (0..bucket_count).map(|_| A::default()).collect()
    }
}

/// The simplest accumulator: observed duration plus a count of fresh events.
///
/// Payload-agnostic; useful as the tally half of richer summaries and as the
/// reference accumulator in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStats {
    duration: i64,
    count: i64,
}

impl CountStats {
    /// Number of fresh events currently inside the window
    pub fn count(&self) -> i64 {
        self.count
    }
}

impl Accumulator for CountStats {
    type Payload = ();

    fn add_data(&mut self, duration: u64, _payload: &(), fresh: bool) {
        self.duration += duration as i64;
        if fresh {
            self.count += 1;
        }
    }

    fn sub_data(&mut self, duration: u64, _payload: &(), fresh: bool) {
        self.duration -= duration as i64;
        if fresh {
            self.count -= 1;
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
        self.count += other.count;
    }

    fn uncombine(&mut self, other: &Self) {
        self.duration -= other.duration;
        self.count -= other.count;
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn reset(&mut self) {
        self.duration = 0;
        self.count = 0;
    }
}
