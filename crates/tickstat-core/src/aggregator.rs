//! Windows, aggregator handles and the offset-ordered registry
//!
//! Aggregators live in a push-only arena addressed by [`AggregatorId`]
//! handles; a separate index vector keeps them sorted ascending by
//! `begin_offset`. Real-time aggregators (offset zero) therefore come
//! first, which lets the per-event pass stop at the first windowed
//! aggregator instead of scanning the whole registry.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::accumulator::Accumulator;
use crate::errors::HistoryError;

/// Historical span `[begin_offset, end_offset)` measured backward from "now".
///
/// `begin_offset == 0` designates a real-time window whose near edge is the
/// current moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    begin_offset: u64,
    end_offset: u64,
}

impl Window {
    /// Validating constructor; rejects empty or inverted spans.
    pub fn new(begin_offset: u64, end_offset: u64) -> Result<Self, HistoryError> {
        if begin_offset >= end_offset {
            return Err(HistoryError::InvalidWindow {
                begin_offset,
                end_offset,
            });
        }
        Ok(Window {
            begin_offset,
            end_offset,
        })
    }

    /// Distance from "now" to the window's near edge
    pub fn begin_offset(&self) -> u64 {
        self.begin_offset
    }

    /// Distance from "now" to the window's far edge (exclusive)
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Whether the near edge is "now"
    pub fn is_real_time(&self) -> bool {
        self.begin_offset == 0
    }
}

/// Stable handle to an aggregator registered with a history engine.
///
/// Handles are engine-scoped: an id minted by one history must not be used
/// with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregatorId(pub(crate) usize);

pub(crate) struct AggregatorSlot<A> {
    pub(crate) window: Window,
    pub(crate) acc: A,
}

/// Arena of aggregator slots plus the offset-ascending iteration order.
pub(crate) struct AggregatorSet<A> {
    slots: Vec<AggregatorSlot<A>>,
    ordered: SmallVec<[AggregatorId; 8]>,
}

impl<A: Accumulator> AggregatorSet<A> {
    pub(crate) fn new() -> Self {
        AggregatorSet {
            slots: Vec::new(),
            ordered: SmallVec::new(),
        }
    }

    /// Insert keeping `ordered` sorted ascending by `begin_offset`.
    pub(crate) fn insert(&mut self, window: Window) -> AggregatorId {
        let id = AggregatorId(self.slots.len());
        self.slots.push(AggregatorSlot {
            window,
            acc: A::default(),
        });
        let pos = self
            .ordered
            .iter()
            .position(|other| self.slots[other.0].window.begin_offset() > window.begin_offset())
            .unwrap_or(self.ordered.len());
        self.ordered.insert(pos, id);
        id
    }

    pub(crate) fn get(&self, id: AggregatorId) -> Option<&AggregatorSlot<A>> {
        self.slots.get(id.0)
    }

    /// Iteration order: ascending `begin_offset`, real-time slots first.
    #[cfg(test)]
    pub(crate) fn ordered_ids(&self) -> impl Iterator<Item = AggregatorId> + '_ {
        self.ordered.iter().copied()
    }

    /// Apply `f` to every real-time slot; stops at the first windowed slot.
    pub(crate) fn for_each_real_time(&mut self, mut f: impl FnMut(&mut A)) {
        for idx in 0..self.ordered.len() {
            let id = self.ordered[idx];
            let slot = &mut self.slots[id.0];
            if !slot.window.is_real_time() {
                break;
            }
            f(&mut slot.acc);
        }
    }

    /// Roll a just-closed bucket through every window: combine it into
    /// aggregators whose near edge has reached it, uncombine the bucket
    /// that each window's far edge has passed.
    ///
    /// Offsets are divided down to bucket granularity. The ascending order
    /// makes the first near-edge miss a valid early exit: every later
    /// window's near edge is at least as far back.
    pub(crate) fn roll_closed_bucket(&mut self, closed: usize, buckets: &[A], bucket_duration: u64) {
        for idx in 0..self.ordered.len() {
            let id = self.ordered[idx];
            let slot = &mut self.slots[id.0];

            let begin = slot.window.begin_offset();
            if begin > 0 {
                let enter_offset = (begin / bucket_duration) as usize;
                if enter_offset > closed {
                    break;
                }
                slot.acc.combine(&buckets[closed - enter_offset]);
            }

            let leave_offset =
                ((slot.window.end_offset() / bucket_duration) as usize).saturating_sub(1);
            if closed >= leave_offset {
                slot.acc.uncombine(&buckets[closed - leave_offset]);
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.acc.reset();
        }
    }
}
