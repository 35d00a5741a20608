//! Exact sliding-window engine over raw timestamped events
//!
//! Where the bucket engine trades resolution for memory, [`TimedHistory`]
//! keeps the raw events (only for as long as the longest registered window
//! needs them) and moves each aggregator's window edges event by event. Every aggregator holds two cursors into the shared FIFO: `newest`
//! anchors the near edge, `oldest` the far edge. Advancing an edge folds
//! the anchored value in (or out) weighted by the time it was in effect,
//! and any residual time up to the edge is carried at the last known value,
//! so quiet periods are time-weighted instead of lost.

use smallvec::SmallVec;
use tracing::warn;

use crate::accumulator::{Accumulator, AnchorState};
use crate::aggregator::{AggregatorId, Window};
use crate::errors::HistoryError;
use crate::pool::{EventPool, FifoQueue, NodeId};

/// Payload contract for events entering a [`TimedHistory`]
pub trait TimedEvent {
    /// Event timestamp in the engine's time unit
    fn time(&self) -> u64;
}

/// How an edge flags crossed events to the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marking {
    /// Only a cursor's very first application is fresh; everything after is
    /// carried value.
    FirstTouch,
    /// Every newly-crossed event is fresh on its first contribution, so
    /// accumulators that count observations see each exactly once.
    EveryEvent,
}

/// Edge cursor into the shared event queue
#[derive(Debug, Clone, Copy)]
struct Cursor {
    anchor: Option<NodeId>,
    /// Time up to which the anchor's value has been attributed
    time: u64,
    state: AnchorState,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor {
            anchor: None,
            time: 0,
            state: AnchorState::Pending,
        }
    }
}

struct TimedSlot<A> {
    window: Window,
    marking: Marking,
    acc: A,
    update_time: u64,
    newest: Cursor,
    oldest: Cursor,
}

/// Exact sliding-window engine: a shared event FIFO plus per-window
/// cursor-tracking aggregators.
///
/// Events are recycled through an owned pool once no window (and no cursor)
/// can reference them; the most recently evicted event is retained one
/// extra step as [`TimedHistory::previous_event`] because it may still
/// anchor the far edge of the widest window.
pub struct TimedHistory<E: TimedEvent, A: Accumulator<Payload = E>> {
    pool: EventPool<E>,
    queue: FifoQueue,
    previous_event: Option<NodeId>,
    slots: Vec<TimedSlot<A>>,
    /// Ascending `begin_offset`, real-time aggregators first
    ordered: SmallVec<[AggregatorId; 8]>,
    /// Max `end_offset` across aggregators: the retention horizon
    maximum_duration: u64,
    last_time: Option<u64>,
}

impl<E: TimedEvent, A: Accumulator<Payload = E>> Default for TimedHistory<E, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TimedEvent, A: Accumulator<Payload = E>> TimedHistory<E, A> {
    pub fn new() -> Self {
        TimedHistory {
            pool: EventPool::new(),
            queue: FifoQueue::new(),
            previous_event: None,
            slots: Vec::new(),
            ordered: SmallVec::new(),
            maximum_duration: 0,
            last_time: None,
        }
    }

    /// Pre-size the event pool for an expected live-window population.
    pub fn with_event_capacity(capacity: usize) -> Self {
        TimedHistory {
            pool: EventPool::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Register an aggregator over `window`; the cursor's first value is
    /// applied once as fresh, later contributions are carried value.
    pub fn add_aggregator(&mut self, window: Window) -> AggregatorId {
        self.insert(window, Marking::FirstTouch)
    }

    /// Register a time-weighting aggregator over `window`: every
    /// newly-crossed event is flagged fresh on its first contribution, for
    /// accumulators that must distinguish a new observation from the
    /// previous value carried forward (quote counting).
    pub fn add_time_weighted_aggregator(&mut self, window: Window) -> AggregatorId {
        self.insert(window, Marking::EveryEvent)
    }

    fn insert(&mut self, window: Window, marking: Marking) -> AggregatorId {
        let id = AggregatorId(self.slots.len());
        self.slots.push(TimedSlot {
            window,
            marking,
            acc: A::default(),
            update_time: 0,
            newest: Cursor::default(),
            oldest: Cursor::default(),
        });
        let pos = self
            .ordered
            .iter()
            .position(|other| self.slots[other.0].window.begin_offset() > window.begin_offset())
            .unwrap_or(self.ordered.len());
        self.ordered.insert(pos, id);
        self.maximum_duration = self.maximum_duration.max(window.end_offset());
        id
    }

    /// Record one event at `current_time`: the event joins the front of the
    /// shared queue, then time advances as in [`TimedHistory::add_time`].
    pub fn add_data(&mut self, current_time: u64, event: E) -> Result<(), HistoryError> {
        if let Some(previous) = self.last_time {
            if current_time < previous {
                warn!(current_time, previous, "out of order input rejected");
                return Err(HistoryError::OutOfOrder {
                    previous,
                    current: current_time,
                });
            }
        }
        let id = self.pool.insert(event);
        self.queue.push_front(&mut self.pool, id);
        self.add_time(current_time)
    }

    /// Advance every aggregator's window edges to `current_time`, then
    /// evict events no aggregator can reference anymore.
    pub fn add_time(&mut self, current_time: u64) -> Result<(), HistoryError> {
        if let Some(previous) = self.last_time {
            if current_time < previous {
                warn!(current_time, previous, "out of order input rejected");
                return Err(HistoryError::OutOfOrder {
                    previous,
                    current: current_time,
                });
            }
        }
        self.last_time = Some(current_time);

        for idx in 0..self.ordered.len() {
            let id = self.ordered[idx];
            let slot = &mut self.slots[id.0];
            advance_slot(slot, &self.pool, &self.queue, current_time);
        }

        self.evict(current_time);
        Ok(())
    }

    /// Pop events older than the retention horizon off the back of the
    /// queue. The newest event is never dropped (it carries the last known
    /// value), and the most recent eviction is retained as
    /// `previous_event` until superseded: the widest window's far-edge
    /// cursor may still be parked on it.
    fn evict(&mut self, current_time: u64) {
        while let Some(back) = self.queue.back() {
            let Some(event) = self.pool.get(back) else {
                debug_assert!(false, "queue back points at a free slot");
                break;
            };
            let Some(age) = current_time.checked_sub(event.time()) else {
                break;
            };
            if age <= self.maximum_duration {
                break;
            }
            let Some(id) = self.queue.pop_back(&mut self.pool) else {
                break;
            };
            if self.queue.is_empty() {
                self.queue.push_front(&mut self.pool, id);
                break;
            }
            if let Some(superseded) = self.previous_event.replace(id) {
                self.pool.remove(superseded);
            }
        }
    }

    /// Drain all events back to the pool and clear every aggregator.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.acc.reset();
            slot.update_time = 0;
            slot.newest = Cursor::default();
            slot.oldest = Cursor::default();
        }
        while let Some(id) = self.queue.pop_back(&mut self.pool) {
            self.pool.remove(id);
        }
        if let Some(id) = self.previous_event.take() {
            self.pool.remove(id);
        }
        self.last_time = None;
    }

    /// Read an aggregator's accumulator
    pub fn aggregator(&self, id: AggregatorId) -> Option<&A> {
        self.slots.get(id.0).map(|slot| &slot.acc)
    }

    /// The window an aggregator was registered with
    pub fn window(&self, id: AggregatorId) -> Option<Window> {
        self.slots.get(id.0).map(|slot| slot.window)
    }

    /// Events currently in the shared queue
    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    /// The most recently evicted event, retained while the widest window's
    /// far edge may still be anchored on it
    pub fn previous_event(&self) -> Option<&E> {
        self.previous_event.and_then(|id| self.pool.get(id))
    }

    /// Retention horizon: the largest `end_offset` across aggregators
    pub fn maximum_duration(&self) -> u64 {
        self.maximum_duration
    }

    /// Total event slots ever allocated by the owned pool (live + free)
    pub fn event_capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Time of the most recent update, if any
    pub fn last_update_time(&self) -> Option<u64> {
        self.last_time
    }
}

fn advance_slot<E: TimedEvent, A: Accumulator<Payload = E>>(
    slot: &mut TimedSlot<A>,
    pool: &EventPool<E>,
    queue: &FifoQueue,
    current_time: u64,
) {
    if current_time > slot.update_time {
        slot.update_time = current_time;
    }

    // Seed both cursors at the oldest live event.
    if slot.newest.anchor.is_none() {
        let Some(back) = queue.back() else { return };
        let Some(event) = pool.get(back) else { return };
        let seeded = Cursor {
            anchor: Some(back),
            time: event.time(),
            state: AnchorState::Pending,
        };
        slot.newest = seeded;
        slot.oldest = seeded;
    }

    // Near edge folds values in...
    if let Some(edge) = slot.update_time.checked_sub(slot.window.begin_offset()) {
        advance_edge::<E, A, AddSide>(&mut slot.newest, &mut slot.acc, pool, queue, edge, slot.marking);
    }
    // ...the far edge folds them back out.
    if let Some(edge) = slot.update_time.checked_sub(slot.window.end_offset()) {
        advance_edge::<E, A, SubSide>(&mut slot.oldest, &mut slot.acc, pool, queue, edge, slot.marking);
    }
}

/// Add/subtract polarity of an edge, so both edges share one advance.
trait EdgeSide {
    fn data<A: Accumulator>(acc: &mut A, duration: u64, payload: &A::Payload, fresh: bool);
    fn duration<A: Accumulator>(acc: &mut A, duration: u64);
}

struct AddSide;
struct SubSide;

impl EdgeSide for AddSide {
    fn data<A: Accumulator>(acc: &mut A, duration: u64, payload: &A::Payload, fresh: bool) {
        acc.add_data(duration, payload, fresh);
    }
    fn duration<A: Accumulator>(acc: &mut A, duration: u64) {
        acc.add_duration(duration);
    }
}

impl EdgeSide for SubSide {
    fn data<A: Accumulator>(acc: &mut A, duration: u64, payload: &A::Payload, fresh: bool) {
        acc.sub_data(duration, payload, fresh);
    }
    fn duration<A: Accumulator>(acc: &mut A, duration: u64) {
        acc.sub_duration(duration);
    }
}

/// Move one edge cursor forward to `edge`.
///
/// Crossing an event attributes the gap since the previous anchor time at
/// the *anchored* (in-effect) value; the crossed event then becomes the
/// anchor. Residual time between the last anchor and the edge is carried at
/// the anchored value.
fn advance_edge<E: TimedEvent, A: Accumulator<Payload = E>, S: EdgeSide>(
    cursor: &mut Cursor,
    acc: &mut A,
    pool: &EventPool<E>,
    queue: &FifoQueue,
    edge: u64,
    marking: Marking,
) {
    let Some(mut anchor) = cursor.anchor else {
        return;
    };

    while let Some(next) = queue.newer(pool, anchor) {
        let Some(event) = pool.get(next) else {
            debug_assert!(false, "cursor successor points at a free slot");
            break;
        };
        if event.time() > edge {
            break;
        }
        let gap = event.time().saturating_sub(cursor.time);
        if let Some(anchored) = pool.get(anchor) {
            match marking {
                Marking::FirstTouch => {
                    if cursor.state == AnchorState::Pending {
                        S::data(acc, 0, anchored, true);
                        cursor.state = AnchorState::Applied;
                    }
                    if gap > 0 {
                        S::data(acc, gap, anchored, false);
                    }
                }
                Marking::EveryEvent => {
                    S::data(acc, gap, anchored, cursor.state == AnchorState::Pending);
                    cursor.state = AnchorState::Pending;
                }
            }
        } else {
            debug_assert!(false, "cursor anchor points at a free slot");
        }
        anchor = next;
        cursor.time = cursor.time.max(event.time());
    }

    if edge > cursor.time {
        let residual = edge - cursor.time;
        if let Some(anchored) = pool.get(anchor) {
            match marking {
                Marking::FirstTouch => {
                    if cursor.state == AnchorState::Pending {
                        S::data(acc, residual, anchored, true);
                        cursor.state = AnchorState::Applied;
                    } else {
                        S::duration(acc, residual);
                    }
                }
                Marking::EveryEvent => {
                    S::data(acc, residual, anchored, cursor.state == AnchorState::Pending);
                    cursor.state = AnchorState::Applied;
                }
            }
        } else {
            debug_assert!(false, "cursor anchor points at a free slot");
        }
        cursor.time = edge;
    }

    cursor.anchor = Some(anchor);
}
