//! Behavioral tests for the exact sliding-window engine over quotes and
//! trades: time-weighted means, per-window eviction, and event recycling.

use tickstat_core::test_utils::{quote, quote_around, trade_at};
use tickstat_core::{
    Accumulator, FixedPoint, HistoryError, QuoteData, QuoteStats, TimedHistory, TradeData,
    TradeStats, Window,
};

#[test]
fn quote_window_reflects_values_weighted_by_time_in_effect() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    let agg = history.add_time_weighted_aggregator(Window::new(0, 5).unwrap());

    history.add_data(1, quote_around(1, "10.5", 10)).unwrap();
    history.add_data(3, quote_around(3, "20.5", 10)).unwrap();
    history.add_data(8, quote_around(8, "30.5", 10)).unwrap();

    // Window (3, 8]: the t=1 quote (in effect 1..3) has been folded back
    // out; the t=3 quote was in effect for all 5 remaining units.
    let stats = history.aggregator(agg).unwrap();
    assert_eq!(stats.duration(), 5);
    assert_eq!(stats.mean_bid(), FixedPoint::from_str("20").unwrap());
    assert_eq!(stats.mean_ask(), FixedPoint::from_str("21").unwrap());
}

#[test]
fn nested_windows_see_different_spans_of_the_same_stream() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    let short = history.add_time_weighted_aggregator(Window::new(0, 10).unwrap());
    let long = history.add_time_weighted_aggregator(Window::new(0, 100).unwrap());

    history.add_data(0, quote(0, "100", 10, "101", 10)).unwrap();
    history.add_data(20, quote(20, "200", 10, "201", 10)).unwrap();
    history.add_time(25).unwrap();

    // Short window (15, 25]: 100 in effect 15..20, 200 in effect 20..25.
    let stats = history.aggregator(short).unwrap();
    assert_eq!(stats.duration(), 10);
    assert_eq!(stats.mean_bid(), FixedPoint::from_str("150").unwrap());

    // Long window still contains everything since t=0.
    let stats = history.aggregator(long).unwrap();
    assert_eq!(stats.duration(), 25);
    // 100 for 20 units, 200 for 5: (100*20 + 200*5) / 25 = 120
    assert_eq!(stats.mean_bid(), FixedPoint::from_str("120").unwrap());
    assert_eq!(stats.quotes(), 2);
}

#[test]
fn events_outlive_short_windows_while_a_wider_window_needs_them() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    history.add_time_weighted_aggregator(Window::new(0, 5).unwrap());
    history.add_time_weighted_aggregator(Window::new(0, 60).unwrap());
    assert_eq!(history.maximum_duration(), 60);

    history.add_data(0, quote_around(0, "100", 10)).unwrap();
    history.add_data(10, quote_around(10, "101", 10)).unwrap();

    // Far beyond the short window, inside the wide one: both events stay.
    history.add_time(50).unwrap();
    assert_eq!(history.queued_events(), 2);

    // Past the wide window too: the t=0 quote is finally evicted.
    history.add_time(65).unwrap();
    assert_eq!(history.queued_events(), 1);
}

#[test]
fn eviction_boundary_is_exactly_the_maximum_duration() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    let agg = history.add_time_weighted_aggregator(Window::new(0, 5).unwrap());

    history.add_data(0, quote_around(0, "100", 10)).unwrap();
    history.add_data(3, quote_around(3, "102", 10)).unwrap();

    // Exactly maximum_duration old: still queued, still anchoring.
    history.add_time(5).unwrap();
    assert_eq!(history.queued_events(), 2);
    // Window (0, 5]: bid 99.5 in effect 0..3, bid 101.5 in effect 3..5:
    // (99.5*3 + 101.5*2) / 5 = 100.3
    let stats = history.aggregator(agg).unwrap();
    assert_eq!(stats.duration(), 5);
    assert_eq!(stats.mean_bid(), FixedPoint::from_str("100.3").unwrap());

    // One unit older: evicted from the queue, retained one step as the
    // previous event for far-edge offset math.
    history.add_time(6).unwrap();
    assert_eq!(history.queued_events(), 1);
    assert_eq!(history.previous_event().map(|q| q.time), Some(0));
}

#[test]
fn trade_flow_over_an_exact_window() {
    let mut history: TimedHistory<TradeData, TradeStats> = TimedHistory::new();
    let agg = history.add_time_weighted_aggregator(Window::new(0, 100).unwrap());

    history.add_data(10, trade_at(10, "100", 10)).unwrap();
    history.add_data(40, trade_at(40, "110", 30)).unwrap();
    history.add_time(50).unwrap();

    let stats = history.aggregator(agg).unwrap();
    assert_eq!(stats.trades(), 2);
    assert_eq!(stats.volume(), 40);
    // (100*10 + 110*30) / 40 = 107.5
    assert_eq!(stats.vwap(), FixedPoint::from_str("107.5").unwrap());

    // Once the t=10 print ages past the window, the flow follows.
    history.add_time(111).unwrap();
    let stats = history.aggregator(agg).unwrap();
    assert_eq!(stats.trades(), 1);
    assert_eq!(stats.volume(), 30);
}

#[test]
fn add_time_is_idempotent_at_the_same_instant() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    let agg = history.add_time_weighted_aggregator(Window::new(0, 20).unwrap());

    history.add_data(2, quote_around(2, "100", 10)).unwrap();
    history.add_time(9).unwrap();
    let once = *history.aggregator(agg).unwrap();
    history.add_time(9).unwrap();
    assert_eq!(history.aggregator(agg).unwrap(), &once);
}

#[test]
fn out_of_order_event_is_rejected_and_not_queued() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    history.add_time_weighted_aggregator(Window::new(0, 10).unwrap());

    history.add_data(8, quote_around(8, "100", 10)).unwrap();
    let err = history.add_data(7, quote_around(7, "90", 10)).unwrap_err();
    assert_eq!(
        err,
        HistoryError::OutOfOrder {
            previous: 8,
            current: 7
        }
    );
    assert_eq!(history.queued_events(), 1);
    assert_eq!(history.last_update_time(), Some(8));
}

#[test]
fn pool_capacity_plateaus_under_sustained_ingestion() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    history.add_time_weighted_aggregator(Window::new(0, 10).unwrap());

    for t in 0..100u64 {
        history
            .add_data(t, quote_around(t, "100.5", 10))
            .unwrap();
    }
    let plateau = history.event_capacity();

    for t in 100..1_000u64 {
        history
            .add_data(t, quote_around(t, "100.5", 10))
            .unwrap();
    }
    // Every event beyond the retention horizon was recycled, not leaked.
    assert_eq!(history.event_capacity(), plateau);
}

#[test]
fn reset_returns_the_engine_to_its_initial_state() {
    let mut history: TimedHistory<QuoteData, QuoteStats> = TimedHistory::new();
    let agg = history.add_time_weighted_aggregator(Window::new(0, 30).unwrap());

    for t in 0..20u64 {
        history.add_data(t, quote_around(t, "100.5", 10)).unwrap();
    }
    history.reset();

    assert_eq!(history.queued_events(), 0);
    assert!(history.previous_event().is_none());
    assert_eq!(history.last_update_time(), None);
    assert_eq!(history.aggregator(agg).unwrap(), &QuoteStats::default());

    // Time may restart from zero after a reset.
    history.add_data(0, quote_around(0, "50.5", 4)).unwrap();
    history.add_time(10).unwrap();
    assert_eq!(
        history.aggregator(agg).unwrap().mean_bid(),
        FixedPoint::from_str("50").unwrap()
    );
}
