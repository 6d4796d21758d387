use std::sync::Arc;

use super::*;
use crate::catalog::model::{ChannelCounts, ClipView, LoadedClip};
use crate::timeline::compositor::NullSink;
use crate::timeline::span::Span;

fn view(id: &str, duration: u64) -> ClipView {
    ClipView::full(Arc::new(LoadedClip {
        id: id.to_string(),
        name: id.to_string(),
        category: "idle".to_string(),
        duration_frames: duration,
        looped: false,
        loop_transition: false,
        transition_frames: 30,
        weight: 1.0,
        channels: ChannelCounts { bone: 4, morph: 0 },
    }))
}

fn comp() -> TimelineCompositor {
    TimelineCompositor::new(Box::new(NullSink), FrameIndex(1000))
}

#[test]
fn mid_flight_span_gets_a_crossfade_tail() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let id = c.add(Span::new(view("a", 200), FrameIndex(100))).unwrap();

    // Position 50 of 200, 30-frame window.
    let report = retire_spans(&mut c, &[id], FrameIndex(150), 30, 5, &mut removals);
    assert_eq!(report.eased_out, 1);
    assert_eq!(report.removed_now, 0);
    assert_eq!(report.latest_end, Some(FrameIndex(180)));

    let span = c.span(id).unwrap();
    assert!(span.retiring);
    assert_eq!(span.truncated_end, Some(80));
    assert_eq!(span.tail_hold, 0);
    assert_eq!(span.ease_out, Some(EaseWindow::crossfade(30)));

    // Full weight where the tail begins, zero by its last frame.
    assert!((span.weight_at(FrameIndex(150)) - 1.0).abs() < 1e-12);
    let mid = span.weight_at(FrameIndex(165));
    assert!(mid > 0.0 && mid < 1.0);
    assert_eq!(span.weight_at(FrameIndex(179)), 0.0);

    // Removal waits for the projected end plus the margin.
    assert!(removals.drain_due(FrameIndex(184)).is_empty());
    assert_eq!(removals.drain_due(FrameIndex(185)), vec![id]);
}

#[test]
fn retiring_span_is_never_chained_into_a_second_blend() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let id = c.add(Span::new(view("a", 200), FrameIndex(0))).unwrap();

    retire_spans(&mut c, &[id], FrameIndex(50), 30, 5, &mut removals);
    assert!(c.span(id).unwrap().retiring);

    // A second switch lands before the tail finishes.
    let report = retire_spans(&mut c, &[id], FrameIndex(60), 30, 5, &mut removals);
    assert_eq!(report.eased_out, 0);
    assert_eq!(report.removed_now, 1);
    assert!(c.span(id).is_none());
}

#[test]
fn future_and_finished_spans_are_dropped_on_the_spot() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let future = c.add(Span::new(view("a", 90), FrameIndex(500))).unwrap();
    let finished = c.add(Span::new(view("b", 50), FrameIndex(0))).unwrap();

    let report = retire_spans(
        &mut c,
        &[future, finished],
        FrameIndex(100),
        30,
        5,
        &mut removals,
    );
    assert_eq!(report.removed_now, 2);
    assert_eq!(report.eased_out, 0);
    assert_eq!(report.latest_end, None);
    assert!(c.span(future).is_none());
    assert!(c.span(finished).is_none());
    assert!(removals.is_empty());
}

#[test]
fn tail_never_extends_past_the_natural_end() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let id = c.add(Span::new(view("a", 60), FrameIndex(0))).unwrap();

    // Only 5 frames remain; the fade covers exactly those.
    let report = retire_spans(&mut c, &[id], FrameIndex(55), 30, 5, &mut removals);
    assert_eq!(report.latest_end, Some(FrameIndex(60)));

    let span = c.span(id).unwrap();
    assert_eq!(span.truncated_end, Some(60));
    assert_eq!(span.ease_out, Some(EaseWindow::crossfade(5)));
}

#[test]
fn overlay_hold_is_trimmed_not_extended() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let id = c
        .add(Span::new(view("face", 60), FrameIndex(0)).with_tail_hold(40))
        .unwrap();

    // Cut lands inside the hold: clip material is untouched, the hold shrinks.
    let report = retire_spans(&mut c, &[id], FrameIndex(50), 30, 5, &mut removals);
    assert_eq!(report.eased_out, 1);

    let span = c.span(id).unwrap();
    assert_eq!(span.truncated_end, None);
    assert_eq!(span.tail_hold, 20);
    assert_eq!(span.len_frames(), 80);
    assert_eq!(span.ease_out, Some(EaseWindow::crossfade(30)));
}

#[test]
fn zero_window_cuts_hard_at_the_current_position() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let played = c.add(Span::new(view("a", 90), FrameIndex(0))).unwrap();
    let untouched = c.add(Span::new(view("b", 90), FrameIndex(40))).unwrap();

    let report = retire_spans(
        &mut c,
        &[played, untouched],
        FrameIndex(40),
        0,
        5,
        &mut removals,
    );
    // 40 frames in: truncate there, no fade to shape.
    let span = c.span(played).unwrap();
    assert_eq!(span.truncated_end, Some(40));
    assert_eq!(span.ease_out, None);
    assert_eq!(span.weight_at(FrameIndex(40)), 0.0);
    // Started this very frame: nothing played, dropped outright.
    assert!(c.span(untouched).is_none());
    assert_eq!(report.eased_out, 1);
    assert_eq!(report.removed_now, 1);
}

#[test]
fn removal_deadline_tracks_the_latest_end_across_spans() {
    let mut c = comp();
    let mut removals = RemovalQueue::new();
    let early = c.add(Span::new(view("a", 100), FrameIndex(0))).unwrap();
    let late = c.add(Span::new(view("a", 100), FrameIndex(90))).unwrap();

    let report = retire_spans(&mut c, &[early, late], FrameIndex(95), 30, 5, &mut removals);
    assert_eq!(report.eased_out, 2);
    // early caps at its natural end 100, late reaches 95 + 30 = 125.
    assert_eq!(report.latest_end, Some(FrameIndex(125)));

    // One batch, removed together once the later tail has played out.
    assert!(removals.drain_due(FrameIndex(129)).is_empty());
    let due = removals.drain_due(FrameIndex(130));
    assert_eq!(due.len(), 2);
    assert!(due.contains(&early) && due.contains(&late));
}

#[test]
fn removal_queue_drains_in_deadline_order() {
    let mut q = RemovalQueue::new();
    q.schedule(FrameIndex(20), vec![SpanId(2)]);
    q.schedule(FrameIndex(10), vec![SpanId(1)]);
    q.schedule(FrameIndex(10), vec![SpanId(3)]);
    q.schedule(FrameIndex(30), Vec::new());
    assert_eq!(q.len(), 3);

    assert_eq!(q.drain_due(FrameIndex(9)), Vec::<SpanId>::new());
    assert_eq!(q.drain_due(FrameIndex(15)), vec![SpanId(1), SpanId(3)]);
    assert_eq!(q.drain_due(FrameIndex(1000)), vec![SpanId(2)]);
    assert!(q.is_empty());
}

#[test]
fn take_all_supersedes_every_deadline() {
    let mut q = RemovalQueue::new();
    q.schedule(FrameIndex(10), vec![SpanId(1)]);
    q.schedule(FrameIndex(500), vec![SpanId(2)]);

    let all = q.take_all();
    assert_eq!(all, vec![SpanId(1), SpanId(2)]);
    assert!(q.is_empty());
    assert!(q.drain_due(FrameIndex(1000)).is_empty());
}
