use super::*;
use crate::catalog::model::ChannelCounts;

fn clip(id: &str, duration: u64, loop_transition: bool, transition: u64) -> Arc<LoadedClip> {
    Arc::new(LoadedClip {
        id: id.to_string(),
        name: id.to_string(),
        category: "speech_body".to_string(),
        duration_frames: duration,
        looped: false,
        loop_transition,
        transition_frames: transition,
        weight: 1.0,
        channels: ChannelCounts { bone: 40, morph: 0 },
    })
}

fn primary(id: &str, duration: u64, transition: u64) -> Arc<LoadedClip> {
    Arc::new(LoadedClip {
        id: id.to_string(),
        name: id.to_string(),
        category: "transient".to_string(),
        duration_frames: duration,
        looped: false,
        loop_transition: false,
        transition_frames: transition,
        weight: 1.0,
        channels: ChannelCounts { bone: 0, morph: 24 },
    })
}

#[test]
fn rejects_empty_pool_and_zero_duration() {
    let mut rng = Rng64::new(1);
    let err = stitch_segments(&[], 100, &mut rng).unwrap_err().to_string();
    assert!(err.contains("pool is empty"), "{err}");

    let pool = vec![clip("a", 80, false, 30)];
    let err = stitch_segments(&pool, 0, &mut rng).unwrap_err().to_string();
    assert!(err.contains("must be > 0"), "{err}");
}

#[test]
fn single_clip_pool_without_loop_blend_butts_segments_exactly() {
    let pool = vec![clip("a", 80, false, 30)];
    let mut rng = Rng64::new(5);
    let segs = stitch_segments(&pool, 200, &mut rng).unwrap();

    assert_eq!(segs.len(), 3);
    assert_eq!((segs[0].start_frame, segs[0].played_duration), (0, 80));
    assert_eq!((segs[1].start_frame, segs[1].played_duration), (80, 80));
    assert_eq!((segs[2].start_frame, segs[2].played_duration), (160, 40));
    assert!(!segs[0].truncated && !segs[1].truncated);
    assert!(segs[2].truncated);
    assert_eq!(segs[2].end_frame(), 200);

    assert_eq!(segs[0].previous_clip_id, None);
    assert_eq!(segs[1].previous_clip_id.as_deref(), Some("a"));
}

#[test]
fn loop_blend_clip_overlaps_following_segments() {
    // Same clip back to back with loop_transition overlaps by its window,
    // applied to the advance after the second segment onward.
    let pool = vec![clip("a", 80, true, 30)];
    let mut rng = Rng64::new(5);
    let segs = stitch_segments(&pool, 200, &mut rng).unwrap();

    assert_eq!(segs.len(), 3);
    assert_eq!(segs[0].start_frame, 0);
    assert_eq!(segs[1].start_frame, 80, "first advance is never shortened");
    assert_eq!(segs[2].start_frame, 130, "second advance overlaps by 30");
    assert!(segs[2].truncated);
    assert_eq!(segs[2].end_frame(), 200);
}

#[test]
fn coverage_is_exact_for_any_pick_sequence() {
    let pool = vec![clip("short", 80, false, 30), clip("long", 150, false, 20)];
    for seed in 0..40 {
        let mut rng = Rng64::new(seed);
        let segs = stitch_segments(&pool, 200, &mut rng).unwrap();

        assert_eq!(segs.last().unwrap().end_frame(), 200, "seed {seed}");
        assert_eq!(segs[0].start_frame, 0);
        for pair in segs.windows(2) {
            assert!(pair[0].start_frame < pair[1].start_frame, "seed {seed}");
            assert!(!pair[0].truncated, "only the final segment may truncate");
            assert_eq!(
                pair[0].played_duration, pair[0].clip.duration_frames,
                "non-final segments play in full (seed {seed})"
            );
        }

        // Two-segment outcomes pin down the exact truncation arithmetic.
        if segs.len() == 2 && segs[0].clip.id == "short" {
            assert!(segs[1].truncated);
            assert_eq!(segs[1].clip.id, "long");
            assert_eq!(segs[1].start_frame, 80);
            assert_eq!(segs[1].played_duration, 120);
        }
        if segs.len() == 2 && segs[0].clip.id == "long" {
            assert!(segs[1].truncated);
            assert_eq!(segs[1].start_frame, 150);
            assert_eq!(segs[1].played_duration, 50);
        }
    }
}

#[test]
fn termination_when_truncated_tail_is_shorter_than_the_window() {
    // Remaining tail of 5 frames against an 80-frame clip with a 30-frame
    // window: the truncated segment ends the stitch outright.
    let pool = vec![clip("a", 80, true, 30)];
    let mut rng = Rng64::new(9);
    let segs = stitch_segments(&pool, 85, &mut rng).unwrap();
    assert_eq!(segs.last().unwrap().end_frame(), 85);
    assert!(segs.last().unwrap().truncated);
}

#[test]
fn composite_spans_cover_body_and_overlay() {
    let pool = vec![clip("body", 80, false, 30)];
    let spec = CompositeSpec {
        primary: primary("lipsync", 200, 25),
        pool,
        weights: CompositeWeights::default(),
    };
    let mut rng = Rng64::new(3);
    let spans = build_composite_spans(&spec, FrameIndex(1000), None, &mut rng).unwrap();

    // three body segments plus the overlay
    assert_eq!(spans.len(), 4);
    let overlay = spans.last().unwrap();
    assert_eq!(overlay.offset, FrameIndex(1000));
    assert_eq!(overlay.view.id(), "lipsync");
    assert!(!overlay.view.carries(ChannelGroup::Body), "body excluded");
    assert!(overlay.view.carries(ChannelGroup::Face));
    assert_eq!(overlay.tail_hold, 25, "survives into the next crossfade");
    assert_eq!(overlay.end(), FrameIndex(1225));

    let body = &spans[..3];
    assert_eq!(body[0].offset, FrameIndex(1000));
    assert_eq!(body[1].offset, FrameIndex(1080));
    assert_eq!(body[2].offset, FrameIndex(1160));
    assert_eq!(body[2].truncated_end, Some(40));
    assert_eq!(body[2].end(), FrameIndex(1200), "body ends exactly at D");
}

#[test]
fn composite_overlapping_segments_get_matching_blend_windows() {
    let pool = vec![clip("body", 80, true, 30)];
    let spec = CompositeSpec {
        primary: primary("lipsync", 200, 25),
        pool,
        weights: CompositeWeights::default(),
    };
    let mut rng = Rng64::new(3);
    let spans = build_composite_spans(&spec, FrameIndex(0), None, &mut rng).unwrap();

    // stitched starts: 0, 80, 130 (segment 2 and 3 overlap by 30)
    assert_eq!(spans[1].offset, FrameIndex(80));
    assert_eq!(spans[2].offset, FrameIndex(130));
    let out = spans[1].ease_out.unwrap();
    let inc = spans[2].ease_in.unwrap();
    assert_eq!(out.frames, 30);
    assert_eq!(inc.frames, 30);
    assert!(spans[0].ease_out.is_none(), "no overlap, no blend");
    assert!(spans[1].ease_in.is_none());
}

#[test]
fn composite_lead_in_lands_on_block_start_spans_only() {
    let pool = vec![clip("body", 80, false, 30)];
    let spec = CompositeSpec {
        primary: primary("lipsync", 200, 25),
        pool,
        weights: CompositeWeights { primary: 0.8, fill: 0.5 },
    };
    let mut rng = Rng64::new(3);
    let lead = Some(EaseWindow::crossfade(25));
    let spans = build_composite_spans(&spec, FrameIndex(0), lead, &mut rng).unwrap();

    assert_eq!(spans[0].ease_in.unwrap().frames, 25);
    assert!(spans[1].ease_in.is_none());
    assert!(spans[2].ease_in.is_none());
    assert_eq!(spans.last().unwrap().ease_in.unwrap().frames, 25);

    // request weights scale per-clip defaults
    assert_eq!(spans[0].blend_weight, 0.5);
    assert_eq!(spans.last().unwrap().blend_weight, 0.8);
}

#[test]
fn composite_rejects_bad_weights() {
    let spec = CompositeSpec {
        primary: primary("lipsync", 100, 25),
        pool: vec![clip("body", 80, false, 30)],
        weights: CompositeWeights { primary: 0.0, fill: 1.0 },
    };
    let mut rng = Rng64::new(1);
    assert!(build_composite_spans(&spec, FrameIndex(0), None, &mut rng).is_err());
}
