use super::*;

fn spec(id: &str) -> ClipSpec {
    ClipSpec {
        id: id.to_string(),
        name: id.to_string(),
        source: format!("clips/{id}.bin"),
        looped: false,
        loop_transition: false,
        transition_frames: 30,
        weight: 1.0,
    }
}

fn loaded(id: &str, duration: u64, looped: bool, loop_transition: bool) -> LoadedClip {
    LoadedClip {
        id: id.to_string(),
        name: id.to_string(),
        category: "idle".to_string(),
        duration_frames: duration,
        looped,
        loop_transition,
        transition_frames: 30,
        weight: 1.0,
        channels: ChannelCounts { bone: 52, morph: 30 },
    }
}

#[test]
fn registry_parses_grouped_json() {
    let json = r#"{
        "categories": {
            "idle": [
                {"id": "idle_1", "name": "Idle A", "source": "clips/idle_1.bin",
                 "loop": true, "loop_transition": true, "transition_frames": 30},
                {"id": "idle_2", "name": "Idle B", "source": "clips/idle_2.bin", "loop": true}
            ],
            "celebrate": [
                {"id": "dance_1", "name": "Dance", "source": "clips/dance_1.bin"}
            ]
        }
    }"#;
    let reg = ClipRegistry::from_json(json).unwrap();
    let idle = reg.clips_in("idle").unwrap();
    assert_eq!(idle.len(), 2);
    assert_eq!(idle[0].id, "idle_1");
    assert!(idle[0].loop_transition);
    assert_eq!(idle[1].transition_frames, 30, "default applies");
    assert!(!idle[1].loop_transition);
    assert!(reg.has_category("celebrate"));
    assert!(!reg.has_category("missing"));

    let (cat, s) = reg.spec_by_id("dance_1").unwrap();
    assert_eq!(cat, "celebrate");
    assert_eq!(s.name, "Dance");
    assert!(reg.spec_by_id("nope").is_none());
}

#[test]
fn registry_rejects_duplicate_ids_across_categories() {
    let mut reg = ClipRegistry::default();
    reg.categories.insert("a".into(), vec![spec("x")]);
    reg.categories.insert("b".into(), vec![spec("x")]);
    let err = reg.validate().unwrap_err().to_string();
    assert!(err.contains("duplicate clip id 'x'"), "{err}");
}

#[test]
fn registry_rejects_empty_category_and_reserved_name() {
    let mut reg = ClipRegistry::default();
    reg.categories.insert("idle".into(), vec![]);
    assert!(reg.validate().is_err());

    let mut reg = ClipRegistry::default();
    reg.categories.insert(TRANSIENT_CATEGORY.into(), vec![spec("t")]);
    let err = reg.validate().unwrap_err().to_string();
    assert!(err.contains("reserved"), "{err}");
}

#[test]
fn spec_rejects_loop_transition_without_window() {
    let mut s = spec("bad");
    s.loop_transition = true;
    s.transition_frames = 0;
    let mut reg = ClipRegistry::default();
    reg.categories.insert("idle".into(), vec![s]);
    assert!(reg.validate().is_err());
}

#[test]
fn loaded_clip_validate_checks_duration_against_window() {
    assert!(loaded("ok", 90, true, true).validate().is_ok());
    assert!(loaded("zero", 0, false, false).validate().is_err());
    // duration must strictly exceed the window when loop blending is on
    assert!(loaded("tight", 30, true, true).validate().is_err());
}

#[test]
fn cycle_duration_shrinks_only_with_loop_transition() {
    assert_eq!(loaded("a", 90, true, true).cycle_duration_frames(), 60);
    assert_eq!(loaded("b", 90, true, false).cycle_duration_frames(), 90);
}

#[test]
fn view_projection_masks_channel_groups() {
    let clip = Arc::new(loaded("c", 90, false, false));
    let full = ClipView::full(clip.clone());
    assert!(full.carries(ChannelGroup::Body));
    assert!(full.carries(ChannelGroup::Face));

    let face_only = ClipView::only(clip.clone(), ChannelGroup::Face);
    assert!(!face_only.carries(ChannelGroup::Body));
    assert!(face_only.carries(ChannelGroup::Face));

    let no_body = ClipView::excluding(clip.clone(), ChannelGroup::Body);
    assert!(!no_body.carries(ChannelGroup::Body));
    assert!(no_body.carries(ChannelGroup::Face));

    // projection shares the clip, never copies it
    assert!(Arc::ptr_eq(face_only.clip(), &clip));
}

#[test]
fn view_on_channelless_group_carries_nothing() {
    let mut clip = loaded("bodyless", 90, false, false);
    clip.channels = ChannelCounts { bone: 0, morph: 12 };
    let view = ClipView::full(Arc::new(clip));
    assert!(!view.carries(ChannelGroup::Body));
    assert!(view.carries(ChannelGroup::Face));
}
