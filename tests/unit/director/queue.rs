use super::*;

fn simple(id: &str) -> PlayRequest {
    PlayRequest::Simple {
        clip: ClipRef::Id(id.to_string()),
    }
}

fn head_id(queue: &mut RequestQueue) -> String {
    let request = queue.begin_dispatch().expect("queue should have a head");
    queue.finish_dispatch(None);
    match request {
        PlayRequest::Simple {
            clip: ClipRef::Id(id),
        } => id,
        other => panic!("unexpected request {other:?}"),
    }
}

#[test]
fn fifo_order_is_preserved() {
    let mut q = RequestQueue::new();
    q.enqueue(simple("a"), false);
    q.enqueue(simple("b"), false);
    q.enqueue(simple("c"), false);
    assert_eq!(q.len(), 3);

    assert_eq!(head_id(&mut q), "a");
    assert_eq!(head_id(&mut q), "b");
    assert_eq!(head_id(&mut q), "c");
    assert!(q.is_empty());
}

#[test]
fn force_discards_everything_queued() {
    let mut q = RequestQueue::new();
    q.enqueue(simple("a"), false);
    q.enqueue(simple("b"), false);
    let discarded = q.enqueue(simple("urgent"), true);
    assert_eq!(discarded, 2);
    assert_eq!(q.len(), 1);
    assert_eq!(head_id(&mut q), "urgent");
}

#[test]
fn dispatch_guard_blocks_reentrancy() {
    let mut q = RequestQueue::new();
    q.enqueue(simple("a"), false);
    q.enqueue(simple("b"), false);

    let first = q.begin_dispatch();
    assert!(first.is_some());
    // A drain triggered while dispatching must come back empty-handed.
    assert!(q.begin_dispatch().is_none());
    assert_eq!(q.len(), 1, "second entry stays queued");

    q.finish_dispatch(None);
    assert!(q.begin_dispatch().is_some());
}

#[test]
fn finish_dispatch_installs_the_hold() {
    let mut q = RequestQueue::new();
    q.enqueue(simple("a"), false);
    q.begin_dispatch().unwrap();
    q.finish_dispatch(Some(FrameIndex(130)));

    assert!(q.on_hold(FrameIndex(100)));
    assert!(q.on_hold(FrameIndex(129)));
    assert!(!q.on_hold(FrameIndex(130)), "hold is exclusive of its frame");
}

#[test]
fn begin_dispatch_on_empty_queue_does_not_take_the_guard() {
    let mut q = RequestQueue::new();
    assert!(q.begin_dispatch().is_none());
    q.enqueue(simple("a"), false);
    // Had the guard latched above, this would be None.
    assert!(q.begin_dispatch().is_some());
}

#[test]
fn status_reflects_queue_and_guard_state() {
    let mut q = RequestQueue::new();
    q.enqueue(simple("a"), false);
    q.enqueue(simple("b"), false);

    let status = q.status();
    assert_eq!(status.queued, 2);
    assert!(!status.dispatching);
    assert_eq!(status.held_until, None);

    q.begin_dispatch().unwrap();
    assert!(q.status().dispatching);
    q.finish_dispatch(Some(FrameIndex(60)));

    let status = q.status();
    assert_eq!(status.queued, 1);
    assert!(!status.dispatching);
    assert_eq!(status.held_until, Some(60));
}

#[test]
fn clear_drops_entries_but_not_the_guard() {
    let mut q = RequestQueue::new();
    q.enqueue(simple("a"), false);
    q.enqueue(simple("b"), false);
    q.begin_dispatch().unwrap();
    q.clear();
    assert!(q.is_empty());
    // The in-flight dispatch still owns the guard until it finishes.
    assert!(q.status().dispatching);
}

#[test]
fn request_kinds_are_stable_names() {
    assert_eq!(simple("a").kind(), "simple");
    let composite = PlayRequest::Composite {
        primary: ClipRef::Category("talking".to_string()),
        fill_category: "idle".to_string(),
        weights: CompositeWeights::default(),
    };
    assert_eq!(composite.kind(), "composite");
    let speak = PlayRequest::Speak {
        text: "hello".to_string(),
        primary: ClipRef::Id("viseme_1".to_string()),
        emotion_category: "happy".to_string(),
        weights: CompositeWeights::default(),
    };
    assert_eq!(speak.kind(), "speak");
}
