//! The director: one object that owns the catalog, cache, compositor,
//! scheduler and request queue, and advances them once per rendered frame.

use std::mem;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::animation::rng::Rng64;
use crate::catalog::loader::{ClipCache, ClipSource, LoadEvent};
use crate::catalog::model::{ClipRef, ClipRegistry, ClipSpec, LoadedClip, TRANSIENT_CATEGORY};
use crate::director::behavior::{BehaviorTable, PerformanceState};
use crate::director::queue::{PlayRequest, QueueStatus, RequestQueue};
use crate::foundation::error::{MarionetteError, MarionetteResult};
use crate::foundation::frame::FrameIndex;
use crate::schedule::crossfade::{RemovalQueue, retire_spans};
use crate::schedule::cycles::{CycleScheduler, PlaySpec, SchedulerConfig, TickReport};
use crate::schedule::stitch::{CompositeSpec, CompositeWeights};
use crate::timeline::compositor::{SpanSink, TimelineCompositor};
use crate::timeline::span::EaseWindow;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Tuning for a [`Director`].
pub struct DirectorConfig {
    /// Cycle retention and timeline growth tuning.
    pub scheduler: SchedulerConfig,
    /// Seed for every random pick the director makes. Two directors with the
    /// same seed, catalog and call sequence play the same clips.
    pub seed: u64,
    /// Timeline length declared to the sink before anything plays.
    pub initial_timeline_frames: u64,
    /// Frames to wait after dispatching a queue entry before the next one
    /// may drain.
    pub drain_hold_frames: u64,
    /// Margin added to crossfade removal deadlines.
    pub removal_margin_frames: u64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            seed: 0,
            initial_timeline_frames: 600,
            drain_hold_frames: 30,
            removal_margin_frames: 5,
        }
    }
}

impl DirectorConfig {
    /// Reject configurations the director cannot run with.
    pub fn validate(&self) -> MarionetteResult<()> {
        self.scheduler.validate()?;
        if self.initial_timeline_frames == 0 {
            return Err(MarionetteError::validation(
                "initial_timeline_frames must be >= 1",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
/// What a tick observed. Events accumulate across API calls and are handed
/// to the host, in order, by the next [`Director::tick`].
pub enum StageEvent {
    /// The behavioral state changed.
    StateChanged {
        /// State before the change.
        from: PerformanceState,
        /// State after the change.
        to: PerformanceState,
    },
    /// A state change outside the transition table was ignored.
    TransitionRejected {
        /// State the change was asked from.
        from: PerformanceState,
        /// State the change was asked to.
        to: PerformanceState,
    },
    /// A performance started playing on the timeline.
    ClipStarted {
        /// Primary clip id of the performance.
        clip: String,
        /// State the performance belongs to.
        state: PerformanceState,
    },
    /// A queued request was taken off the queue and dispatched.
    RequestDispatched {
        /// Request kind name.
        kind: &'static str,
    },
    /// A clip load failed. Any performance waiting on the clip was
    /// abandoned and its state change rolled back.
    LoadFailed {
        /// Clip id that failed to load.
        clip: String,
        /// Failure description.
        error: String,
    },
    /// A queued request failed to dispatch and was dropped.
    RequestFailed {
        /// Request kind name.
        kind: &'static str,
        /// Failure description.
        error: String,
    },
}

/// States to roll back to when a staged performance falls through.
#[derive(Clone, Copy)]
struct StateRevert {
    current: PerformanceState,
    previous: Option<PerformanceState>,
}

/// A performance that was accepted but is still waiting on clip loads.
struct PendingIntent {
    /// Clip ids that must all be cached before the performance can start.
    required: Vec<String>,
    kind: IntentKind,
    revert: Option<StateRevert>,
}

enum IntentKind {
    Simple {
        clip_id: String,
    },
    Behavior {
        state: PerformanceState,
        clip_id: String,
    },
    Composite {
        primary_id: String,
        pool_ids: Vec<String>,
        weights: CompositeWeights,
    },
}

/// The orchestrator every public operation goes through.
///
/// All methods are synchronous and run on the caller's thread; clip loads
/// resolve on background threads and are observed by [`Director::tick`],
/// which the host calls once per rendered frame with the global frame index.
/// Requests that need an unloaded clip are staged and start on a later tick,
/// crossfading over whatever was playing.
pub struct Director {
    registry: ClipRegistry,
    behaviors: BehaviorTable,
    cache: ClipCache,
    comp: TimelineCompositor,
    scheduler: CycleScheduler,
    removals: RemovalQueue,
    queue: RequestQueue,
    rng: Rng64,
    config: DirectorConfig,
    current: PerformanceState,
    previous: Option<PerformanceState>,
    pending: Option<PendingIntent>,
    last_now: FrameIndex,
    /// Primary id of the last started performance. `None` until the first
    /// one, which therefore starts without a lead-in ease.
    last_primary: Option<String>,
    /// Frames accumulated toward the current behavior's variety interval.
    switch_accum: u64,
    /// Clip id armed to replace the current one at a cycle boundary.
    variety_target: Option<String>,
    events: Vec<StageEvent>,
    disposed: bool,
}

impl Director {
    /// Build a director over `registry` and stage its opening performance.
    ///
    /// The session opens in [`PerformanceState::Intro`]; when the intro
    /// behavior has no candidate clips the director falls through to idle
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns [`MarionetteError::Validation`] when the registry, the
    /// behavior table or the config fails its structural checks.
    pub fn new(
        registry: ClipRegistry,
        behaviors: BehaviorTable,
        source: Arc<dyn ClipSource>,
        sink: Box<dyn SpanSink>,
        config: DirectorConfig,
    ) -> MarionetteResult<Self> {
        registry.validate()?;
        behaviors.validate()?;
        config.validate()?;
        let mut director = Self {
            cache: ClipCache::new(source),
            comp: TimelineCompositor::new(sink, FrameIndex(config.initial_timeline_frames)),
            scheduler: CycleScheduler::new(config.scheduler)?,
            removals: RemovalQueue::new(),
            queue: RequestQueue::new(),
            rng: Rng64::new(config.seed),
            registry,
            behaviors,
            config,
            current: PerformanceState::Intro,
            previous: None,
            pending: None,
            last_now: FrameIndex(0),
            last_primary: None,
            switch_accum: 0,
            variety_target: None,
            events: Vec::new(),
            disposed: false,
        };
        director.bootstrap();
        Ok(director)
    }

    /// Stage the opening performance. Nothing ever transitions into intro,
    /// so this is the only place it starts.
    fn bootstrap(&mut self) {
        let revert = StateRevert {
            current: self.current,
            previous: self.previous,
        };
        if let Err(e) = self.queue_behavior_intent(revert) {
            warn!(error = %e, "no intro candidates; opening in idle");
            self.current = PerformanceState::Idle;
            let revert = StateRevert {
                current: self.current,
                previous: self.previous,
            };
            if let Err(e) = self.queue_behavior_intent(revert) {
                warn!(error = %e, "no idle candidates; waiting for explicit requests");
            }
        }
    }

    /// Advance the director to global frame `now`.
    ///
    /// Never fails: internal errors are logged, and those the host should
    /// react to are surfaced in the returned events. Frame indices may skip
    /// ahead between calls; the scheduler catches up in one tick.
    #[tracing::instrument(skip(self))]
    pub fn tick(&mut self, now: FrameIndex) -> Vec<StageEvent> {
        if self.disposed {
            return mem::take(&mut self.events);
        }
        let delta = now.since(self.last_now);
        self.last_now = now;

        self.collect_loads();
        self.start_pending_if_ready(now);

        let report = match self.scheduler.tick(&mut self.comp, &mut self.rng, now) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "scheduler tick failed");
                TickReport::default()
            }
        };

        for id in self.removals.drain_due(now) {
            self.comp.remove(id);
        }

        self.advance_variety(now, delta, report.crossed_boundary);
        self.drain_or_return(now);

        mem::take(&mut self.events)
    }

    /// Change behavioral state. A legal transition selects a clip through
    /// the target state's behavior and begins loading it; the performance
    /// starts on a later tick once the clip is cached. Asking for the
    /// current state again restarts its performance.
    ///
    /// An illegal transition is logged, surfaced as
    /// [`StageEvent::TransitionRejected`] and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MarionetteError::MissingClip`] when the target state's
    /// behavior has no candidate clips; the state change is rolled back.
    #[tracing::instrument(skip(self), fields(from = %self.current))]
    pub fn transition_to_state(&mut self, target: PerformanceState) -> MarionetteResult<()> {
        if self.disposed {
            return Ok(());
        }
        let Some(revert) = self.commit_state(target) else {
            return Ok(());
        };
        if let Err(e) = self.queue_behavior_intent(revert) {
            self.restore_states(revert);
            return Err(e);
        }
        Ok(())
    }

    /// Play one clip as soon as it is cached, replacing whatever is playing.
    /// The behavioral state does not change.
    ///
    /// # Errors
    ///
    /// Returns [`MarionetteError::MissingClip`] when `clip` names nothing in
    /// the catalog, or [`MarionetteError::Validation`] for a malformed
    /// transient descriptor.
    pub fn play_clip(&mut self, clip: ClipRef) -> MarionetteResult<()> {
        if self.disposed {
            return Ok(());
        }
        let (category, spec) = self.resolve_ref(clip)?;
        self.cache.request(&category, &spec);
        self.pending = Some(PendingIntent {
            required: vec![spec.id.clone()],
            kind: IntentKind::Simple { clip_id: spec.id },
            revert: None,
        });
        Ok(())
    }

    /// Play a stitched composite block: `primary` dictates the duration and
    /// clips from `fill_category` cover the body alongside it. Enters
    /// [`PerformanceState::Composite`].
    ///
    /// # Errors
    ///
    /// Returns [`MarionetteError::MissingClip`] when the primary or the fill
    /// category cannot be resolved, or [`MarionetteError::Validation`] for
    /// bad weights. A rejected state transition is not an error.
    pub fn play_composite(
        &mut self,
        primary: ClipRef,
        fill_category: &str,
        weights: CompositeWeights,
    ) -> MarionetteResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.begin_composite(PerformanceState::Composite, primary, fill_category, weights)
    }

    /// Play an utterance: a lip-sync composite with emotion-matched body
    /// fill. Enters [`PerformanceState::Speaking`]. The text stays with the
    /// host; the core only sizes logs by it.
    ///
    /// # Errors
    ///
    /// Same surface as [`Director::play_composite`].
    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    pub fn speak(
        &mut self,
        text: &str,
        primary: ClipRef,
        emotion_category: &str,
        weights: CompositeWeights,
    ) -> MarionetteResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.begin_composite(PerformanceState::Speaking, primary, emotion_category, weights)
    }

    /// Append a simple play request to the queue. With `force`, everything
    /// queued is discarded and the request dispatches immediately.
    pub fn queue_simple(&mut self, clip: ClipRef, force: bool) {
        self.enqueue(PlayRequest::Simple { clip }, force);
    }

    /// Append a composite play request to the queue.
    pub fn queue_composite(
        &mut self,
        primary: ClipRef,
        fill_category: &str,
        weights: CompositeWeights,
        force: bool,
    ) {
        self.enqueue(
            PlayRequest::Composite {
                primary,
                fill_category: fill_category.to_string(),
                weights,
            },
            force,
        );
    }

    /// Append an utterance to the queue.
    pub fn queue_speak(
        &mut self,
        text: &str,
        primary: ClipRef,
        emotion_category: &str,
        weights: CompositeWeights,
        force: bool,
    ) {
        self.enqueue(
            PlayRequest::Speak {
                text: text.to_string(),
                primary,
                emotion_category: emotion_category.to_string(),
                weights,
            },
            force,
        );
    }

    /// Tear the session down: clears the queue, abandons pending loads and
    /// removes every span. Idempotent; every later call on the director is
    /// a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        debug!("director disposed");
        self.pending = None;
        self.variety_target = None;
        self.queue.clear();
        self.removals.clear();
        self.scheduler.take_span_ids();
        self.comp.clear();
        self.disposed = true;
    }

    /// Current behavioral state.
    pub fn current_state(&self) -> PerformanceState {
        self.current
    }

    /// State before the last transition, if any.
    pub fn previous_state(&self) -> Option<PerformanceState> {
        self.previous
    }

    /// Primary clip id of the active performance, if one is on the timeline.
    pub fn active_clip(&self) -> Option<&str> {
        self.scheduler.current_clip().map(|c| c.id.as_str())
    }

    /// Snapshot of the request queue.
    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Number of spans registered on the timeline.
    pub fn span_count(&self) -> usize {
        self.comp.span_count()
    }

    /// Declared timeline length.
    pub fn timeline_len(&self) -> FrameIndex {
        self.comp.timeline_len()
    }

    /// Total blend contribution across every span at `now`.
    pub fn coverage_at(&self, now: FrameIndex) -> f64 {
        self.comp.coverage_at(now)
    }

    /// Total blend contribution of `clip_id`'s spans at `now`.
    pub fn clip_coverage_at(&self, clip_id: &str, now: FrameIndex) -> f64 {
        self.comp.clip_coverage_at(clip_id, now)
    }

    /// Whether [`Director::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Drain finished background loads and react to failures.
    fn collect_loads(&mut self) {
        for event in self.cache.poll() {
            match event {
                LoadEvent::Loaded(_) => {}
                LoadEvent::Failed { id, error } => {
                    let blocks_pending = self
                        .pending
                        .as_ref()
                        .is_some_and(|p| p.required.iter().any(|r| r == &id));
                    if blocks_pending && let Some(intent) = self.pending.take() {
                        warn!(clip = %id, "pending performance abandoned: clip failed to load");
                        if let Some(revert) = intent.revert {
                            self.restore_states(revert);
                        }
                    }
                    if self.variety_target.as_deref() == Some(id.as_str()) {
                        self.variety_target = None;
                        self.switch_accum = 0;
                    }
                    self.events.push(StageEvent::LoadFailed {
                        clip: id,
                        error: error.to_string(),
                    });
                }
            }
        }
    }

    /// Start the pending performance once everything it needs is cached.
    fn start_pending_if_ready(&mut self, now: FrameIndex) {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| p.required.iter().all(|id| self.cache.get(id).is_some()));
        if !ready {
            return;
        }
        let Some(intent) = self.pending.take() else {
            return;
        };
        let spec = match self.assemble_play_spec(&intent.kind) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(error = %e, "pending performance could not be assembled");
                if let Some(revert) = intent.revert {
                    self.restore_states(revert);
                }
                return;
            }
        };
        match self.start_performance(spec, now) {
            Ok(clip) => {
                self.events.push(StageEvent::ClipStarted {
                    clip,
                    state: self.current,
                });
            }
            Err(e) => {
                warn!(error = %e, "performance failed to start");
                if let Some(revert) = intent.revert {
                    self.restore_states(revert);
                }
            }
        }
    }

    /// Resolve a staged intent against the cache into a schedulable spec.
    fn assemble_play_spec(&self, kind: &IntentKind) -> MarionetteResult<PlaySpec> {
        match kind {
            IntentKind::Simple { clip_id } => Ok(PlaySpec::Simple(self.require_cached(clip_id)?)),
            IntentKind::Behavior { state, clip_id } => {
                let policy = self.behaviors.behavior(*state).loop_policy;
                Ok(PlaySpec::Simple(policy.apply(self.require_cached(clip_id)?)))
            }
            IntentKind::Composite {
                primary_id,
                pool_ids,
                weights,
            } => {
                let primary = self.require_cached(primary_id)?;
                let pool = pool_ids
                    .iter()
                    .map(|id| self.require_cached(id))
                    .collect::<MarionetteResult<Vec<_>>>()?;
                Ok(PlaySpec::Composite(CompositeSpec {
                    primary,
                    pool,
                    weights: *weights,
                }))
            }
        }
    }

    fn require_cached(&self, id: &str) -> MarionetteResult<Arc<LoadedClip>> {
        self.cache
            .get(id)
            .ok_or_else(|| MarionetteError::missing_clip(format!("clip '{id}' not in cache")))
    }

    /// Swap the timeline over to `spec` at `now`, crossfading out whatever
    /// was playing.
    fn start_performance(&mut self, spec: PlaySpec, now: FrameIndex) -> MarionetteResult<String> {
        let incoming = Arc::clone(spec.primary_clip());
        let window = self
            .scheduler
            .current_clip()
            .map_or(incoming.transition_frames, |c| c.transition_frames);

        // Spans still easing out from an earlier switch are dropped now; the
        // timeline resolves toward the latest target.
        for id in self.removals.take_all() {
            self.comp.remove(id);
        }
        let outgoing = self.scheduler.take_span_ids();
        if !outgoing.is_empty() {
            retire_spans(
                &mut self.comp,
                &outgoing,
                now,
                window,
                self.config.removal_margin_frames,
                &mut self.removals,
            );
        }

        let fades_in = window > 0
            && self
                .last_primary
                .as_deref()
                .is_some_and(|prev| prev != incoming.id);
        let lead_in = fades_in.then(|| EaseWindow::crossfade(window));
        self.scheduler
            .start(&mut self.comp, &mut self.rng, spec, now, lead_in)?;

        self.last_primary = Some(incoming.id.clone());
        self.switch_accum = 0;
        self.variety_target = None;
        debug!(clip = %incoming.id, state = %self.current, "performance started");
        Ok(incoming.id.clone())
    }

    /// Rotate long-lived looping behaviors: after `auto_switch_frames` on
    /// the same clip, arm a different candidate, preload it, and swap at the
    /// next cycle boundary.
    fn advance_variety(&mut self, now: FrameIndex, delta: u64, crossed_boundary: bool) {
        if self.pending.is_some() || !self.queue.is_empty() {
            return;
        }
        if !self.scheduler.is_active() || !self.scheduler.is_looping() {
            return;
        }
        let behavior = self.behaviors.behavior(self.current);
        let Some(interval) = behavior.auto_switch_frames else {
            return;
        };
        let Some(active) = self.scheduler.current_clip() else {
            return;
        };
        // Only behavior-owned clips rotate; an explicitly played loop holds
        // until replaced.
        if !behavior.categories.iter().any(|c| *c == active.category) {
            return;
        }
        let active_id = active.id.clone();
        self.switch_accum += delta;

        if self.variety_target.is_none() && self.switch_accum >= interval {
            match behavior.select_clip(&self.registry, &mut self.rng, Some(&active_id)) {
                Ok((category, spec)) if spec.id != active_id => {
                    debug!(from = %active_id, to = %spec.id, "variety switch armed");
                    self.cache.request(&category, &spec);
                    self.variety_target = Some(spec.id);
                }
                // The active clip is the only candidate; look again after
                // another interval.
                Ok(_) | Err(_) => self.switch_accum = 0,
            }
        }

        if !crossed_boundary {
            return;
        }
        let Some(target) = self.variety_target.clone() else {
            return;
        };
        let Some(clip) = self.cache.get(&target) else {
            return;
        };
        let policy = behavior.loop_policy;
        match self.start_performance(PlaySpec::Simple(policy.apply(clip)), now) {
            Ok(started) => {
                self.events.push(StageEvent::ClipStarted {
                    clip: started,
                    state: self.current,
                });
            }
            Err(e) => warn!(error = %e, "variety switch failed to start"),
        }
    }

    /// Dispatch queued work, or fall back to the state's return target, when
    /// the active performance allows a handover.
    fn drain_or_return(&mut self, now: FrameIndex) {
        if self.pending.is_some() || self.queue.on_hold(now) {
            return;
        }
        if !self.scheduler.is_active() {
            if !self.queue.is_empty() {
                self.process_queue(now);
            }
            return;
        }
        if self.scheduler.is_looping() {
            // A looping performance is interruptible once its first full
            // cycle has played.
            let cycled = self.scheduler.current_cycle(now).is_some_and(|c| c >= 1);
            if cycled && !self.queue.is_empty() {
                self.process_queue(now);
            }
            return;
        }
        // A bounded performance hands over within one transition window of
        // its natural end, so the successor crossfades over the tail.
        let window = self
            .scheduler
            .current_clip()
            .map_or(0, |c| c.transition_frames);
        let remaining = self.scheduler.frames_until_end(now).unwrap_or(0);
        if remaining > window {
            return;
        }
        if self.queue.is_empty() {
            self.auto_return();
        } else {
            self.process_queue(now);
        }
    }

    /// Return to the state's configured fallback (idle when unset) after a
    /// bounded performance finishes with nothing queued.
    fn auto_return(&mut self) {
        let target = self
            .behaviors
            .behavior(self.current)
            .auto_return
            .unwrap_or(PerformanceState::Idle);
        debug!(from = %self.current, to = %target, "auto-return");
        if let Err(e) = self.transition_to_state(target) {
            warn!(to = %target, error = %e, "auto-return failed");
        }
    }

    fn process_queue(&mut self, now: FrameIndex) {
        let Some(request) = self.queue.begin_dispatch() else {
            return;
        };
        let kind = request.kind();
        debug!(kind, "dispatching queued request");
        let outcome = self.dispatch(request);
        // The guard must drop on every path or the queue jams for good.
        self.queue
            .finish_dispatch(Some(now.advance(self.config.drain_hold_frames)));
        match outcome {
            Ok(()) => self.events.push(StageEvent::RequestDispatched { kind }),
            Err(e) => {
                warn!(kind, error = %e, "queued request dropped");
                self.events.push(StageEvent::RequestFailed {
                    kind,
                    error: e.to_string(),
                });
            }
        }
    }

    fn dispatch(&mut self, request: PlayRequest) -> MarionetteResult<()> {
        match request {
            PlayRequest::Simple { clip } => self.play_clip(clip),
            PlayRequest::Composite {
                primary,
                fill_category,
                weights,
            } => self.begin_composite(
                PerformanceState::Composite,
                primary,
                &fill_category,
                weights,
            ),
            PlayRequest::Speak {
                text,
                primary,
                emotion_category,
                weights,
            } => {
                debug!(chars = text.len(), "speaking queued utterance");
                self.begin_composite(
                    PerformanceState::Speaking,
                    primary,
                    &emotion_category,
                    weights,
                )
            }
        }
    }

    fn enqueue(&mut self, request: PlayRequest, force: bool) {
        if self.disposed {
            return;
        }
        let idle = self.queue.is_empty() && !self.scheduler.is_active() && self.pending.is_none();
        self.queue.enqueue(request, force);
        if force || idle {
            self.process_queue(self.last_now);
        }
    }

    /// Commit `state` and stage a composite block for it.
    fn begin_composite(
        &mut self,
        state: PerformanceState,
        primary: ClipRef,
        fill_category: &str,
        weights: CompositeWeights,
    ) -> MarionetteResult<()> {
        weights.validate()?;
        let (primary_category, primary_spec) = self.resolve_ref(primary)?;
        let pool: Vec<ClipSpec> = self
            .registry
            .clips_in(fill_category)
            .ok_or_else(|| {
                MarionetteError::missing_clip(format!(
                    "no category '{fill_category}' to fill the composite"
                ))
            })?
            .to_vec();
        let Some(revert) = self.commit_state(state) else {
            return Ok(());
        };
        self.cache.request(&primary_category, &primary_spec);
        let mut required = vec![primary_spec.id.clone()];
        for spec in &pool {
            self.cache.request(fill_category, spec);
            required.push(spec.id.clone());
        }
        self.pending = Some(PendingIntent {
            required,
            kind: IntentKind::Composite {
                primary_id: primary_spec.id,
                pool_ids: pool.into_iter().map(|s| s.id).collect(),
                weights,
            },
            revert: Some(revert),
        });
        Ok(())
    }

    /// Apply the transition table. Returns the states to restore should the
    /// resulting intent later fall through, or `None` when the transition
    /// was rejected.
    fn commit_state(&mut self, target: PerformanceState) -> Option<StateRevert> {
        if !self.current.can_transition_to(target) {
            warn!(from = %self.current, to = %target, "transition rejected");
            self.events.push(StageEvent::TransitionRejected {
                from: self.current,
                to: target,
            });
            return None;
        }
        let revert = StateRevert {
            current: self.current,
            previous: self.previous,
        };
        if target != self.current {
            debug!(from = %self.current, to = %target, "state changed");
            self.events.push(StageEvent::StateChanged {
                from: self.current,
                to: target,
            });
            self.previous = Some(self.current);
            self.current = target;
        }
        Some(revert)
    }

    /// Select a clip through the current state's behavior and stage it as
    /// the pending performance.
    fn queue_behavior_intent(&mut self, revert: StateRevert) -> MarionetteResult<()> {
        let behavior = self.behaviors.behavior(self.current);
        let (category, spec) = behavior.select_clip(&self.registry, &mut self.rng, None)?;
        self.cache.request(&category, &spec);
        self.pending = Some(PendingIntent {
            required: vec![spec.id.clone()],
            kind: IntentKind::Behavior {
                state: self.current,
                clip_id: spec.id,
            },
            revert: Some(revert),
        });
        Ok(())
    }

    fn restore_states(&mut self, revert: StateRevert) {
        if self.current != revert.current {
            self.events.push(StageEvent::StateChanged {
                from: self.current,
                to: revert.current,
            });
        }
        self.current = revert.current;
        self.previous = revert.previous;
    }

    /// Resolve a [`ClipRef`] to its category and descriptor.
    fn resolve_ref(&self, clip: ClipRef) -> MarionetteResult<(String, ClipSpec)> {
        match clip {
            ClipRef::Id(id) => self
                .registry
                .spec_by_id(&id)
                .map(|(category, spec)| (category.to_string(), spec.clone()))
                .ok_or_else(|| MarionetteError::missing_clip(format!("no clip '{id}' in catalog"))),
            ClipRef::Category(category) => self
                .registry
                .clips_in(&category)
                .and_then(|clips| clips.first())
                .map(|spec| (category.clone(), spec.clone()))
                .ok_or_else(|| {
                    MarionetteError::missing_clip(format!("no category '{category}' in catalog"))
                }),
            ClipRef::Transient(spec) => {
                spec.validate(TRANSIENT_CATEGORY)?;
                Ok((TRANSIENT_CATEGORY.to_string(), spec))
            }
        }
    }
}

impl std::fmt::Debug for Director {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Director")
            .field("state", &self.current)
            .field("active", &self.scheduler.is_active())
            .field("queued", &self.queue.len())
            .field("spans", &self.comp.span_count())
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/director/stage.rs"]
mod tests;
