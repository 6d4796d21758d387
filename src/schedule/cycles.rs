use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::animation::rng::Rng64;
use crate::catalog::model::{ClipView, LoadedClip};
use crate::foundation::error::{MarionetteError, MarionetteResult};
use crate::foundation::frame::FrameIndex;
use crate::schedule::stitch::{CompositeSpec, build_composite_spans};
use crate::timeline::compositor::TimelineCompositor;
use crate::timeline::span::{EaseWindow, Span, SpanId};

#[derive(Clone, Debug)]
/// What the scheduler is asked to keep on the timeline.
pub enum PlaySpec {
    /// One clip, cycled if it loops.
    Simple(Arc<LoadedClip>),
    /// A stitched body-plus-overlay block (never cycles).
    Composite(CompositeSpec),
}

impl PlaySpec {
    /// The clip that defines the plan's identity and timing.
    pub fn primary_clip(&self) -> &Arc<LoadedClip> {
        match self {
            Self::Simple(clip) => clip,
            Self::Composite(spec) => &spec.primary,
        }
    }

    fn is_looping(&self) -> bool {
        matches!(self, Self::Simple(clip) if clip.looped)
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Tuning for cycle retention and amortized timeline growth.
pub struct SchedulerConfig {
    /// Trailing cycles kept registered behind the current one.
    pub retention_window: u64,
    /// Cycles of timeline length added per extension.
    pub extend_batch_cycles: u64,
    /// Extension triggers when fewer than this many cycles of declared
    /// timeline remain.
    pub extend_margin_cycles: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retention_window: 3,
            extend_batch_cycles: 30,
            extend_margin_cycles: 3,
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations that would break retention or growth math.
    pub fn validate(&self) -> MarionetteResult<()> {
        if self.retention_window == 0 {
            return Err(MarionetteError::validation("retention_window must be >= 1"));
        }
        if self.extend_margin_cycles == 0 {
            return Err(MarionetteError::validation(
                "extend_margin_cycles must be >= 1",
            ));
        }
        if self.extend_batch_cycles <= self.extend_margin_cycles {
            return Err(MarionetteError::validation(
                "extend_batch_cycles must exceed extend_margin_cycles",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// What one scheduler tick did.
pub struct TickReport {
    /// Cycle index the global frame falls in, relative to plan start.
    pub current_cycle: u64,
    /// True when the tick moved into a later cycle than last observed.
    pub crossed_boundary: bool,
    /// Cycles scheduled this tick (more than one after a hitch).
    pub cycles_added: u64,
    /// Cycles evicted this tick.
    pub cycles_evicted: u64,
}

struct ActivePlan {
    spec: PlaySpec,
    start: FrameIndex,
    cycle_duration: u64,
    /// Highest cycle that may ever be scheduled; `None` loops forever.
    max_cycle: Option<u64>,
    last_added: u64,
    first_active: u64,
    observed_cycle: u64,
    cycles: BTreeMap<u64, Vec<SpanId>>,
    /// Natural end of the primary track; `None` while looping indefinitely.
    plan_end: Option<FrameIndex>,
}

/// Just-in-time cycle scheduler for the active plan.
///
/// Keeps exactly the cycles in `[first_active, last_added]` registered with
/// the compositor: the current cycle is scheduled the tick it is entered,
/// and cycles older than the retention window are evicted, so memory stays
/// bounded for clips that loop indefinitely.
pub struct CycleScheduler {
    config: SchedulerConfig,
    plan: Option<ActivePlan>,
}

impl CycleScheduler {
    /// Create an idle scheduler.
    pub fn new(config: SchedulerConfig) -> MarionetteResult<Self> {
        config.validate()?;
        Ok(Self { config, plan: None })
    }

    /// Whether a plan is currently scheduled.
    pub fn is_active(&self) -> bool {
        self.plan.is_some()
    }

    /// Clip that identifies the active plan.
    pub fn current_clip(&self) -> Option<&Arc<LoadedClip>> {
        self.plan.as_ref().map(|p| p.spec.primary_clip())
    }

    /// Whether the active plan loops indefinitely.
    pub fn is_looping(&self) -> bool {
        self.plan.as_ref().is_some_and(|p| p.max_cycle.is_none())
    }

    /// Global frame the active plan started at.
    pub fn start_frame(&self) -> Option<FrameIndex> {
        self.plan.as_ref().map(|p| p.start)
    }

    /// Natural end of a bounded plan (primary track end, excluding any
    /// overlay tail hold).
    pub fn plan_end(&self) -> Option<FrameIndex> {
        self.plan.as_ref().and_then(|p| p.plan_end)
    }

    /// Frames left until a bounded plan's natural end, zero once passed.
    pub fn frames_until_end(&self, now: FrameIndex) -> Option<u64> {
        self.plan_end().map(|end| end.since(now))
    }

    /// Cycle index `now` falls in for the active plan.
    pub fn current_cycle(&self, now: FrameIndex) -> Option<u64> {
        self.plan
            .as_ref()
            .map(|p| now.since(p.start) / p.cycle_duration)
    }

    /// Registered cycle bounds `(first_active, last_added)`.
    pub fn registered_cycle_range(&self) -> Option<(u64, u64)> {
        self.plan.as_ref().map(|p| (p.first_active, p.last_added))
    }

    /// All span ids the active plan has registered.
    pub fn span_ids(&self) -> Vec<SpanId> {
        match &self.plan {
            Some(plan) => plan.cycles.values().flatten().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Drop the plan bookkeeping and hand its span ids to the caller, which
    /// takes over their lifecycle (crossfade retirement or removal).
    pub fn take_span_ids(&mut self) -> Vec<SpanId> {
        match self.plan.take() {
            Some(plan) => plan.cycles.into_values().flatten().collect(),
            None => Vec::new(),
        }
    }

    /// Begin a plan at `now`, synchronously scheduling cycle 0.
    ///
    /// `lead_in` is the crossfade-in applied when switching from a previous
    /// clip; pass `None` for the very first clip ever played.
    pub fn start(
        &mut self,
        comp: &mut TimelineCompositor,
        rng: &mut Rng64,
        spec: PlaySpec,
        now: FrameIndex,
        lead_in: Option<EaseWindow>,
    ) -> MarionetteResult<()> {
        if self.plan.is_some() {
            return Err(MarionetteError::scheduling(
                "a plan is already active; retire it before starting another",
            ));
        }
        let primary = spec.primary_clip().clone();
        let cycle_duration = match &spec {
            PlaySpec::Simple(clip) => clip.cycle_duration_frames(),
            PlaySpec::Composite(c) => c.primary.duration_frames,
        };
        let max_cycle = if spec.is_looping() { None } else { Some(0) };
        let plan_end = max_cycle.map(|_| now.advance(primary.duration_frames));

        let mut plan = ActivePlan {
            spec,
            start: now,
            cycle_duration,
            max_cycle,
            last_added: 0,
            first_active: 0,
            observed_cycle: 0,
            cycles: BTreeMap::new(),
            plan_end,
        };
        Self::add_cycle(&mut plan, comp, rng, 0, lead_in)?;
        Self::ensure_capacity(&plan, comp, &self.config);
        debug!(clip = %primary.id, start = now.0, looping = max_cycle.is_none(), "plan started");
        self.plan = Some(plan);
        Ok(())
    }

    /// Advance the plan to `now`: schedule newly entered cycles (catching up
    /// after hitches), evict cycles past the retention window, and grow the
    /// declared timeline in batches when it nears exhaustion.
    pub fn tick(
        &mut self,
        comp: &mut TimelineCompositor,
        rng: &mut Rng64,
        now: FrameIndex,
    ) -> MarionetteResult<TickReport> {
        let Some(plan) = self.plan.as_mut() else {
            return Ok(TickReport::default());
        };
        let current = now.since(plan.start) / plan.cycle_duration;
        let mut report = TickReport {
            current_cycle: current,
            crossed_boundary: current > plan.observed_cycle,
            ..TickReport::default()
        };

        while plan.last_added < current
            && plan.max_cycle.is_none_or(|max| plan.last_added < max)
        {
            let next = plan.last_added + 1;
            Self::add_cycle(plan, comp, rng, next, None)?;
            report.cycles_added += 1;
        }

        while plan.first_active + self.config.retention_window <= current
            && plan.first_active < plan.last_added
        {
            if let Some(ids) = plan.cycles.remove(&plan.first_active) {
                for id in ids {
                    comp.remove(id);
                }
            }
            plan.first_active += 1;
            report.cycles_evicted += 1;
        }

        Self::ensure_capacity(plan, comp, &self.config);
        plan.observed_cycle = current;
        Ok(report)
    }

    fn add_cycle(
        plan: &mut ActivePlan,
        comp: &mut TimelineCompositor,
        rng: &mut Rng64,
        cycle: u64,
        lead_in: Option<EaseWindow>,
    ) -> MarionetteResult<()> {
        let cycle_start = plan.start.advance(cycle * plan.cycle_duration);
        let mut ids = Vec::new();
        match &plan.spec {
            PlaySpec::Simple(clip) => {
                let mut span = Span::new(ClipView::full(clip.clone()), cycle_start);
                // Loop-boundary blends exist only when cycles actually
                // overlap; exact back-to-back loops skip them.
                if clip.looped && clip.loop_transition {
                    span = span.with_ease_out(EaseWindow::crossfade(clip.transition_frames));
                    if cycle > 0 {
                        span = span.with_ease_in(EaseWindow::crossfade(clip.transition_frames));
                    }
                }
                if cycle == 0
                    && let Some(window) = lead_in
                {
                    span = span.with_ease_in(window);
                }
                ids.push(comp.add(span)?);
            }
            PlaySpec::Composite(spec) => {
                for span in build_composite_spans(spec, cycle_start, lead_in, rng)? {
                    ids.push(comp.add(span)?);
                }
            }
        }
        plan.cycles.insert(cycle, ids);
        plan.last_added = cycle;
        Ok(())
    }

    fn ensure_capacity(plan: &ActivePlan, comp: &mut TimelineCompositor, config: &SchedulerConfig) {
        match plan.plan_end {
            // Bounded plans declare their full extent up front, with one
            // cycle of slack for overlay tails and the outgoing crossfade.
            Some(end) => comp.extend_timeline(end.advance(plan.cycle_duration)),
            None => {
                let margin_end = plan
                    .start
                    .advance((plan.last_added + config.extend_margin_cycles) * plan.cycle_duration);
                if comp.timeline_len().0 < margin_end.0 {
                    let target = plan.start.advance(
                        (plan.last_added + config.extend_batch_cycles) * plan.cycle_duration,
                    );
                    comp.extend_timeline(target);
                    debug!(to = target.0, "timeline extended");
                }
            }
        }
    }
}

impl std::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("CycleScheduler");
        match &self.plan {
            Some(plan) => d
                .field("clip", &plan.spec.primary_clip().id)
                .field("cycles", &(plan.first_active, plan.last_added)),
            None => d.field("plan", &"idle"),
        }
        .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/cycles.rs"]
mod tests;
