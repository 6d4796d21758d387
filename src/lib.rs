//! Marionette is the animation orchestration core of an interactive
//! character renderer.
//!
//! The host owns the render loop, the skeleton and the pixels; marionette
//! owns everything between "the user asked the character to wave" and the
//! set of blended clip spans the renderer must evaluate this frame:
//!
//! 1. **Catalog**: a JSON registry of clip descriptors grouped by category
//!    (`ClipRegistry`), resolved into shared `LoadedClip`s by a
//!    deduplicating background loader (`ClipCache`).
//! 2. **Timeline**: `TimelineCompositor` keeps the authoritative span set
//!    and mirrors every change into the host's [`SpanSink`].
//! 3. **Scheduling**: `CycleScheduler` keeps looping clips covered one
//!    cycle at a time, `retire_spans` crossfades performances out, and
//!    composite blocks are stitched by `stitch_segments`.
//! 4. **Direction**: [`Director`] ties it together behind a behavioral
//!    state machine and a FIFO request queue, advanced by one
//!    [`Director::tick`] per rendered frame.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: every random pick flows through one
//!   seeded generator; a seed, a catalog and a call sequence replay the
//!   same performance.
//! - **No blocking on the render thread**: clip IO runs on background
//!   threads and is only observed from `tick`.
//! - **Never panic the loop**: `tick` reports problems as events and log
//!   lines, not errors.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod animation;
mod catalog;
mod director;
mod foundation;
mod schedule;
mod timeline;

pub use animation::ease::Ease;
pub use animation::rng::Rng64;
pub use catalog::loader::{ClipCache, ClipPayload, ClipSource, LoadEvent, LoadState};
pub use catalog::model::{
    ChannelCounts, ChannelFilter, ChannelGroup, ClipRef, ClipRegistry, ClipSpec, ClipView,
    LoadedClip, TRANSIENT_CATEGORY,
};
pub use director::behavior::{
    BehaviorTable, LoopPolicy, PerformanceState, SelectionPolicy, StateBehavior,
};
pub use director::queue::{PlayRequest, QueueStatus, RequestQueue};
pub use director::stage::{Director, DirectorConfig, StageEvent};
pub use foundation::error::{MarionetteError, MarionetteResult};
pub use foundation::frame::{Fps, FrameIndex, FrameRange};
pub use schedule::crossfade::{RemovalQueue, RetireReport, retire_spans};
pub use schedule::cycles::{CycleScheduler, PlaySpec, SchedulerConfig, TickReport};
pub use schedule::stitch::{
    CompositeSpec, CompositeWeights, StitchedSegment, build_composite_spans, stitch_segments,
};
pub use timeline::compositor::{NullSink, SpanSink, TimelineCompositor};
pub use timeline::span::{EaseWindow, Span, SpanId};
