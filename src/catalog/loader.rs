use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::catalog::model::{ChannelCounts, ClipSpec, LoadedClip};
use crate::foundation::error::{MarionetteError, MarionetteResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Raw data a resolved clip resource yields. Track buffers stay with the
/// loading collaborator; this core only needs the shape.
pub struct ClipPayload {
    /// Intrinsic duration in frames.
    pub duration_frames: u64,
    /// Track channel counts.
    pub channels: ChannelCounts,
}

/// Resolves clip resource references into payloads. Implemented by the
/// loading collaborator; `resolve` runs on a background thread and may block.
pub trait ClipSource: Send + Sync + 'static {
    /// Resolve `source` for clip `id`.
    fn resolve(&self, id: &str, source: &str) -> anyhow::Result<ClipPayload>;
}

#[derive(Clone, Debug)]
/// Outcome of a single `request` call.
pub enum LoadState {
    /// Already resolved; the shared clip is returned directly.
    Cached(Arc<LoadedClip>),
    /// An identical load is already in flight; this request joins it.
    Pending,
    /// A new background load was started.
    Started,
}

#[derive(Debug)]
/// Completion reported by `poll`.
pub enum LoadEvent {
    /// A clip resolved and is now permanently cached.
    Loaded(Arc<LoadedClip>),
    /// A load failed. The in-flight entry is cleared so a retry is possible.
    Failed {
        /// Clip id the failure belongs to.
        id: String,
        /// What went wrong.
        error: MarionetteError,
    },
}

struct PendingLoad {
    spec: ClipSpec,
    category: String,
    requests: u32,
}

struct LoadResult {
    id: String,
    outcome: anyhow::Result<ClipPayload>,
}

/// Async clip loader with dedup-on-id and permanent post-success caching.
///
/// `request` never blocks: it either returns the cached clip, joins an
/// in-flight load, or spawns one. Completions are collected by calling
/// `poll` from the tick. Failures clear the in-flight entry (and are never
/// cached) so the same id can be requested again.
pub struct ClipCache {
    source: Arc<dyn ClipSource>,
    cache: HashMap<String, Arc<LoadedClip>>,
    pending: HashMap<String, PendingLoad>,
    results_tx: Sender<LoadResult>,
    results_rx: Receiver<LoadResult>,
}

impl ClipCache {
    /// Create an empty cache over the given source.
    pub fn new(source: Arc<dyn ClipSource>) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            source,
            cache: HashMap::new(),
            pending: HashMap::new(),
            results_tx,
            results_rx,
        }
    }

    /// Cached clip for `id`, if resolved.
    pub fn get(&self, id: &str) -> Option<Arc<LoadedClip>> {
        self.cache.get(id).cloned()
    }

    /// Whether a load for `id` is currently in flight.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Pre-populate the cache with an already resolved clip (warm starts).
    pub fn insert(&mut self, clip: Arc<LoadedClip>) {
        self.cache.insert(clip.id.clone(), clip);
    }

    /// Ask for a clip. Deduplicates concurrent requests for the same id onto
    /// one underlying fetch.
    pub fn request(&mut self, category: &str, spec: &ClipSpec) -> LoadState {
        if let Some(clip) = self.cache.get(&spec.id) {
            return LoadState::Cached(clip.clone());
        }
        if let Some(pending) = self.pending.get_mut(&spec.id) {
            pending.requests += 1;
            debug!(clip = %spec.id, shared = pending.requests, "load already in flight");
            return LoadState::Pending;
        }

        self.pending.insert(
            spec.id.clone(),
            PendingLoad {
                spec: spec.clone(),
                category: category.to_string(),
                requests: 1,
            },
        );
        let source = self.source.clone();
        let tx = self.results_tx.clone();
        let id = spec.id.clone();
        let resource = spec.source.clone();
        debug!(clip = %id, resource = %resource, "load started");
        thread::spawn(move || {
            let outcome = source.resolve(&id, &resource);
            // The receiver may be gone after disposal; a stale completion is
            // simply dropped.
            let _ = tx.send(LoadResult { id, outcome });
        });
        LoadState::Started
    }

    /// Collect finished loads. Call once per tick.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let results: Vec<LoadResult> = self.results_rx.try_iter().collect();
        let mut events = Vec::with_capacity(results.len());
        for result in results {
            let Some(pending) = self.pending.remove(&result.id) else {
                continue;
            };
            match result.outcome {
                Ok(payload) => match self.build_clip(pending, payload) {
                    Ok(clip) => {
                        debug!(clip = %clip.id, frames = clip.duration_frames, "clip resolved");
                        self.cache.insert(clip.id.clone(), clip.clone());
                        events.push(LoadEvent::Loaded(clip));
                    }
                    Err(error) => {
                        warn!(clip = %result.id, error = %error, "resolved clip failed validation");
                        events.push(LoadEvent::Failed {
                            id: result.id,
                            error,
                        });
                    }
                },
                Err(e) => {
                    warn!(clip = %result.id, error = %e, "clip load failed");
                    events.push(LoadEvent::Failed {
                        id: result.id.clone(),
                        error: MarionetteError::load(format!("{}: {e:#}", result.id)),
                    });
                }
            }
        }
        events
    }

    fn build_clip(
        &self,
        pending: PendingLoad,
        payload: ClipPayload,
    ) -> MarionetteResult<Arc<LoadedClip>> {
        let clip = Arc::new(LoadedClip {
            id: pending.spec.id,
            name: pending.spec.name,
            category: pending.category,
            duration_frames: payload.duration_frames,
            looped: pending.spec.looped,
            loop_transition: pending.spec.loop_transition,
            transition_frames: pending.spec.transition_frames,
            weight: pending.spec.weight,
            channels: payload.channels,
        });
        clip.validate()?;
        Ok(clip)
    }
}

impl std::fmt::Debug for ClipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipCache")
            .field("cached", &self.cache.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/loader.rs"]
mod tests;
