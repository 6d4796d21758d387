use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::error::{MarionetteError, MarionetteResult};

/// Category name used for caller-supplied clips that live outside the catalog.
pub const TRANSIENT_CATEGORY: &str = "transient";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Catalog descriptor for one motion clip, as authored in the registry JSON.
///
/// Duration and channel layout are unknown until the resource is resolved;
/// see [`crate::catalog::loader::ClipCache`].
pub struct ClipSpec {
    /// Stable clip id, unique across the whole catalog.
    pub id: String,
    /// Human-readable name for logs.
    pub name: String,
    /// Resource reference handed to the loading collaborator.
    pub source: String,
    /// Whether the clip repeats indefinitely until switched away.
    #[serde(rename = "loop", default)]
    pub looped: bool,
    /// Whether consecutive cycles of this clip blend across a transition
    /// window instead of butting exactly.
    #[serde(default)]
    pub loop_transition: bool,
    /// Transition window length in frames, used for loop blends and for
    /// crossfades into and out of this clip.
    #[serde(default = "default_transition_frames")]
    pub transition_frames: u64,
    /// Default blend weight for spans of this clip.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_transition_frames() -> u64 {
    30
}

fn default_weight() -> f64 {
    1.0
}

impl ClipSpec {
    pub(crate) fn validate(&self, category: &str) -> MarionetteResult<()> {
        if self.id.trim().is_empty() {
            return Err(MarionetteError::validation(format!(
                "clip in category '{category}' has an empty id"
            )));
        }
        validate_source(&self.source, &self.id)?;
        if self.loop_transition && self.transition_frames == 0 {
            return Err(MarionetteError::validation(format!(
                "clip '{}' sets loop_transition but transition_frames is 0",
                self.id
            )));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(MarionetteError::validation(format!(
                "clip '{}' weight must be finite and > 0",
                self.id
            )));
        }
        Ok(())
    }
}

fn validate_source(source: &str, clip_id: &str) -> MarionetteResult<()> {
    if source.trim().is_empty() {
        return Err(MarionetteError::validation(format!(
            "clip '{clip_id}' source must be non-empty"
        )));
    }
    let s = source.replace('\\', "/");
    for part in s.split('/') {
        if part == ".." {
            return Err(MarionetteError::validation(format!(
                "clip '{clip_id}' source must not contain '..'"
            )));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
/// Static catalog mapping category names to ordered clip descriptor lists.
///
/// Built once at startup, then read-only. The list order matters: behavior
/// descriptors that use first-candidate selection take index 0.
pub struct ClipRegistry {
    /// Category name to ordered clip descriptors.
    pub categories: BTreeMap<String, Vec<ClipSpec>>,
}

impl ClipRegistry {
    /// Parse and validate a registry from JSON.
    pub fn from_json(json: &str) -> MarionetteResult<Self> {
        let reg: Self = serde_json::from_str(json)
            .map_err(|e| MarionetteError::validation(format!("registry JSON: {e}")))?;
        reg.validate()?;
        Ok(reg)
    }

    /// Check catalog-wide invariants: non-empty categories and unique clip ids.
    pub fn validate(&self) -> MarionetteResult<()> {
        let mut seen = std::collections::HashSet::new();
        for (category, clips) in &self.categories {
            if category.trim().is_empty() {
                return Err(MarionetteError::validation("category name must be non-empty"));
            }
            if category == TRANSIENT_CATEGORY {
                return Err(MarionetteError::validation(format!(
                    "category name '{TRANSIENT_CATEGORY}' is reserved"
                )));
            }
            if clips.is_empty() {
                return Err(MarionetteError::validation(format!(
                    "category '{category}' has no clips"
                )));
            }
            for spec in clips {
                spec.validate(category)?;
                if !seen.insert(spec.id.as_str()) {
                    return Err(MarionetteError::validation(format!(
                        "duplicate clip id '{}'",
                        spec.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ordered clip descriptors of `category`, if it exists.
    pub fn clips_in(&self, category: &str) -> Option<&[ClipSpec]> {
        self.categories.get(category).map(|v| v.as_slice())
    }

    /// Whether `category` exists in the catalog.
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Find a clip descriptor by id, returning its category as well.
    pub fn spec_by_id(&self, id: &str) -> Option<(&str, &ClipSpec)> {
        for (category, clips) in &self.categories {
            if let Some(spec) = clips.iter().find(|c| c.id == id) {
                return Some((category.as_str(), spec));
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Track channel counts resolved by the loading collaborator.
pub struct ChannelCounts {
    /// Skeletal bone tracks.
    pub bone: u32,
    /// Morph-target (facial) tracks.
    pub morph: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Coarse channel grouping used when projecting a clip view.
pub enum ChannelGroup {
    /// Skeletal body motion.
    Body,
    /// Morph-target facial motion.
    Face,
}

#[derive(Clone, Debug, PartialEq)]
/// A fully resolved clip. Immutable once built; shared via `Arc`.
pub struct LoadedClip {
    /// Stable clip id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Category the clip was selected from.
    pub category: String,
    /// Intrinsic duration in frames.
    pub duration_frames: u64,
    /// Whether the clip repeats indefinitely.
    pub looped: bool,
    /// Whether consecutive cycles blend across the transition window.
    pub loop_transition: bool,
    /// Transition window length in frames.
    pub transition_frames: u64,
    /// Default blend weight for spans of this clip.
    pub weight: f64,
    /// Resolved track channel counts.
    pub channels: ChannelCounts,
}

impl LoadedClip {
    /// Post-load invariants that cannot be checked from the descriptor alone.
    pub fn validate(&self) -> MarionetteResult<()> {
        if self.duration_frames == 0 {
            return Err(MarionetteError::validation(format!(
                "clip '{}' resolved with zero duration",
                self.id
            )));
        }
        if self.loop_transition && self.duration_frames <= self.transition_frames {
            return Err(MarionetteError::validation(format!(
                "clip '{}' duration {} does not exceed its transition window {}",
                self.id, self.duration_frames, self.transition_frames
            )));
        }
        Ok(())
    }

    /// Frames one loop iteration occupies on the timeline. Loop-transition
    /// clips overlap successive cycles by the transition window.
    pub fn cycle_duration_frames(&self) -> u64 {
        if self.loop_transition {
            self.duration_frames - self.transition_frames
        } else {
            self.duration_frames
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Which channel groups a clip view exposes to the compositor.
pub enum ChannelFilter {
    /// Every channel the clip carries.
    #[default]
    All,
    /// Everything except one group.
    Exclude(ChannelGroup),
    /// Exactly one group.
    Only(ChannelGroup),
}

#[derive(Clone, Debug, PartialEq)]
/// An immutable projection of a clip: same underlying track buffers, with
/// some channel groups masked out. Views are cheap to clone and never modify
/// the clip they reference.
pub struct ClipView {
    clip: Arc<LoadedClip>,
    filter: ChannelFilter,
}

impl ClipView {
    /// View exposing every channel.
    pub fn full(clip: Arc<LoadedClip>) -> Self {
        Self {
            clip,
            filter: ChannelFilter::All,
        }
    }

    /// View exposing only `group`.
    pub fn only(clip: Arc<LoadedClip>, group: ChannelGroup) -> Self {
        Self {
            clip,
            filter: ChannelFilter::Only(group),
        }
    }

    /// View exposing everything except `group`.
    pub fn excluding(clip: Arc<LoadedClip>, group: ChannelGroup) -> Self {
        Self {
            clip,
            filter: ChannelFilter::Exclude(group),
        }
    }

    /// The underlying clip.
    pub fn clip(&self) -> &Arc<LoadedClip> {
        &self.clip
    }

    /// Active channel mask.
    pub fn filter(&self) -> ChannelFilter {
        self.filter
    }

    /// Clip id convenience accessor.
    pub fn id(&self) -> &str {
        &self.clip.id
    }

    /// Intrinsic clip duration in frames.
    pub fn duration_frames(&self) -> u64 {
        self.clip.duration_frames
    }

    /// Whether the view exposes any channels of `group` (the clip must carry
    /// them and the filter must not mask them).
    pub fn carries(&self, group: ChannelGroup) -> bool {
        let present = match group {
            ChannelGroup::Body => self.clip.channels.bone > 0,
            ChannelGroup::Face => self.clip.channels.morph > 0,
        };
        let allowed = match self.filter {
            ChannelFilter::All => true,
            ChannelFilter::Exclude(g) => g != group,
            ChannelFilter::Only(g) => g == group,
        };
        present && allowed
    }
}

#[derive(Clone, Debug, PartialEq)]
/// How a caller names a clip to play.
pub enum ClipRef {
    /// Catalog clip by id.
    Id(String),
    /// First clip of a catalog category.
    Category(String),
    /// Caller-supplied descriptor outside the catalog (e.g. a generated
    /// lip-sync track), cached under its id like any other clip.
    Transient(ClipSpec),
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/model.rs"]
mod tests;
