use std::sync::Arc;

use crate::animation::rng::Rng64;
use crate::catalog::model::{ClipRegistry, ClipSpec, LoadedClip};
use crate::foundation::error::{MarionetteError, MarionetteResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
/// Behavioral states of an animated character.
pub enum PerformanceState {
    /// One-shot greeting played when a session starts.
    Intro,
    /// Default looping behavior between requests.
    Idle,
    /// Looping "working on it" behavior.
    Busy,
    /// An utterance is playing (lip-sync composite or talking loop).
    Speaking,
    /// Holding pose between utterances of one conversation.
    SpeakingHold,
    /// One-shot celebration.
    Celebrating,
    /// A caller-supplied composite block is playing.
    Composite,
}

impl PerformanceState {
    /// Every state, in declaration order.
    pub const ALL: [PerformanceState; 7] = [
        PerformanceState::Intro,
        PerformanceState::Idle,
        PerformanceState::Busy,
        PerformanceState::Speaking,
        PerformanceState::SpeakingHold,
        PerformanceState::Celebrating,
        PerformanceState::Composite,
    ];

    /// States reachable from `self`. Self-transitions are always permitted
    /// (they restart the state's performance) and are not listed here.
    pub fn allowed_targets(self) -> &'static [PerformanceState] {
        use PerformanceState::*;
        match self {
            Intro => &[Idle],
            Idle => &[Busy, Speaking, SpeakingHold, Celebrating, Composite],
            Busy => &[Idle, Speaking, SpeakingHold, Celebrating, Composite],
            Speaking => &[Idle, Busy, SpeakingHold, Celebrating, Composite],
            SpeakingHold => &[Idle, Busy, Speaking, Celebrating, Composite],
            Celebrating => &[Idle, Busy, Speaking, SpeakingHold, Composite],
            Composite => &[Idle, Busy, Speaking, SpeakingHold, Celebrating],
        }
    }

    /// Whether the static transition table permits `self -> target`.
    pub fn can_transition_to(self, target: PerformanceState) -> bool {
        self == target || self.allowed_targets().contains(&target)
    }
}

impl std::fmt::Display for PerformanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Intro => "intro",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Speaking => "speaking",
            Self::SpeakingHold => "speaking_hold",
            Self::Celebrating => "celebrating",
            Self::Composite => "composite",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// How a behavior picks among its candidate clips.
pub enum SelectionPolicy {
    /// Always the first candidate, in category declaration order.
    First,
    /// Weight-proportional random pick across every candidate.
    #[default]
    Random,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Whether a state's performance loops, overriding the clip's own flag.
pub enum LoopPolicy {
    /// Use the clip's catalog loop flag unchanged.
    #[default]
    FollowClip,
    /// Cycle until switched away, whatever the catalog says.
    Loop,
    /// Play exactly once.
    Once,
}

impl LoopPolicy {
    /// Apply the policy to a resolved clip, returning a copy with the loop
    /// flag overridden when they disagree. Clip data is metadata-only, so the
    /// copy is cheap and the original stays untouched.
    pub fn apply(self, clip: Arc<LoadedClip>) -> Arc<LoadedClip> {
        let looped = match self {
            Self::FollowClip => return clip,
            Self::Loop => true,
            Self::Once => false,
        };
        if clip.looped == looped {
            clip
        } else {
            Arc::new(LoadedClip {
                looped,
                ..(*clip).clone()
            })
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Playback policy for one behavioral state.
pub struct StateBehavior {
    /// Candidate clip categories, tried in declaration order. Categories
    /// missing from the catalog are skipped at selection time.
    pub categories: Vec<String>,
    /// How a clip is picked among the candidates.
    #[serde(default)]
    pub selection: SelectionPolicy,
    /// Loop override for the selected clip.
    #[serde(default)]
    pub loop_policy: LoopPolicy,
    /// Frames between variety switches to another candidate, if any.
    #[serde(default)]
    pub auto_switch_frames: Option<u64>,
    /// State entered when a non-looping performance finishes with nothing
    /// queued. Defaults to [`PerformanceState::Idle`] when absent.
    #[serde(default)]
    pub auto_return: Option<PerformanceState>,
}

impl StateBehavior {
    fn validate(&self, state: PerformanceState) -> MarionetteResult<()> {
        if self.categories.is_empty() {
            return Err(MarionetteError::validation(format!(
                "behavior for state '{state}' has no candidate categories"
            )));
        }
        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(MarionetteError::validation(format!(
                "behavior for state '{state}' has an empty category name"
            )));
        }
        if self.auto_switch_frames == Some(0) {
            return Err(MarionetteError::validation(format!(
                "behavior for state '{state}' auto_switch_frames must be > 0"
            )));
        }
        if let Some(target) = self.auto_return
            && !state.can_transition_to(target)
        {
            return Err(MarionetteError::validation(format!(
                "behavior for state '{state}' auto-returns to '{target}', \
                 which the transition table forbids"
            )));
        }
        Ok(())
    }

    /// Candidates this behavior can currently choose from.
    pub fn candidates<'r>(&'r self, registry: &'r ClipRegistry) -> Vec<(&'r str, &'r ClipSpec)> {
        self.categories
            .iter()
            .filter_map(|c| registry.clips_in(c).map(|clips| (c.as_str(), clips)))
            .flat_map(|(category, clips)| clips.iter().map(move |s| (category, s)))
            .collect()
    }

    /// Pick a clip for this behavior. `exclude` drops one clip id from the
    /// candidates (variety switching); it is ignored when honoring it would
    /// leave nothing to pick.
    pub fn select_clip(
        &self,
        registry: &ClipRegistry,
        rng: &mut Rng64,
        exclude: Option<&str>,
    ) -> MarionetteResult<(String, ClipSpec)> {
        let all = self.candidates(registry);
        if all.is_empty() {
            return Err(MarionetteError::missing_clip(format!(
                "no candidate clips in categories [{}]",
                self.categories.join(", ")
            )));
        }
        let filtered: Vec<_> = match exclude {
            Some(id) if all.iter().any(|(_, s)| s.id != id) => {
                all.iter().copied().filter(|(_, s)| s.id != id).collect()
            }
            _ => all,
        };
        let (category, spec) = match self.selection {
            SelectionPolicy::First => filtered[0],
            SelectionPolicy::Random => {
                let weights: Vec<f64> = filtered.iter().map(|(_, s)| s.weight).collect();
                filtered[rng.pick_weighted(&weights)]
            }
        };
        Ok((category.to_string(), spec.clone()))
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Per-state playback policies, one record per [`PerformanceState`].
///
/// Built once and validated before a director starts using it; lookups after
/// that are infallible field reads.
pub struct BehaviorTable {
    /// Policy for [`PerformanceState::Intro`].
    pub intro: StateBehavior,
    /// Policy for [`PerformanceState::Idle`].
    pub idle: StateBehavior,
    /// Policy for [`PerformanceState::Busy`].
    pub busy: StateBehavior,
    /// Policy for [`PerformanceState::Speaking`].
    pub speaking: StateBehavior,
    /// Policy for [`PerformanceState::SpeakingHold`].
    pub speaking_hold: StateBehavior,
    /// Policy for [`PerformanceState::Celebrating`].
    pub celebrating: StateBehavior,
    /// Policy for [`PerformanceState::Composite`].
    pub composite: StateBehavior,
}

impl BehaviorTable {
    /// Conventional table over the standard catalog category names.
    pub fn standard() -> Self {
        Self {
            intro: StateBehavior {
                categories: vec!["intro".to_string()],
                selection: SelectionPolicy::First,
                loop_policy: LoopPolicy::Once,
                auto_switch_frames: None,
                auto_return: Some(PerformanceState::Idle),
            },
            idle: StateBehavior {
                categories: vec!["idle".to_string()],
                selection: SelectionPolicy::Random,
                loop_policy: LoopPolicy::Loop,
                auto_switch_frames: Some(600),
                auto_return: None,
            },
            busy: StateBehavior {
                categories: vec!["busy".to_string()],
                selection: SelectionPolicy::Random,
                loop_policy: LoopPolicy::Loop,
                auto_switch_frames: None,
                auto_return: None,
            },
            speaking: StateBehavior {
                categories: vec!["talking".to_string()],
                selection: SelectionPolicy::Random,
                loop_policy: LoopPolicy::Loop,
                auto_switch_frames: None,
                auto_return: Some(PerformanceState::SpeakingHold),
            },
            speaking_hold: StateBehavior {
                categories: vec!["hold".to_string(), "idle".to_string()],
                selection: SelectionPolicy::Random,
                loop_policy: LoopPolicy::Loop,
                auto_switch_frames: None,
                auto_return: None,
            },
            celebrating: StateBehavior {
                categories: vec!["celebrate".to_string()],
                selection: SelectionPolicy::Random,
                loop_policy: LoopPolicy::Once,
                auto_switch_frames: None,
                auto_return: Some(PerformanceState::Idle),
            },
            composite: StateBehavior {
                categories: vec!["idle".to_string()],
                selection: SelectionPolicy::Random,
                loop_policy: LoopPolicy::Loop,
                auto_switch_frames: None,
                auto_return: Some(PerformanceState::Idle),
            },
        }
    }

    /// Parse and validate a table from JSON.
    pub fn from_json(json: &str) -> MarionetteResult<Self> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| MarionetteError::validation(format!("behavior table JSON: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    /// Check every record's structural invariants.
    pub fn validate(&self) -> MarionetteResult<()> {
        for state in PerformanceState::ALL {
            self.behavior(state).validate(state)?;
        }
        Ok(())
    }

    /// The record for `state`.
    pub fn behavior(&self, state: PerformanceState) -> &StateBehavior {
        match state {
            PerformanceState::Intro => &self.intro,
            PerformanceState::Idle => &self.idle,
            PerformanceState::Busy => &self.busy,
            PerformanceState::Speaking => &self.speaking,
            PerformanceState::SpeakingHold => &self.speaking_hold,
            PerformanceState::Celebrating => &self.celebrating,
            PerformanceState::Composite => &self.composite,
        }
    }
}

impl Default for BehaviorTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/director/behavior.rs"]
mod tests;
