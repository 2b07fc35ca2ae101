//! Per-report state machine.
//!
//! A run starts in [`PipelineState::Start`], moves through every [`Stage`] in
//! order and ends in `Succeeded` or `Failed`. [`transition`] is the only way
//! to change state; it rejects skipped stages and moves out of terminal states.

use std::fmt;

use serde::Serialize;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Source page downloaded.
    Fetched,
    /// Site profile computed.
    Profiled,
    /// Article extracted.
    Extracted,
    /// Images downloaded and embedded.
    ImagesProcessed,
    /// PDF rendered.
    Rendered,
    /// Excerpt and attachment name built.
    Packaged,
}

impl Stage {
    /// All stages in order.
    pub const ORDER: [Self; 6] = [
        Self::Fetched,
        Self::Profiled,
        Self::Extracted,
        Self::ImagesProcessed,
        Self::Rendered,
        Self::Packaged,
    ];

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Profiled => "profiled",
            Self::Extracted => "extracted",
            Self::ImagesProcessed => "images_processed",
            Self::Rendered => "rendered",
            Self::Packaged => "packaged",
        }
    }

    /// Stage following this one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Fetched => Some(Self::Profiled),
            Self::Profiled => Some(Self::Extracted),
            Self::Extracted => Some(Self::ImagesProcessed),
            Self::ImagesProcessed => Some(Self::Rendered),
            Self::Rendered => Some(Self::Packaged),
            Self::Packaged => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing done yet.
    Start,
    /// The given stage completed.
    Completed(Stage),
    /// Every stage completed.
    Succeeded,
    /// A stage failed without recovery.
    Failed {
        /// Stage that was being attempted.
        stage: Stage,
        /// Root cause.
        reason: String,
    },
}

impl PipelineState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }

    /// The stage a run in this state attempts next.
    #[must_use]
    pub const fn pending_stage(&self) -> Option<Stage> {
        match self {
            Self::Start => Some(Stage::Fetched),
            Self::Completed(stage) => stage.next(),
            Self::Succeeded | Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Completed(stage) => write!(f, "{stage}"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed { stage, reason } => write!(f, "failed at {stage}: {reason}"),
        }
    }
}

/// Input to [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A stage finished successfully.
    Completed(Stage),
    /// The pending stage failed.
    Failed(String),
    /// All stages done.
    Finish,
}

/// A transition that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} on {event}")]
pub struct TransitionError {
    /// State before the event.
    pub from: String,
    /// Rejected event.
    pub event: String,
}

/// Apply `event` to `state`.
///
/// # Errors
///
/// [`TransitionError`] when `event` completes a stage other than the pending
/// one, finishes before `Packaged`, or arrives in a terminal state.
pub fn transition(state: &PipelineState, event: Event) -> Result<PipelineState, TransitionError> {
    let pending = state.pending_stage();
    let next = match (&event, pending) {
        (Event::Completed(stage), Some(expected)) if *stage == expected => Some(PipelineState::Completed(*stage)),
        (Event::Failed(reason), Some(stage)) => Some(PipelineState::Failed { stage, reason: reason.clone() }),
        (Event::Finish, None) if *state == PipelineState::Completed(Stage::Packaged) => Some(PipelineState::Succeeded),
        _ => None,
    };
    next.ok_or_else(|| TransitionError {
        from: state.to_string(),
        event: format!("{event:?}"),
    })
}

/// Current state plus the states passed through, for logs and tests.
#[derive(Debug, Clone)]
pub struct StateTracker {
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            state: PipelineState::Start,
            history: vec![PipelineState::Start],
        }
    }
}

impl StateTracker {
    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every state entered, starting with `Start`.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Apply `event`, recording the new state.
    pub fn apply(&mut self, event: Event) -> Result<&PipelineState, TransitionError> {
        self.state = transition(&self.state, event)?;
        self.history.push(self.state.clone());
        Ok(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_run_reaches_succeeded() {
        let mut tracker = StateTracker::default();
        for stage in Stage::ORDER {
            tracker.apply(Event::Completed(stage)).unwrap();
        }
        tracker.apply(Event::Finish).unwrap();

        assert_eq!(tracker.state(), &PipelineState::Succeeded);
        assert_eq!(tracker.history().len(), Stage::ORDER.len() + 2);
    }

    #[test]
    fn failure_records_pending_stage() {
        let state = transition(&PipelineState::Start, Event::Failed("dns".to_string())).unwrap();
        assert_eq!(state, PipelineState::Failed { stage: Stage::Fetched, reason: "dns".to_string() });

        let state = transition(&PipelineState::Completed(Stage::Profiled), Event::Failed("empty".to_string())).unwrap();
        assert!(matches!(state, PipelineState::Failed { stage: Stage::Extracted, .. }));
    }

    #[test]
    fn skipping_stages_is_rejected() {
        assert!(transition(&PipelineState::Start, Event::Completed(Stage::Extracted)).is_err());
        assert!(transition(&PipelineState::Completed(Stage::Rendered), Event::Finish).is_err());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let failed = PipelineState::Failed { stage: Stage::Rendered, reason: "x".to_string() };
        assert!(failed.is_terminal());
        assert!(transition(&failed, Event::Completed(Stage::Packaged)).is_err());
        assert!(transition(&PipelineState::Succeeded, Event::Failed("late".to_string())).is_err());
        assert!(transition(&PipelineState::Succeeded, Event::Finish).is_err());
    }
}
