//! Generation lifecycle: statuses, the transition table, and prompt rules.

use crate::error::CoreError;

crate::define_text_enum! {
    /// Lifecycle status of a single video generation.
    GenerationStatus {
        Queued = "queued",
        Preparing = "preparing",
        Generating = "generating",
        Processing = "processing",
        Completed = "completed",
        Failed = "failed",
    }
}

/// Maximum prompt length accepted by the generation endpoint.
pub const MAX_PROMPT_LENGTH: usize = 500;

/// Error message stored when the provider reports failure without detail.
pub const GENERATION_FAILED_MESSAGE: &str = "Video generation failed";

impl GenerationStatus {
    /// `completed` and `failed` end the lifecycle. `processing` does not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [GenerationStatus] {
        use GenerationStatus::*;
        match self {
            Queued => &[Preparing, Failed],
            Preparing => &[Generating, Failed],
            Generating => &[Processing, Failed],
            Processing => &[Completed, Failed],
            Completed | Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Statuses from which a move to `self` is legal.
    ///
    /// Used to build transition-guarded UPDATE statements.
    pub fn predecessors(self) -> Vec<GenerationStatus> {
        GenerationStatus::ALL
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }

    /// Progress percentage shown to the user for this status.
    pub fn progress_percent(self) -> u8 {
        match self {
            Self::Queued => 10,
            Self::Preparing => 25,
            Self::Generating => 50,
            Self::Processing => 75,
            Self::Completed => 100,
            Self::Failed => 0,
        }
    }

    /// Whether a generation in this status still has provider work ahead.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Generating | Self::Processing)
    }
}

/// Validate a generation prompt: required and at most [`MAX_PROMPT_LENGTH`] chars.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt is required".into()));
    }
    if prompt.chars().count() > MAX_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Prompt must be less than {MAX_PROMPT_LENGTH} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
