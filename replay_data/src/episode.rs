use crate::Step;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EpisodeError {
    #[error("episode was already finished")]
    AlreadyFinished,
}

/// How many tail steps `Episode::finish` discards.
///
/// The death screen is only detected a few frames after the player actually
/// died, so the last recorded transitions show a game that is already over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimPolicy {
    pub trim_count: usize,
    pub min_retained: usize,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            trim_count: 16,
            min_retained: 5,
        }
    }
}

impl TrimPolicy {
    /// Number of steps left after trimming an episode of `len` steps.
    /// Episodes shorter than `min_retained` are kept whole.
    pub fn retained_len(&self, len: usize) -> usize {
        let floor = len.min(self.min_retained);
        len.saturating_sub(self.trim_count).max(floor)
    }
}

#[derive(Debug, Default)]
pub struct Episode {
    steps: Vec<Step>,
    trim: TrimPolicy,
    final_score: Option<u32>,
}

impl Episode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trim_policy(trim: TrimPolicy) -> Self {
        Self {
            trim,
            ..Self::default()
        }
    }

    pub fn add_step(&mut self, step: Step) -> Result<(), EpisodeError> {
        if self.is_finished() {
            return Err(EpisodeError::AlreadyFinished);
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn finish(&mut self, final_score: u32) -> Result<(), EpisodeError> {
        if self.is_finished() {
            return Err(EpisodeError::AlreadyFinished);
        }
        let retained = self.trim.retained_len(self.steps.len());
        self.steps.truncate(retained);
        self.final_score = Some(final_score);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.final_score.is_some()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `None` until the episode is finished.
    pub fn final_score(&self) -> Option<u32> {
        self.final_score
    }

    /// Step count after trimming; `None` until the episode is finished.
    pub fn episode_length(&self) -> Option<usize> {
        self.final_score.map(|_| self.steps.len())
    }
}
