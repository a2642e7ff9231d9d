use replay_data::{Episode, SURVIVAL_BONUS};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    pub survival_bonus: f32,
    pub death_penalty: f32,
    /// How many of the last retained steps count as the cause of death.
    pub terminal_window: usize,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            survival_bonus: SURVIVAL_BONUS,
            death_penalty: -10.0,
            terminal_window: 5,
        }
    }
}

/// Rewrites the rewards of a finished episode: the last `terminal_window`
/// steps get the death penalty and are marked terminal, every earlier step
/// gets the survival bonus.
#[derive(Clone, Debug)]
pub struct RewardShaper {
    settings: RewardSettings,
}

impl RewardShaper {
    pub fn new(settings: RewardSettings) -> Self {
        Self { settings }
    }

    pub fn apply_rewards(&self, episode: &mut Episode) {
        debug_assert!(episode.is_finished(), "shaping an unfinished episode");
        let steps = episode.steps_mut();
        let window_start = steps.len().saturating_sub(self.settings.terminal_window);
        for (i, step) in steps.iter_mut().enumerate() {
            if i < window_start {
                step.reward = self.settings.survival_bonus;
                step.terminal = false;
            } else {
                step.reward = self.settings.death_penalty;
                step.terminal = true;
            }
        }
    }
}
