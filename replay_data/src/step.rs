use crate::{Action, State};

/// Reward every recorded step carries until the episode is shaped.
pub const SURVIVAL_BONUS: f32 = 0.01;

#[derive(Clone, Debug)]
pub struct Step {
    pub state: State,
    pub action: Action,
    pub next_state: State,
    pub step_index: usize,
    pub reward: f32,
    pub terminal: bool,
}

impl Step {
    pub fn new(state: State, action: Action, next_state: State, step_index: usize) -> Self {
        Self {
            state,
            action,
            next_state,
            step_index,
            reward: SURVIVAL_BONUS,
            terminal: false,
        }
    }
}
