mod params;

use crate::traits::{Actor, BasicLearner, Persistable, TargetNet};
use crate::{LearningStepInfo, ModelError};
use file_io::{create_file_buf_write, has_data_left, open_file_buf_read};
use params::LinearParams;
use replay_data::{Action, State, Step};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Write};
use std::path::Path;
use zstd::{Decoder, Encoder};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearModelSettings {
    pub learning_rate: f32,
    pub gamma: f32,
}

impl Default for LinearModelSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            gamma: 0.99,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SavedModel {
    control: LinearParams,
    target: LinearParams,
}

/// Linear Q-function approximator with a lagged target copy.
///
/// Updates are normalized least-mean-squares steps on the one-step TD error,
/// so the step size does not depend on how many pixels a state has.
pub struct LinearModel {
    control: LinearParams,
    target: LinearParams,
    settings: LinearModelSettings,
}

impl LinearModel {
    pub fn new(input_len: usize, settings: LinearModelSettings) -> Self {
        let control = LinearParams::zeroed(input_len, usize::from(Action::n_actions()));
        Self {
            target: control.clone(),
            control,
            settings,
        }
    }

    pub fn input_len(&self) -> usize {
        self.control.input_len
    }

    pub fn q_values(&self, state: &State) -> Vec<f32> {
        self.control.q_values(&self.input_of(state))
    }

    fn input_of(&self, state: &State) -> Vec<f32> {
        assert_eq!(
            state.tensor_len(),
            self.input_len(),
            "state does not match the model input size"
        );
        state.to_tensor()
    }

    fn td_target(&self, step: &Step) -> f32 {
        if step.terminal {
            step.reward
        } else {
            let next_input = self.input_of(&step.next_state);
            step.reward + self.settings.gamma * self.target.max_q_value(&next_input)
        }
    }
}

impl Actor<State> for LinearModel {
    fn best_action(&self, state: &State) -> Action {
        let index = self.control.argmax(&self.input_of(state));
        Action::ALL[index]
    }
}

impl BasicLearner<Step> for LinearModel {
    fn train_batch(&mut self, batch: &[&Step]) -> LearningStepInfo {
        if batch.is_empty() {
            return LearningStepInfo {
                loss: 0.0,
                average_q_val: 0.0,
            };
        }
        // errors are computed against the pre-update weights, then applied
        let mut updates = Vec::with_capacity(batch.len());
        let mut squared_error_sum = 0.0;
        let mut q_sum = 0.0;
        for step in batch {
            let input = self.input_of(&step.state);
            let action = usize::from(step.action.index());
            let q = self.control.q_value(&input, action);
            let td_error = self.td_target(step) - q;
            squared_error_sum += td_error * td_error;
            q_sum += q;
            updates.push((input, action, td_error));
        }
        let batch_len = batch.len() as f32;
        for (input, action, td_error) in updates {
            let norm: f32 = 1.0 + input.iter().map(|x| x * x).sum::<f32>();
            let scale = self.settings.learning_rate * td_error / (norm * batch_len);
            self.control.nudge(&input, action, scale);
        }
        LearningStepInfo {
            loss: squared_error_sum / batch_len,
            average_q_val: q_sum / batch_len,
        }
    }
}

impl TargetNet for LinearModel {
    fn copy_control_to_target(&mut self) {
        self.target.clone_from(&self.control);
    }
}

impl Persistable for LinearModel {
    /// Writes zstd-compressed bincode next to the destination, then renames
    /// it into place so a crash never leaves a truncated checkpoint.
    fn save<P: AsRef<Path>>(&self, filepath: P) -> Result<(), ModelError> {
        let filepath = filepath.as_ref();
        let tmp_path = filepath.with_extension("tmp");
        let saved = SavedModel {
            control: self.control.clone(),
            target: self.target.clone(),
        };
        let file = create_file_buf_write(&tmp_path)?;
        let mut encoder = Encoder::new(file, 0)?;
        bincode::serialize_into(&mut encoder, &saved)?;
        encoder.finish()?.flush()?;
        fs::rename(&tmp_path, filepath)?;
        tracing::debug!(path = %filepath.display(), "saved linear model");
        Ok(())
    }

    fn load<P: AsRef<Path>>(&mut self, filepath: P) -> Result<(), ModelError> {
        let file = open_file_buf_read(filepath)?;
        let mut decoder = BufReader::new(Decoder::with_buffer(file)?);
        let saved: SavedModel = bincode::deserialize_from(&mut decoder)?;
        if has_data_left(&mut decoder)? {
            return Err(ModelError::TrailingData);
        }
        for params in [&saved.control, &saved.target] {
            if !params.is_consistent()
                || params.input_len != self.control.input_len
                || params.n_actions != self.control.n_actions
            {
                return Err(ModelError::Shape {
                    expected: self.control.input_len,
                    expected_actions: self.control.n_actions,
                    found: params.input_len,
                    found_actions: params.n_actions,
                });
            }
        }
        self.control = saved.control;
        self.target = saved.target;
        Ok(())
    }
}
