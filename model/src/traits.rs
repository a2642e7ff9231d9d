use super::{LearningStepInfo, ModelError};
use rand::Rng;
use replay_data::Action;
use std::path::Path;

pub trait Actor<State> {
    fn best_action(&self, state: &State) -> Action;

    /// Epsilon-greedy choice: a uniformly random action with probability
    /// `eps`, otherwise `best_action`.
    fn select_action(&self, state: &State, eps: f64) -> Action {
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < eps {
            Action::ALL[rng.gen_range(0..Action::ALL.len())]
        } else {
            self.best_action(state)
        }
    }
}

pub trait BasicLearner<Transition> {
    fn train_batch(&mut self, batch: &[&Transition]) -> LearningStepInfo;
}

pub trait TargetNet {
    fn copy_control_to_target(&mut self);
}

pub trait Persistable {
    fn save<P: AsRef<Path>>(&self, filepath: P) -> Result<(), ModelError>;
    fn load<P: AsRef<Path>>(&mut self, filepath: P) -> Result<(), ModelError>;
}

/// Everything the training core needs from a function approximator.
pub trait Approximator<State, Transition>:
    Actor<State> + BasicLearner<Transition> + TargetNet + Persistable
{
}

impl<T, State, Transition> Approximator<State, Transition> for T where
    T: Actor<State> + BasicLearner<Transition> + TargetNet + Persistable
{
}
