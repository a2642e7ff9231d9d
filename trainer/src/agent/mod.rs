mod exploration;
mod reward_shaper;
mod score_board;

pub use exploration::ExplorationSchedule;
pub use reward_shaper::{RewardSettings, RewardShaper};
pub use score_board::{MovingAverage, ScoreBoard, ScoreSummary};

use crate::settings::SettingsError;
use model::traits::Approximator;
use model::{LearningStepInfo, ModelError};
use parking_lot::Mutex;
use replay_data::{Action, Episode, EpisodeError, State, Step};
use replay_memories::SharedEpisodeReplay;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub batch_size: usize,
    /// Train once every this many recorded steps, counted over all workers.
    pub train_frequency: u64,
    pub target_update_frequency: u64,
    /// No training happens until the buffer holds this many steps.
    pub min_buffer_steps: usize,
    pub reward: RewardSettings,
    pub exploration: ExplorationSchedule,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            batch_size: 64,
            train_frequency: 50,
            target_update_frequency: 1000,
            min_buffer_steps: 64,
            reward: RewardSettings::default(),
            exploration: ExplorationSchedule::default(),
        }
    }
}

impl AgentSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid("batch size must be positive".into()));
        }
        if self.train_frequency == 0 || self.target_update_frequency == 0 {
            return Err(SettingsError::Invalid(
                "train and target update frequencies must be positive".into(),
            ));
        }
        self.exploration.validate()
    }
}

/// Point-in-time view of the agent's counters.
#[derive(Clone, Copy, Debug)]
pub struct AgentStatus {
    pub total_steps: u64,
    pub episode_count: u64,
    pub episodes_completed: u64,
    pub epsilon: f64,
    pub buffer_episodes: usize,
    pub buffer_steps: usize,
    pub scores: ScoreSummary,
}

/// The learning half of the trainer, shared by every worker.
///
/// Workers only ever touch the agent through `&self`: counters are atomic,
/// the replay and the score board lock internally, and the model sits behind
/// its own mutex because training and action selection must not interleave.
pub struct Agent<M> {
    model: Mutex<M>,
    replay: SharedEpisodeReplay,
    shaper: RewardShaper,
    settings: AgentSettings,
    total_steps: AtomicU64,
    episode_count: AtomicU64,
    episodes_completed: AtomicU64,
    epsilon_bits: AtomicU64,
    scores: Mutex<ScoreBoard>,
    closed: AtomicBool,
}

impl<M> Agent<M>
where
    M: Approximator<State, Step>,
{
    pub fn new(model: M, replay: SharedEpisodeReplay, settings: AgentSettings) -> Self {
        Self {
            model: Mutex::new(model),
            replay,
            shaper: RewardShaper::new(settings.reward),
            epsilon_bits: AtomicU64::new(settings.exploration.start().to_bits()),
            settings,
            total_steps: AtomicU64::new(0),
            episode_count: AtomicU64::new(0),
            episodes_completed: AtomicU64::new(0),
            scores: Mutex::new(ScoreBoard::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn start_episode(&self) {
        let started = self.episode_count.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(episode = started, "episode started");
    }

    pub fn select_action(&self, state: &State) -> Action {
        let eps = self.epsilon();
        self.model.lock().select_action(state, eps)
    }

    /// Appends a transition to `episode` and runs whatever training or target
    /// sync falls due on this global step.
    pub fn record_step(
        &self,
        episode: &mut Episode,
        state: State,
        action: Action,
        next_state: State,
    ) -> Result<(), EpisodeError> {
        let step_index = episode.len();
        episode.add_step(Step::new(state, action, next_state, step_index))?;
        let total_steps = self.total_steps.fetch_add(1, Ordering::SeqCst) + 1;
        if total_steps % self.settings.train_frequency == 0 {
            self.train_step(total_steps);
        }
        if total_steps % self.settings.target_update_frequency == 0 {
            self.model.lock().copy_control_to_target();
            debug!(total_steps, "target synced");
        }
        Ok(())
    }

    /// Finishes `episode`, shapes its rewards, commits it to the replay and
    /// decays exploration.
    ///
    /// Once the agent is closed the episode is dropped instead of committed.
    pub fn end_episode(&self, mut episode: Episode, final_score: u32) -> Result<(), EpisodeError> {
        episode.finish(final_score)?;
        if self.is_closed() {
            warn!(
                score = final_score,
                "agent is closed, discarding late episode"
            );
            return Ok(());
        }
        self.shaper.apply_rewards(&mut episode);
        let retained = episode.len();
        self.replay.add_episode(episode);
        // each commit reserves its own ordinal so no decay step is skipped
        let completed = self.episodes_completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.decay_epsilon(completed);
        self.scores.lock().record(final_score);
        debug!(
            episode = completed,
            score = final_score,
            retained,
            epsilon = self.epsilon(),
            "episode committed"
        );
        Ok(())
    }

    fn train_step(&self, total_steps: u64) -> Option<LearningStepInfo> {
        let required = self.settings.min_buffer_steps.max(self.settings.batch_size);
        let available = self.replay.total_steps();
        if available < required {
            trace!(available, required, "not enough experience to train");
            return None;
        }
        let batch = self.replay.sample_batch(self.settings.batch_size);
        if batch.is_empty() {
            return None;
        }
        let batch = batch.iter().collect::<Vec<_>>();
        let info = self.model.lock().train_batch(&batch);
        debug!(
            total_steps,
            loss = info.loss,
            average_q_val = info.average_q_val,
            "trained"
        );
        Some(info)
    }

    fn decay_epsilon(&self, episode_ordinal: u64) {
        let schedule = self.settings.exploration;
        // the closure always returns Some, so the update cannot fail
        let _ = self
            .epsilon_bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                let current = f64::from_bits(bits);
                Some(schedule.next(current, episode_ordinal).to_bits())
            });
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        self.model.lock().save(path)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        self.model.lock().load(path.as_ref())?;
        info!(path = %path.as_ref().display(), "model loaded");
        Ok(())
    }

    /// Stops committing episodes. Used during shutdown so that workers which
    /// outlive the join deadline cannot touch the buffer anymore.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn epsilon(&self) -> f64 {
        f64::from_bits(self.epsilon_bits.load(Ordering::SeqCst))
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps.load(Ordering::SeqCst)
    }

    pub fn episode_count(&self) -> u64 {
        self.episode_count.load(Ordering::SeqCst)
    }

    pub fn episodes_completed(&self) -> u64 {
        self.episodes_completed.load(Ordering::SeqCst)
    }

    pub fn replay(&self) -> &SharedEpisodeReplay {
        &self.replay
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            total_steps: self.total_steps(),
            episode_count: self.episode_count(),
            episodes_completed: self.episodes_completed(),
            epsilon: self.epsilon(),
            buffer_episodes: self.replay.episode_count(),
            buffer_steps: self.replay.total_steps(),
            scores: self.scores.lock().summary(),
        }
    }

    #[cfg(test)]
    fn with_model<T>(&self, f: impl FnOnce(&M) -> T) -> T {
        f(&self.model.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageOwned1;
    use model::traits::{Actor, BasicLearner, Persistable, TargetNet};
    use replay_data::TrimPolicy;
    use replay_memories::RetentionPolicy;
    use std::sync::Arc;
    use std::thread;

    #[derive(Default)]
    struct CountingModel {
        trained: u32,
        synced: u32,
        batch_sizes: Vec<usize>,
    }

    impl Actor<State> for CountingModel {
        fn best_action(&self, _state: &State) -> Action {
            Action::Right
        }
    }

    impl BasicLearner<Step> for CountingModel {
        fn train_batch(&mut self, batch: &[&Step]) -> LearningStepInfo {
            self.trained += 1;
            self.batch_sizes.push(batch.len());
            LearningStepInfo {
                loss: 0.0,
                average_q_val: 0.0,
            }
        }
    }

    impl TargetNet for CountingModel {
        fn copy_control_to_target(&mut self) {
            self.synced += 1;
        }
    }

    impl Persistable for CountingModel {
        fn save<P: AsRef<Path>>(&self, _filepath: P) -> Result<(), ModelError> {
            Ok(())
        }
        fn load<P: AsRef<Path>>(&mut self, _filepath: P) -> Result<(), ModelError> {
            Ok(())
        }
    }

    fn state() -> State {
        State::new(vec![Arc::new(ImageOwned1::new(2, 1, vec![0, 255]))])
    }

    fn settings() -> AgentSettings {
        AgentSettings {
            batch_size: 4,
            train_frequency: 10,
            target_update_frequency: 25,
            min_buffer_steps: 8,
            ..AgentSettings::default()
        }
    }

    fn agent(settings: AgentSettings) -> Agent<CountingModel> {
        let replay = SharedEpisodeReplay::new(100, RetentionPolicy::Retain);
        Agent::new(CountingModel::default(), replay, settings)
    }

    fn untrimmed() -> Episode {
        Episode::with_trim_policy(TrimPolicy {
            trim_count: 0,
            min_retained: 0,
        })
    }

    fn play(agent: &Agent<CountingModel>, steps: usize) -> Episode {
        agent.start_episode();
        let mut episode = untrimmed();
        for _ in 0..steps {
            let action = agent.select_action(&state());
            agent
                .record_step(&mut episode, state(), action, state())
                .unwrap();
        }
        episode
    }

    #[test]
    fn no_training_before_buffer_fills() {
        let agent = agent(settings());
        let _in_flight = play(&agent, 30);
        assert_eq!(agent.total_steps(), 30);
        assert_eq!(agent.with_model(|model| model.trained), 0);
        assert_eq!(agent.with_model(|model| model.synced), 1);
    }

    #[test]
    fn trains_once_per_cadence_crossing() {
        let agent = agent(settings());
        let episode = play(&agent, 20);
        agent.end_episode(episode, 20).unwrap();
        let _in_flight = play(&agent, 40);
        assert_eq!(agent.total_steps(), 60);
        // steps 30, 40, 50 and 60 cross the cadence with a full buffer
        assert_eq!(agent.with_model(|model| model.trained), 4);
        assert_eq!(agent.with_model(|model| model.synced), 2);
        assert!(agent.with_model(|model| model.batch_sizes.iter().all(|&n| n == 4)));
    }

    #[test]
    fn concurrent_workers_hit_every_crossing() {
        let agent = Arc::new(agent(AgentSettings {
            min_buffer_steps: 0,
            batch_size: 1,
            ..settings()
        }));
        let seed = play(&agent, 1);
        agent.end_episode(seed, 1).unwrap();
        let workers = (0..4)
            .map(|_| {
                let agent = Arc::clone(&agent);
                thread::spawn(move || {
                    let _in_flight = play(&agent, 250);
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(agent.total_steps(), 1001);
        assert_eq!(agent.with_model(|model| model.trained), 100);
        assert_eq!(agent.with_model(|model| model.synced), 40);
        assert_eq!(agent.episode_count(), 5);
    }

    #[test]
    fn committed_episode_is_trimmed_and_shaped() {
        let agent = agent(settings());
        agent.start_episode();
        let mut episode = Episode::new();
        for _ in 0..30 {
            agent
                .record_step(&mut episode, state(), Action::Left, state())
                .unwrap();
        }
        agent.end_episode(episode, 7).unwrap();
        let terminal_flags = agent.replay().inspect(|replay| {
            let episode = replay.iter().next().unwrap();
            assert_eq!(episode.len(), 14);
            assert_eq!(episode.final_score(), Some(7));
            episode
                .steps()
                .iter()
                .map(|step| step.terminal)
                .collect::<Vec<_>>()
        });
        assert_eq!(terminal_flags.iter().filter(|&&t| t).count(), 5);
        assert!(terminal_flags[9..].iter().all(|&t| t));
        assert_eq!(agent.status().scores.best, Some(7));
    }

    #[test]
    fn epsilon_decays_per_committed_episode() {
        let agent = agent(AgentSettings {
            exploration: ExplorationSchedule::Linear {
                start: 0.5,
                end: 0.1,
                decay_episodes: 4,
            },
            ..settings()
        });
        agent.end_episode(untrimmed(), 0).unwrap();
        assert!((agent.epsilon() - 0.4).abs() < 1e-9);
        agent.end_episode(untrimmed(), 0).unwrap();
        assert!((agent.epsilon() - 0.3).abs() < 1e-9);
        for _ in 0..5 {
            agent.end_episode(untrimmed(), 0).unwrap();
        }
        assert_eq!(agent.epsilon(), 0.1);
    }

    #[test]
    fn concurrent_commits_take_distinct_ordinals() {
        let agent = Arc::new(agent(AgentSettings {
            exploration: ExplorationSchedule::Linear {
                start: 1.0,
                end: 0.0,
                decay_episodes: 40,
            },
            ..settings()
        }));
        let workers = (0..4)
            .map(|_| {
                let agent = Arc::clone(&agent);
                thread::spawn(move || {
                    for _ in 0..5 {
                        agent.end_episode(untrimmed(), 0).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(agent.episodes_completed(), 20);
        // the last ordinal handed out is 20, whatever order commits landed in
        assert_eq!(agent.epsilon(), 0.5);
    }

    #[test]
    fn closed_agent_discards_episodes() {
        let agent = agent(settings());
        let episode = play(&agent, 12);
        agent.close();
        agent.end_episode(episode, 3).unwrap();
        assert_eq!(agent.replay().episode_count(), 0);
        assert_eq!(agent.episodes_completed(), 0);
        assert_eq!(agent.epsilon(), settings().exploration.start());
    }

    #[test]
    fn recording_into_finished_episode_fails() {
        let agent = agent(settings());
        let mut episode = untrimmed();
        episode.finish(0).unwrap();
        assert_eq!(
            agent.record_step(&mut episode, state(), Action::Up, state()),
            Err(EpisodeError::AlreadyFinished)
        );
        assert_eq!(agent.total_steps(), 0);
    }
}
