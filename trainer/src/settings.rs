use crate::agent::AgentSettings;
use crate::env_thread::WorkerSettings;
use crate::master_thread::OrchestratorSettings;
use crate::Args;
use file_io::open_file_buf_read;
use game_interface::SimulatedGameSettings;
use model::LinearModelSettings;
use replay_memories::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("could not read settings file")]
    Io(#[from] std::io::Error),
    #[error("malformed settings file")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    pub max_episodes: usize,
    pub retention: RetentionPolicy,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            max_episodes: 1000,
            retention: RetentionPolicy::default(),
        }
    }
}

/// Everything a training run is configured with. Read from a JSON file in
/// which every section and field is optional, then overridden from the
/// command line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub agent: AgentSettings,
    pub replay: ReplaySettings,
    pub worker: WorkerSettings,
    pub orchestrator: OrchestratorSettings,
    pub game: SimulatedGameSettings,
    pub model: LinearModelSettings,
}

impl TrainerSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let file = open_file_buf_read(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(workers) = args.workers {
            self.orchestrator.workers = workers;
        }
        if let Some(dir) = &args.checkpoint_dir {
            self.orchestrator.checkpoint_dir = dir.clone();
        }
        if let Some(episodes) = args.episodes {
            self.orchestrator.episode_budget = Some(episodes);
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.agent.validate()?;
        let invalid = |message: &str| Err(SettingsError::Invalid(message.to_owned()));
        if self.replay.max_episodes == 0 {
            return invalid("replay must hold at least one episode");
        }
        if self.worker.frame_stack == 0 {
            return invalid("frame stack must hold at least one frame");
        }
        if self.worker.max_consecutive_failures == 0 {
            return invalid("workers must tolerate at least one failure");
        }
        if self.orchestrator.workers == 0 {
            return invalid("training needs at least one worker");
        }
        if self.orchestrator.report_interval_ms == 0 {
            return invalid("report interval must be positive");
        }
        if !(0.0..=1.0).contains(&self.model.gamma) || self.model.learning_rate <= 0.0 {
            return invalid("model needs gamma in [0, 1] and a positive learning rate");
        }
        Ok(())
    }

    /// Length of the flattened state the model consumes.
    pub fn input_len(&self) -> usize {
        self.worker.frame_stack * self.game.width as usize * self.game.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ExplorationSchedule;
    use crate::master_thread::FailurePolicy;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = TrainerSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.input_len(), 4 * 84 * 84);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "agent": {{"batch_size": 32, "exploration": {{"kind": "multiplicative", "start": 1.0, "floor": 0.05, "rate": 0.995}}}},
                "replay": {{"retention": "clear_before_insert"}},
                "orchestrator": {{"failure_policy": "respawn", "episode_budget": 200}}
            }}"#
        )
        .unwrap();
        let settings = TrainerSettings::load(file.path()).unwrap();
        assert_eq!(settings.agent.batch_size, 32);
        assert_eq!(settings.agent.train_frequency, 50);
        assert!(matches!(
            settings.agent.exploration,
            ExplorationSchedule::Multiplicative { rate, .. } if rate == 0.995
        ));
        assert_eq!(settings.replay.retention, RetentionPolicy::ClearBeforeInsert);
        assert_eq!(settings.replay.max_episodes, 1000);
        assert_eq!(settings.orchestrator.failure_policy, FailurePolicy::Respawn);
        assert_eq!(settings.orchestrator.episode_budget, Some(200));
        assert_eq!(settings.worker, WorkerSettings::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"agent\": 3}}").unwrap();
        assert!(matches!(
            TrainerSettings::load(file.path()),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TrainerSettings::load(dir.path().join("nope.json")),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn rejects_zero_cadence() {
        let mut settings = TrainerSettings::default();
        settings.agent.train_frequency = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn args_override_file() {
        let mut settings = TrainerSettings::default();
        let args = Args {
            config: None,
            workers: Some(6),
            checkpoint_dir: Some("runs/a".into()),
            load: None,
            episodes: Some(10),
            no_console: true,
        };
        settings.apply_args(&args);
        assert_eq!(settings.orchestrator.workers, 6);
        assert_eq!(settings.orchestrator.checkpoint_dir, Path::new("runs/a"));
        assert_eq!(settings.orchestrator.episode_budget, Some(10));
    }
}
