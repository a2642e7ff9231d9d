use crate::settings::SettingsError;
use serde::{Deserialize, Serialize};

/// How the exploration rate shrinks as episodes complete.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplorationSchedule {
    /// Straight line from `start` to `end` over `decay_episodes`, flat after.
    Linear {
        start: f64,
        end: f64,
        decay_episodes: u64,
    },
    /// Multiply by `rate` after every episode, never going below `floor`.
    Multiplicative { start: f64, floor: f64, rate: f64 },
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self::Linear {
            start: 0.30,
            end: 0.05,
            decay_episodes: 1000,
        }
    }
}

impl ExplorationSchedule {
    pub fn start(&self) -> f64 {
        match *self {
            Self::Linear { start, .. } | Self::Multiplicative { start, .. } => start,
        }
    }

    pub fn floor(&self) -> f64 {
        match *self {
            Self::Linear { end, .. } => end,
            Self::Multiplicative { floor, .. } => floor,
        }
    }

    /// Rate after the episode numbered `episode_ordinal` (1-based) completes.
    /// Never above `current`, never below the floor.
    pub fn next(&self, current: f64, episode_ordinal: u64) -> f64 {
        let next = match *self {
            Self::Linear {
                start,
                end,
                decay_episodes,
            } => {
                let progress = (episode_ordinal as f64 / decay_episodes as f64).min(1.0);
                start + (end - start) * progress
            }
            Self::Multiplicative { rate, .. } => current * rate,
        };
        next.min(current).max(self.floor())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let (start, floor) = (self.start(), self.floor());
        let problem = if !(0.0..=1.0).contains(&start) || !(0.0..=start).contains(&floor) {
            format!("exploration needs 0 <= floor <= start <= 1, got floor {floor} and start {start}")
        } else {
            match *self {
                Self::Linear { decay_episodes, .. } if decay_episodes == 0 => {
                    "linear exploration needs at least one decay episode".to_owned()
                }
                Self::Multiplicative { rate, .. } if !(rate > 0.0 && rate <= 1.0) => {
                    format!("exploration decay rate {rate} is not in (0, 1]")
                }
                _ => return Ok(()),
            }
        };
        Err(SettingsError::Invalid(problem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(schedule: ExplorationSchedule, episodes: u64) -> Vec<f64> {
        let mut eps = schedule.start();
        let mut history = vec![eps];
        for ordinal in 1..=episodes {
            eps = schedule.next(eps, ordinal);
            history.push(eps);
        }
        history
    }

    fn assert_monotone_and_floored(history: &[f64], floor: f64) {
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0], "{} rose to {}", pair[0], pair[1]);
        }
        assert!(history.iter().all(|&eps| eps >= floor));
    }

    #[test]
    fn linear_reaches_end() {
        let schedule = ExplorationSchedule::default();
        let history = run(schedule, 1500);
        assert_monotone_and_floored(&history, 0.05);
        assert!((history[500] - 0.175).abs() < 1e-9);
        assert!((history[1000] - 0.05).abs() < 1e-9);
        assert_eq!(history[1000], history[1500]);
    }

    #[test]
    fn multiplicative_stops_at_floor() {
        let schedule = ExplorationSchedule::Multiplicative {
            start: 1.0,
            floor: 0.1,
            rate: 0.9,
        };
        let history = run(schedule, 100);
        assert_monotone_and_floored(&history, 0.1);
        assert!((history[1] - 0.9).abs() < 1e-9);
        assert_eq!(*history.last().unwrap(), 0.1);
    }

    #[test]
    fn stale_ordinal_never_raises_rate() {
        let schedule = ExplorationSchedule::default();
        let late = schedule.next(schedule.start(), 800);
        assert_eq!(schedule.next(late, 10), late);
    }

    #[test]
    fn rejects_bad_parameters() {
        let backwards = ExplorationSchedule::Linear {
            start: 0.1,
            end: 0.5,
            decay_episodes: 10,
        };
        assert!(backwards.validate().is_err());
        let growing = ExplorationSchedule::Multiplicative {
            start: 0.5,
            floor: 0.1,
            rate: 1.5,
        };
        assert!(matches!(growing.validate(), Err(SettingsError::Invalid(_))));
        assert!(ExplorationSchedule::default().validate().is_ok());
    }

    #[test]
    fn reads_tagged_json() {
        let schedule: ExplorationSchedule = serde_json::from_str(
            r#"{"kind": "multiplicative", "start": 0.5, "floor": 0.01, "rate": 0.99}"#,
        )
        .unwrap();
        assert_eq!(schedule.floor(), 0.01);
    }
}
