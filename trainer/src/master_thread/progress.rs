use crate::agent::AgentStatus;
use std::fmt;
use std::time::Instant;

pub struct ProgressReport {
    pub status: AgentStatus,
    pub live_workers: usize,
    pub steps_per_sec: f64,
}

fn fmt_optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| value.to_string())
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scores = &self.scores;
        write!(
            f,
            "episodes {} | steps {} | buffer {} episodes, {} steps | eps {:.3} | ma20 {} | ma100 {} | best {}",
            self.episodes_completed,
            self.total_steps,
            self.buffer_episodes,
            self.buffer_steps,
            self.epsilon,
            fmt_optional(scores.average_20.map(|avg| format!("{avg:.1}"))),
            fmt_optional(scores.average_100.map(|avg| format!("{avg:.1}"))),
            fmt_optional(scores.best),
        )
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {:.1} steps/s | workers {}",
            self.status, self.steps_per_sec, self.live_workers
        )
    }
}

/// Turns successive status samples into step throughput.
pub struct ProgressMeter {
    last_steps: u64,
    last_sample: Instant,
}

impl ProgressMeter {
    pub fn new(total_steps: u64) -> Self {
        Self {
            last_steps: total_steps,
            last_sample: Instant::now(),
        }
    }

    pub fn report(&mut self, status: AgentStatus, live_workers: usize) -> ProgressReport {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample).as_secs_f64();
        let steps = status.total_steps.saturating_sub(self.last_steps);
        let steps_per_sec = if elapsed > 0.0 {
            steps as f64 / elapsed
        } else {
            0.0
        };
        self.last_steps = status.total_steps;
        self.last_sample = now;
        ProgressReport {
            status,
            live_workers,
            steps_per_sec,
        }
    }
}
