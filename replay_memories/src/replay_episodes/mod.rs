use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use replay_data::{Episode, Step};
use std::collections::VecDeque;

/// Steps of survival that earn an episode one extra entry in the sampling
/// pool.
const STEPS_PER_SAMPLING_WEIGHT: usize = 50;

/// Bounded FIFO of finished episodes.
///
/// Sampling is biased toward long episodes: each episode is drawn with
/// weight `max(1, len / 50)`, then a step is drawn uniformly from it. This is
/// plain length-based oversampling, there are no per-step priorities.
pub struct EpisodeReplay {
    episodes: VecDeque<Episode>,
    max_episodes: usize,
    total_steps: usize,
}

impl EpisodeReplay {
    pub fn with_max_episodes(max_episodes: usize) -> Self {
        assert!(max_episodes > 0, "replay capacity must be positive");
        Self {
            episodes: VecDeque::with_capacity(max_episodes),
            max_episodes,
            total_steps: 0,
        }
    }

    pub fn add_episode(&mut self, episode: Episode) {
        debug_assert!(
            episode.is_finished(),
            "only finished episodes belong in the replay"
        );
        self.total_steps += episode.len();
        self.episodes.push_back(episode);
        while self.episodes.len() > self.max_episodes {
            if let Some(evicted) = self.episodes.pop_front() {
                self.total_steps -= evicted.len();
            }
        }
    }

    pub fn sample_batch(&self, batch_size: usize) -> Vec<Step> {
        self.sample_batch_with(&mut rand::thread_rng(), batch_size)
    }

    /// Draws `batch_size` steps with replacement. Returns an empty batch
    /// when no stored episode has any steps.
    pub fn sample_batch_with<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Vec<Step> {
        let candidates: Vec<&Episode> = self
            .episodes
            .iter()
            .filter(|episode| !episode.is_empty())
            .collect();
        let weights = candidates.iter().map(|episode| sampling_weight(episode));
        let Ok(episode_dist) = WeightedIndex::new(weights) else {
            return vec![];
        };
        (0..batch_size)
            .map(|_| {
                let episode = candidates[episode_dist.sample(rng)];
                let steps = episode.steps();
                steps[rng.gen_range(0..steps.len())].clone()
            })
            .collect()
    }

    /// Steps held by the retained (non-evicted) episodes.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.episodes.clear();
        self.total_steps = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Episode> {
        self.episodes.iter()
    }
}

fn sampling_weight(episode: &Episode) -> usize {
    (episode.len() / STEPS_PER_SAMPLING_WEIGHT).max(1)
}
