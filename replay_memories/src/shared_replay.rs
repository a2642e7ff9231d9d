use crate::EpisodeReplay;
use parking_lot::Mutex;
use replay_data::{Episode, Step};
use serde::{Deserialize, Serialize};

/// What happens to stored history when a new episode is committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep up to `max_episodes` of history.
    #[default]
    Retain,
    /// Train only on the most recent episode: the buffer is emptied before
    /// each commit.
    ClearBeforeInsert,
}

/// Episode replay shared by all workers.
///
/// Every method holds the lock for exactly one buffer operation. Samples are
/// returned as owned steps (frames are reference counted), so training never
/// runs under the lock.
pub struct SharedEpisodeReplay {
    replay: Mutex<EpisodeReplay>,
    retention: RetentionPolicy,
}

impl SharedEpisodeReplay {
    pub fn new(max_episodes: usize, retention: RetentionPolicy) -> Self {
        Self {
            replay: Mutex::new(EpisodeReplay::with_max_episodes(max_episodes)),
            retention,
        }
    }

    pub fn add_episode(&self, episode: Episode) {
        let mut replay = self.replay.lock();
        if self.retention == RetentionPolicy::ClearBeforeInsert {
            replay.clear();
        }
        replay.add_episode(episode);
    }

    pub fn sample_batch(&self, batch_size: usize) -> Vec<Step> {
        self.replay.lock().sample_batch(batch_size)
    }

    pub fn total_steps(&self) -> usize {
        self.replay.lock().total_steps()
    }

    pub fn episode_count(&self) -> usize {
        self.replay.lock().episode_count()
    }

    pub fn clear(&self) {
        self.replay.lock().clear();
    }

    /// Runs `f` against a consistent view of the buffer.
    pub fn inspect<T>(&self, f: impl FnOnce(&EpisodeReplay) -> T) -> T {
        f(&self.replay.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageOwned1;
    use replay_data::{Action, State, TrimPolicy};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn episode(len: usize, score: u32) -> Episode {
        let state = State::new(vec![Arc::new(ImageOwned1::new(1, 1, vec![0]))]);
        let mut episode = Episode::with_trim_policy(TrimPolicy {
            trim_count: 0,
            min_retained: 0,
        });
        for step_index in 0..len {
            episode
                .add_step(Step::new(state.clone(), Action::Up, state.clone(), step_index))
                .unwrap();
        }
        episode.finish(score).unwrap();
        episode
    }

    #[test]
    fn concurrent_adds_keep_every_episode_once() {
        const WORKERS: u32 = 4;
        const PER_WORKER: u32 = 250;
        let replay = Arc::new(SharedEpisodeReplay::new(1000, RetentionPolicy::Retain));
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let replay = Arc::clone(&replay);
                std::thread::spawn(move || {
                    for n in 0..PER_WORKER {
                        replay.add_episode(episode(3, worker * PER_WORKER + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(replay.episode_count(), 1000);
        assert_eq!(replay.total_steps(), 3000);
        let scores: HashSet<u32> = replay.inspect(|replay| {
            assert!(replay.iter().all(|episode| episode.len() == 3));
            replay.iter().filter_map(Episode::final_score).collect()
        });
        assert_eq!(scores, (0..WORKERS * PER_WORKER).collect());
    }

    #[test]
    fn clear_before_insert_keeps_only_latest() {
        let replay = SharedEpisodeReplay::new(10, RetentionPolicy::ClearBeforeInsert);
        replay.add_episode(episode(4, 1));
        replay.add_episode(episode(6, 2));
        assert_eq!(replay.episode_count(), 1);
        assert_eq!(replay.total_steps(), 6);
    }

    #[test]
    fn retain_keeps_history() {
        let replay = SharedEpisodeReplay::new(10, RetentionPolicy::Retain);
        replay.add_episode(episode(4, 1));
        replay.add_episode(episode(6, 2));
        assert_eq!(replay.episode_count(), 2);
        assert_eq!(replay.sample_batch(8).len(), 8);
        replay.clear();
        assert_eq!(replay.episode_count(), 0);
    }
}
