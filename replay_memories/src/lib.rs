mod replay_episodes;
mod shared_replay;

pub use replay_episodes::EpisodeReplay;
pub use shared_replay::{RetentionPolicy, SharedEpisodeReplay};
