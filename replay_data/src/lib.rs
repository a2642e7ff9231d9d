mod action;
mod episode;
mod state;
mod step;

pub use action::Action;
pub use episode::{Episode, EpisodeError, TrimPolicy};
pub use state::{Frame, State};
pub use step::{Step, SURVIVAL_BONUS};
