mod env_guard;
mod error;
mod simulated_game;

pub use env_guard::EnvGuard;
pub use error::EnvError;
pub use simulated_game::{SimulatedGame, SimulatedGameSettings};

use image::ImageOwned1;
use replay_data::Action;

/// Driver for one running game instance.
///
/// Implementations are owned by a single worker thread, but are created on
/// the orchestrating thread, hence the `Send` bound at the use site rather
/// than here.
pub trait GameEnv {
    /// Brings the game to a playable state (page load, dialogs dismissed).
    fn start(&mut self) -> Result<(), EnvError>;
    fn perform_action(&mut self, action: Action) -> Result<(), EnvError>;
    /// Grabs the current screen, already preprocessed into the observation
    /// format the agent consumes.
    fn capture_observation(&mut self) -> Result<ImageOwned1, EnvError>;
    /// Best effort: may report death a few frames late.
    fn is_terminal(&mut self) -> Result<bool, EnvError>;
    /// May block until the displayed score stops changing.
    fn extract_final_score(&mut self) -> Result<u32, EnvError>;
    fn restart_episode(&mut self) -> Result<(), EnvError>;
    /// Releases every resource. Safe to call more than once.
    fn shutdown(&mut self);
}
