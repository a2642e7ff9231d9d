use crate::{EnvError, GameEnv};
use image::{Color1, ImageOwned, ImageOwned1, ImageRef};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use replay_data::Action;
use serde::{Deserialize, Serialize};

const ROWS: u32 = 12;
const PLAYER_ROW: u32 = ROWS - 1;
/// The game is drawn at this multiple of the observation size, then
/// downscaled, the same way a real screen capture is preprocessed.
const SCREEN_SCALE: u32 = 2;

const OBSTACLE_COLOR: Color1 = Color1::new(160);
const PLAYER_COLOR: Color1 = Color1::WHITE;
const CRASH_COLOR: Color1 = Color1::new(90);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedGameSettings {
    /// Observation width in pixels.
    pub width: u32,
    /// Observation height in pixels.
    pub height: u32,
    pub lanes: u32,
    /// Steps between the crash and the death screen becoming detectable.
    pub detection_delay: u32,
    pub obstacle_probability: f64,
    /// Fixed seed for reproducible runs; each worker offsets it by its id.
    pub seed: Option<u64>,
}

impl Default for SimulatedGameSettings {
    fn default() -> Self {
        Self {
            width: 84,
            height: 84,
            lanes: 3,
            detection_delay: 4,
            obstacle_probability: 0.25,
            seed: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Playing,
    /// Crashed this many steps ago.
    Crashed(u32),
    ShutDown,
}

/// Lane-dodging reflex game. Obstacles fall one row per step; the player
/// switches lanes with `Left`/`Right` and survives as long as nothing lands
/// on it. Score is the number of survived steps.
pub struct SimulatedGame {
    settings: SimulatedGameSettings,
    rng: StdRng,
    phase: Phase,
    player_lane: u32,
    obstacles: Vec<(u32, u32)>,
    score: u32,
}

impl SimulatedGame {
    pub fn new(settings: SimulatedGameSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            player_lane: settings.lanes / 2,
            settings,
            rng,
            phase: Phase::Stopped,
            obstacles: vec![],
            score: 0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Whether the player has crashed, regardless of whether the death
    /// screen is detectable yet.
    pub fn crashed(&self) -> bool {
        matches!(self.phase, Phase::Crashed(_))
    }

    fn validate(&self) -> Result<(), EnvError> {
        let settings = &self.settings;
        if settings.lanes == 0 {
            return Err(EnvError::Start("the game needs at least one lane".into()));
        }
        if settings.width < settings.lanes || settings.height < ROWS {
            return Err(EnvError::Start(format!(
                "{}x{} observation is too small for {} lanes and {ROWS} rows",
                settings.width, settings.height, settings.lanes
            )));
        }
        if !(0.0..=1.0).contains(&settings.obstacle_probability) {
            return Err(EnvError::Start(format!(
                "obstacle probability {} is not a probability",
                settings.obstacle_probability
            )));
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), EnvError> {
        match self.phase {
            Phase::Stopped => Err(EnvError::Transient("game has not been started".into())),
            Phase::ShutDown => Err(EnvError::Fatal("game was shut down".into())),
            Phase::Playing | Phase::Crashed(_) => Ok(()),
        }
    }

    fn reset_board(&mut self) {
        self.player_lane = self.settings.lanes / 2;
        self.obstacles.clear();
        self.score = 0;
        self.phase = Phase::Playing;
    }

    fn advance(&mut self, action: Action) {
        match action {
            Action::Left => self.player_lane = self.player_lane.saturating_sub(1),
            Action::Right => self.player_lane = (self.player_lane + 1).min(self.settings.lanes - 1),
            Action::Nothing | Action::Up | Action::Down => {}
        }
        for (_, row) in &mut self.obstacles {
            *row += 1;
        }
        self.obstacles.retain(|&(_, row)| row <= PLAYER_ROW);
        if self.rng.gen_bool(self.settings.obstacle_probability) {
            let lane = self.rng.gen_range(0..self.settings.lanes);
            self.obstacles.push((lane, 0));
        }
        let hit = self
            .obstacles
            .iter()
            .any(|&(lane, row)| lane == self.player_lane && row == PLAYER_ROW);
        if hit {
            self.phase = Phase::Crashed(0);
        } else {
            self.score += 1;
        }
    }

    fn death_screen_visible(&self) -> bool {
        matches!(self.phase, Phase::Crashed(since) if since >= self.settings.detection_delay)
    }

    fn render_screen(&self) -> ImageOwned1 {
        let width = self.settings.width * SCREEN_SCALE;
        let height = self.settings.height * SCREEN_SCALE;
        let mut screen = ImageOwned1::zeroed(width, height);
        if self.death_screen_visible() {
            screen.fill_area((0, width), (0, height), Color1::WHITE);
            return screen;
        }
        let lane_width = width / self.settings.lanes;
        let row_height = height / ROWS;
        let cell = |lane: u32, row: u32| {
            (
                (lane * lane_width, (lane + 1) * lane_width),
                (row * row_height, (row + 1) * row_height),
            )
        };
        for &(lane, row) in &self.obstacles {
            let (xs, ys) = cell(lane, row);
            screen.fill_area(xs, ys, OBSTACLE_COLOR);
        }
        let player_color = if self.crashed() {
            CRASH_COLOR
        } else {
            PLAYER_COLOR
        };
        let (xs, ys) = cell(self.player_lane, PLAYER_ROW);
        screen.fill_area(xs, ys, player_color);
        screen
    }
}

impl GameEnv for SimulatedGame {
    fn start(&mut self) -> Result<(), EnvError> {
        if self.phase == Phase::ShutDown {
            return Err(EnvError::Start("game was shut down".into()));
        }
        self.validate()?;
        self.reset_board();
        tracing::debug!(lanes = self.settings.lanes, "simulated game started");
        Ok(())
    }

    fn perform_action(&mut self, action: Action) -> Result<(), EnvError> {
        self.ensure_running().map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                EnvError::Action(e.to_string())
            }
        })?;
        match self.phase {
            Phase::Playing => self.advance(action),
            Phase::Crashed(since) => self.phase = Phase::Crashed(since + 1),
            Phase::Stopped | Phase::ShutDown => unreachable!("checked by ensure_running"),
        }
        Ok(())
    }

    fn capture_observation(&mut self) -> Result<ImageOwned1, EnvError> {
        self.ensure_running().map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                EnvError::Capture(e.to_string())
            }
        })?;
        let screen = self.render_screen();
        Ok(screen.resize_nearest(self.settings.width, self.settings.height))
    }

    fn is_terminal(&mut self) -> Result<bool, EnvError> {
        self.ensure_running()?;
        Ok(self.death_screen_visible())
    }

    fn extract_final_score(&mut self) -> Result<u32, EnvError> {
        self.ensure_running()?;
        if self.crashed() {
            Ok(self.score)
        } else {
            Err(EnvError::Transient(
                "no final score while the game is running".into(),
            ))
        }
    }

    fn restart_episode(&mut self) -> Result<(), EnvError> {
        self.ensure_running()?;
        self.reset_board();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.phase = Phase::ShutDown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SimulatedGameSettings {
        SimulatedGameSettings {
            width: 24,
            height: 24,
            lanes: 3,
            detection_delay: 3,
            obstacle_probability: 1.0,
            seed: Some(11),
        }
    }

    fn play_until_crash(game: &mut SimulatedGame) -> u32 {
        let mut steps = 0;
        while !game.crashed() {
            game.perform_action(Action::Nothing).unwrap();
            steps += 1;
            assert!(steps < 10_000, "game never ended");
        }
        steps
    }

    #[test]
    fn requires_start() {
        let mut game = SimulatedGame::new(settings());
        assert!(matches!(
            game.perform_action(Action::Left),
            Err(EnvError::Action(_))
        ));
        assert!(matches!(
            game.capture_observation(),
            Err(EnvError::Capture(_))
        ));
    }

    #[test]
    fn rejects_impossible_settings() {
        let mut game = SimulatedGame::new(SimulatedGameSettings {
            lanes: 0,
            ..settings()
        });
        assert!(matches!(game.start(), Err(EnvError::Start(_))));
    }

    #[test]
    fn observation_has_configured_size() {
        let mut game = SimulatedGame::new(settings());
        game.start().unwrap();
        let frame = game.capture_observation().unwrap();
        assert_eq!((frame.width(), frame.height()), (24, 24));
        assert!(frame.data().iter().any(|&px| px == PLAYER_COLOR.0));
    }

    #[test]
    fn death_is_detected_late() {
        let mut game = SimulatedGame::new(settings());
        game.start().unwrap();
        play_until_crash(&mut game);
        let score = game.score();
        for _ in 0..3 {
            assert!(!game.is_terminal().unwrap());
            game.perform_action(Action::Up).unwrap();
        }
        assert!(game.is_terminal().unwrap());
        let frame = game.capture_observation().unwrap();
        assert!(frame.data().iter().all(|&px| px == Color1::WHITE.0));
        assert_eq!(game.extract_final_score().unwrap(), score);
    }

    #[test]
    fn restart_resets_the_board() {
        let mut game = SimulatedGame::new(settings());
        game.start().unwrap();
        play_until_crash(&mut game);
        game.restart_episode().unwrap();
        assert!(!game.crashed());
        assert_eq!(game.score(), 0);
        assert!(matches!(
            game.extract_final_score(),
            Err(EnvError::Transient(_))
        ));
    }

    #[test]
    fn same_seed_same_game() {
        let mut a = SimulatedGame::new(settings());
        let mut b = SimulatedGame::new(settings());
        a.start().unwrap();
        b.start().unwrap();
        assert_eq!(play_until_crash(&mut a), play_until_crash(&mut b));
    }

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let mut game = SimulatedGame::new(settings());
        game.start().unwrap();
        game.shutdown();
        game.shutdown();
        let err = game.perform_action(Action::Nothing).unwrap_err();
        assert!(err.is_fatal());
        assert!(game.start().is_err());
    }
}
