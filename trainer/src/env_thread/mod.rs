mod frame_stack;

pub use frame_stack::FrameStack;

use crate::agent::Agent;
use crate::master_thread::StopToken;
use file_io::create_file_buf_write;
use game_interface::{EnvError, EnvGuard, GameEnv};
use model::traits::Approximator;
use replay_data::{Action, Episode, EpisodeError, State, Step, TrimPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Observations stacked into one state.
    pub frame_stack: usize,
    pub trim: TrimPolicy,
    /// Save a checkpoint every this many episodes of one worker; 0 disables.
    pub checkpoint_every: u64,
    /// Transient environment failures in a row before the worker gives up.
    pub max_consecutive_failures: u32,
    /// Lower bound on the duration of one step, for games that run in real
    /// time. 0 runs as fast as the environment allows.
    pub min_step_interval_ms: u64,
    /// Write the frame stack at every death to `checkpoint_dir` as a PGM
    /// montage, for checking what the agent saw.
    pub dump_death_frames: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            frame_stack: 4,
            trim: TrimPolicy::default(),
            checkpoint_every: 50,
            max_consecutive_failures: 10,
            min_step_interval_ms: 0,
            dump_death_frames: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("environment failed: {0}")]
    Env(#[from] EnvError),
    #[error("{count} consecutive environment failures, last: {last}")]
    TooManyFailures { count: u32, last: EnvError },
    #[error(transparent)]
    Episode(#[from] EpisodeError),
}

/// How a worker thread ended.
#[derive(Debug)]
pub enum WorkerExit {
    Stopped { episodes: u64 },
    Failed { episodes: u64, error: WorkerError },
}

impl WorkerExit {
    pub fn episodes(&self) -> u64 {
        match *self {
            Self::Stopped { episodes } | Self::Failed { episodes, .. } => episodes,
        }
    }
}

pub struct WorkerContext<M> {
    pub id: usize,
    pub agent: Arc<Agent<M>>,
    pub stop: StopToken,
    pub settings: WorkerSettings,
    pub checkpoint_dir: PathBuf,
}

enum EpisodeEnd {
    Completed,
    Stopped,
}

/// Counts transient failures in a row; any successful step resets it.
struct FailureBudget {
    worker: usize,
    consecutive: u32,
    max: u32,
}

impl FailureBudget {
    fn absorb(&mut self, error: EnvError) -> Result<(), WorkerError> {
        if error.is_fatal() {
            return Err(error.into());
        }
        self.consecutive += 1;
        warn!(
            worker = self.worker,
            consecutive = self.consecutive,
            %error,
            "environment failure"
        );
        if self.consecutive >= self.max {
            return Err(WorkerError::TooManyFailures {
                count: self.consecutive,
                last: error,
            });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Plays episodes until the stop token fires or the environment fails for
/// good. The environment is shut down when `env` drops, on every path.
pub fn run_worker<M, E>(mut env: EnvGuard<E>, ctx: WorkerContext<M>) -> WorkerExit
where
    M: Approximator<State, Step>,
    E: GameEnv,
{
    info!(worker = ctx.id, "worker started");
    let mut failures = FailureBudget {
        worker: ctx.id,
        consecutive: 0,
        max: ctx.settings.max_consecutive_failures,
    };
    let mut episodes = 0;
    let exit = loop {
        if ctx.stop.is_stopped() {
            break WorkerExit::Stopped { episodes };
        }
        match play_episode(&mut *env, &ctx, &mut failures) {
            Ok(EpisodeEnd::Completed) => {
                episodes += 1;
                save_checkpoint(&ctx, episodes);
            }
            Ok(EpisodeEnd::Stopped) => break WorkerExit::Stopped { episodes },
            Err(error) => {
                error!(worker = ctx.id, %error, "worker failed");
                break WorkerExit::Failed { episodes, error };
            }
        }
    };
    info!(worker = ctx.id, episodes, "worker finished");
    exit
}

fn play_episode<M, E>(
    env: &mut E,
    ctx: &WorkerContext<M>,
    failures: &mut FailureBudget,
) -> Result<EpisodeEnd, WorkerError>
where
    M: Approximator<State, Step>,
    E: GameEnv,
{
    let first = loop {
        if ctx.stop.is_stopped() {
            return Ok(EpisodeEnd::Stopped);
        }
        match env.capture_observation() {
            Ok(frame) => break frame,
            Err(error) => failures.absorb(error)?,
        }
    };
    let mut frames = FrameStack::new(ctx.settings.frame_stack, Arc::new(first));
    let mut episode = Episode::with_trim_policy(ctx.settings.trim);
    let mut state = frames.state();
    let step_interval = Duration::from_millis(ctx.settings.min_step_interval_ms);
    ctx.agent.start_episode();

    loop {
        if ctx.stop.is_stopped() {
            debug!(
                worker = ctx.id,
                steps = episode.len(),
                "dropping unfinished episode"
            );
            return Ok(EpisodeEnd::Stopped);
        }
        let step_started = Instant::now();
        match advance(env, &ctx.agent, &mut frames, &state) {
            Ok((_, _, true)) => break,
            Ok((action, next_state, false)) => {
                failures.reset();
                ctx.agent
                    .record_step(&mut episode, state, action, next_state.clone())?;
                state = next_state;
            }
            Err(error) => failures.absorb(error)?,
        }
        if let Some(rest) = step_interval.checked_sub(step_started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    if ctx.settings.dump_death_frames {
        dump_death_frames(ctx, &frames);
    }

    let final_score = match env.extract_final_score() {
        Ok(score) => score,
        Err(error) if error.is_fatal() => return Err(error.into()),
        Err(error) => {
            warn!(worker = ctx.id, %error, "no final score, recording 0");
            0
        }
    };
    let steps = episode.len();
    ctx.agent.end_episode(episode, final_score)?;
    info!(worker = ctx.id, score = final_score, steps, "episode finished");

    loop {
        match env.restart_episode() {
            Ok(()) => break,
            Err(error) => failures.absorb(error)?,
        }
        if ctx.stop.is_stopped() {
            break;
        }
    }
    Ok(EpisodeEnd::Completed)
}

/// One agent-environment interaction. Yields the chosen action, the state
/// after it and whether the game reported death.
fn advance<M, E>(
    env: &mut E,
    agent: &Agent<M>,
    frames: &mut FrameStack,
    state: &State,
) -> Result<(Action, State, bool), EnvError>
where
    M: Approximator<State, Step>,
    E: GameEnv,
{
    let action = agent.select_action(state);
    env.perform_action(action)?;
    let frame = env.capture_observation()?;
    let terminal = env.is_terminal()?;
    frames.push(Arc::new(frame));
    Ok((action, frames.state(), terminal))
}

fn save_checkpoint<M>(ctx: &WorkerContext<M>, episodes: u64)
where
    M: Approximator<State, Step>,
{
    let every = ctx.settings.checkpoint_every;
    if every == 0 || episodes % every != 0 {
        return;
    }
    let path = ctx
        .checkpoint_dir
        .join(format!("checkpoint_worker{}_ep{episodes}.bin", ctx.id));
    match ctx.agent.save(&path) {
        Ok(()) => info!(worker = ctx.id, path = %path.display(), "checkpoint saved"),
        Err(error) => error!(worker = ctx.id, %error, "checkpoint failed"),
    }
}

fn dump_death_frames<M>(ctx: &WorkerContext<M>, frames: &FrameStack)
where
    M: Approximator<State, Step>,
{
    let episode = ctx.agent.episode_count();
    let path = ctx
        .checkpoint_dir
        .join(format!("death_worker{}_ep{episode}.pgm", ctx.id));
    match create_file_buf_write(&path).and_then(|file| frames.montage().write_pgm(file)) {
        Ok(()) => debug!(worker = ctx.id, path = %path.display(), "death frames dumped"),
        Err(error) => warn!(worker = ctx.id, %error, "could not dump death frames"),
    }
}
