use anyhow::Context;
use clap::Parser;
use game_interface::{SimulatedGame, SimulatedGameSettings};
use model::traits::Persistable;
use model::LinearModel;
use replay_memories::SharedEpisodeReplay;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trainer::agent::Agent;
use trainer::console_thread::spawn_console_thread;
use trainer::master_thread::ParallelTraining;
use trainer::settings::TrainerSettings;
use trainer::Args;

// The replay holds thousands of episodes whose frames are freed in arrival
// order as episodes are evicted. With the system allocator that pattern
// fragments the heap badly and resident memory keeps growing long after the
// buffer is full. jemalloc keeps it flat.
#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => TrainerSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => TrainerSettings::default(),
    };
    settings.apply_args(&args);
    settings.validate()?;

    let mut model = LinearModel::new(settings.input_len(), settings.model);
    if let Some(path) = &args.load {
        match model.load(path) {
            Ok(()) => info!(path = %path.display(), "resuming from saved model"),
            Err(error) => {
                warn!(path = %path.display(), %error, "could not load model, starting fresh");
            }
        }
    }
    let replay = SharedEpisodeReplay::new(settings.replay.max_episodes, settings.replay.retention);
    let agent = Arc::new(Agent::new(model, replay, settings.agent.clone()));

    let game = settings.game.clone();
    let env_factory = move |worker: usize| {
        SimulatedGame::new(SimulatedGameSettings {
            seed: game.seed.map(|seed| seed.wrapping_add(worker as u64)),
            ..game.clone()
        })
    };
    let mut training = ParallelTraining::new(
        Arc::clone(&agent),
        env_factory,
        settings.orchestrator.clone(),
        settings.worker.clone(),
    );
    if !args.no_console {
        spawn_console_thread(Arc::clone(&agent), training.stop_token())
            .context("spawning console thread")?;
    }

    let report = training
        .start(settings.orchestrator.workers)
        .context("training failed to start")?;
    info!(
        episodes = report.episodes_completed,
        steps = report.total_steps,
        failed_workers = report.failed + report.panicked,
        "done"
    );
    if report.final_model.is_none() {
        anyhow::bail!("training finished but the final model was not saved");
    }
    Ok(())
}
