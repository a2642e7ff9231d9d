mod progress;
mod stop_token;

pub use progress::{ProgressMeter, ProgressReport};
pub use stop_token::StopToken;

use crate::agent::Agent;
use crate::env_thread::{run_worker, WorkerContext, WorkerExit, WorkerSettings};
use game_interface::{EnvError, EnvGuard, GameEnv};
use model::traits::Approximator;
use replay_data::{State, Step};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const FINAL_MODEL_FILE: &str = "final_model.bin";

const MONITOR_TICK: Duration = Duration::from_millis(100);
const JOIN_POLL: Duration = Duration::from_millis(10);

/// What the monitor does about a worker that exited on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep training with the workers that are left.
    #[default]
    RunDegraded,
    /// Start a replacement with a fresh environment.
    Respawn,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub workers: usize,
    pub checkpoint_dir: PathBuf,
    pub report_interval_ms: u64,
    /// How long `stop` waits for workers before abandoning them.
    pub shutdown_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Replacement workers allowed over the whole run under `Respawn`.
    pub respawn_limit: u32,
    /// Stop on our own after this many committed episodes.
    pub episode_budget: Option<u64>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            checkpoint_dir: PathBuf::from("checkpoints"),
            report_interval_ms: 10_000,
            shutdown_timeout_ms: 30_000,
            failure_policy: FailurePolicy::default(),
            respawn_limit: 5,
            episode_budget: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OrchestratorError {
    #[error("training needs at least one worker")]
    NoWorkers,
    #[error("training was already started")]
    AlreadyStarted,
    #[error("worker {worker} could not start its environment")]
    EnvStart {
        worker: usize,
        #[source]
        source: EnvError,
    },
    #[error("could not spawn thread for worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a training run, once every worker is accounted for.
#[derive(Clone, Debug, Default)]
pub struct ShutdownReport {
    pub stopped: usize,
    pub failed: usize,
    pub panicked: usize,
    /// Workers still running at the shutdown deadline, left detached.
    pub abandoned: usize,
    pub respawned: u32,
    pub episodes_completed: u64,
    pub total_steps: u64,
    /// Where the final model went, if saving it worked.
    pub final_model: Option<PathBuf>,
}

struct WorkerHandle {
    id: usize,
    handle: JoinHandle<WorkerExit>,
}

/// Runs one shared agent against several environments, one thread each.
pub struct ParallelTraining<M, F> {
    agent: Arc<Agent<M>>,
    env_factory: F,
    settings: OrchestratorSettings,
    worker_settings: WorkerSettings,
    stop_token: StopToken,
    workers: Vec<WorkerHandle>,
    next_worker_id: usize,
    started: bool,
    tally: ShutdownReport,
    shutdown: Option<ShutdownReport>,
}

impl<M, E, F> ParallelTraining<M, F>
where
    M: Approximator<State, Step> + Send + 'static,
    E: GameEnv + Send + 'static,
    F: FnMut(usize) -> E,
{
    /// `env_factory` builds the environment for the worker with the given id.
    pub fn new(
        agent: Arc<Agent<M>>,
        env_factory: F,
        settings: OrchestratorSettings,
        worker_settings: WorkerSettings,
    ) -> Self {
        Self {
            agent,
            env_factory,
            settings,
            worker_settings,
            stop_token: StopToken::new(),
            workers: vec![],
            next_worker_id: 0,
            started: false,
            tally: ShutdownReport::default(),
            shutdown: None,
        }
    }

    pub fn agent(&self) -> &Arc<Agent<M>> {
        &self.agent
    }

    /// Handle for stopping the run from another thread.
    pub fn stop_token(&self) -> StopToken {
        self.stop_token.clone()
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Spawns `n_workers` and monitors them until the run is stopped, by the
    /// token, the episode budget or the last worker exiting. Then shuts down
    /// as `stop` does.
    ///
    /// If any environment fails to start, the workers spawned so far are
    /// stopped and the error is returned.
    pub fn start(&mut self, n_workers: usize) -> Result<ShutdownReport, OrchestratorError> {
        if self.started {
            return Err(OrchestratorError::AlreadyStarted);
        }
        self.started = true;
        if let Err(error) = self.spawn_workers(n_workers) {
            error!(%error, "startup failed, stopping workers");
            self.stop_token.stop();
            self.join_workers(self.shutdown_deadline());
            self.agent.close();
            return Err(error);
        }
        info!(workers = n_workers, "training started");
        self.monitor();
        Ok(self.stop())
    }

    pub fn spawn_workers(&mut self, n_workers: usize) -> Result<(), OrchestratorError> {
        if n_workers == 0 {
            return Err(OrchestratorError::NoWorkers);
        }
        for _ in 0..n_workers {
            self.spawn_worker()?;
        }
        Ok(())
    }

    fn spawn_worker(&mut self) -> Result<(), OrchestratorError> {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        let mut env = EnvGuard::new((self.env_factory)(id));
        env.start()
            .map_err(|source| OrchestratorError::EnvStart { worker: id, source })?;
        let ctx = WorkerContext {
            id,
            agent: Arc::clone(&self.agent),
            stop: self.stop_token.clone(),
            settings: self.worker_settings.clone(),
            checkpoint_dir: self.settings.checkpoint_dir.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || run_worker(env, ctx))
            .map_err(|source| OrchestratorError::Spawn { worker: id, source })?;
        self.workers.push(WorkerHandle { id, handle });
        debug!(worker = id, "worker spawned");
        Ok(())
    }

    fn monitor(&mut self) {
        let report_interval = Duration::from_millis(self.settings.report_interval_ms);
        let mut meter = ProgressMeter::new(self.agent.total_steps());
        let mut last_report = Instant::now();
        while !self.stop_token.wait_timeout(MONITOR_TICK.min(report_interval)) {
            self.reap_finished_workers();
            if last_report.elapsed() >= report_interval {
                let report = meter.report(self.agent.status(), self.workers.len());
                info!("{report}");
                last_report = Instant::now();
            }
            if self.workers.is_empty() {
                error!("no workers left, stopping");
                self.stop_token.stop();
            } else if let Some(budget) = self.settings.episode_budget {
                if self.agent.episodes_completed() >= budget {
                    info!(budget, "episode budget reached, stopping");
                    self.stop_token.stop();
                }
            }
        }
    }

    fn reap_finished_workers(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.workers)
            .into_iter()
            .partition(|worker| worker.handle.is_finished());
        self.workers = running;
        for worker in finished {
            let failed = self.record_exit(worker);
            if failed && self.should_respawn() {
                self.tally.respawned += 1;
                match self.spawn_worker() {
                    Ok(()) => info!(live = self.workers.len(), "replacement worker spawned"),
                    Err(error) => error!(%error, "could not respawn worker"),
                }
            }
        }
    }

    fn should_respawn(&self) -> bool {
        self.settings.failure_policy == FailurePolicy::Respawn
            && self.tally.respawned < self.settings.respawn_limit
            && !self.stop_token.is_stopped()
    }

    /// Joins a finished worker; returns whether it ended abnormally.
    fn record_exit(&mut self, worker: WorkerHandle) -> bool {
        match worker.handle.join() {
            Ok(WorkerExit::Stopped { .. }) => {
                self.tally.stopped += 1;
                false
            }
            Ok(WorkerExit::Failed { episodes, error }) => {
                warn!(worker = worker.id, episodes, %error, "worker exited");
                self.tally.failed += 1;
                true
            }
            Err(_) => {
                error!(worker = worker.id, "worker panicked");
                self.tally.panicked += 1;
                true
            }
        }
    }

    fn shutdown_deadline(&self) -> Instant {
        Instant::now() + Duration::from_millis(self.settings.shutdown_timeout_ms)
    }

    fn join_workers(&mut self, deadline: Instant) {
        for worker in std::mem::take(&mut self.workers) {
            while !worker.handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL);
            }
            if worker.handle.is_finished() {
                self.record_exit(worker);
            } else {
                warn!(worker = worker.id, "worker did not stop in time, abandoning it");
                self.tally.abandoned += 1;
            }
        }
    }

    /// Stops every worker, waits for them up to the shutdown timeout and
    /// saves the final model. Calling it again returns the same report.
    pub fn stop(&mut self) -> ShutdownReport {
        if let Some(report) = &self.shutdown {
            return report.clone();
        }
        self.stop_token.stop();
        self.join_workers(self.shutdown_deadline());
        // abandoned workers may still finish an episode; it must not land
        self.agent.close();

        let path = self.settings.checkpoint_dir.join(FINAL_MODEL_FILE);
        let final_model = match self.agent.save(&path) {
            Ok(()) => {
                info!(path = %path.display(), "final model saved");
                Some(path)
            }
            Err(error) => {
                error!(%error, "could not save final model");
                None
            }
        };
        let report = ShutdownReport {
            episodes_completed: self.agent.episodes_completed(),
            total_steps: self.agent.total_steps(),
            final_model,
            ..self.tally.clone()
        };
        info!(
            episodes = report.episodes_completed,
            steps = report.total_steps,
            failed = report.failed,
            abandoned = report.abandoned,
            "training stopped"
        );
        self.shutdown = Some(report.clone());
        report
    }
}

impl<M, F> Drop for ParallelTraining<M, F> {
    fn drop(&mut self) {
        self.stop_token.stop();
    }
}
