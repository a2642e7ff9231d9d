use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON settings file. Missing sections and fields keep their defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Number of parallel game workers.
    #[arg(short, long)]
    pub workers: Option<usize>,
    /// Directory for periodic checkpoints and the final model.
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
    /// Model to resume from. Training starts from scratch if it cannot be loaded.
    #[arg(short, long)]
    pub load: Option<PathBuf>,
    /// Stop after this many completed episodes.
    #[arg(short, long)]
    pub episodes: Option<u64>,
    /// Do not read commands from stdin.
    #[arg(long)]
    pub no_console: bool,
}
