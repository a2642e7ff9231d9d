pub mod agent;
mod args;
pub mod console_thread;
pub mod env_thread;
pub mod master_thread;
pub mod settings;

pub use args::Args;
