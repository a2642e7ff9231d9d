use crate::agent::Agent;
use crate::master_thread::StopToken;
use model::traits::Approximator;
use replay_data::{State, Step};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::warn;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Save(PathBuf),
    Status,
    Stop,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let words = line.split_whitespace().collect::<Vec<_>>();
    match words[..] {
        ["save", path] => Some(Command::Save(PathBuf::from(path))),
        ["status"] => Some(Command::Status),
        ["stop"] | ["close"] => Some(Command::Stop),
        _ => None,
    }
}

/// Reads operator commands from stdin until `stop` is entered or stdin
/// closes. The thread is never joined: it may sit in a blocking read after
/// training has ended.
pub fn spawn_console_thread<M>(agent: Arc<Agent<M>>, stop: StopToken) -> io::Result<JoinHandle<()>>
where
    M: Approximator<State, Step> + Send + 'static,
{
    thread::Builder::new()
        .name("console".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(error) => {
                        warn!(%error, "console input failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(Command::Save(path)) => match agent.save(&path) {
                        Ok(()) => println!("saved model to {}", path.display()),
                        Err(error) => eprintln!("could not save model: {error}"),
                    },
                    Some(Command::Status) => println!("{}", agent.status()),
                    Some(Command::Stop) => {
                        stop.stop();
                        break;
                    }
                    None => println!("invalid command"),
                }
                if stop.is_stopped() {
                    break;
                }
            }
        })
}
