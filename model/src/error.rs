use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("model file i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("model file is not in the expected format: {0}")]
    Format(#[from] bincode::Error),
    #[error("model file has trailing bytes after the weights")]
    TrailingData,
    #[error("model shape mismatch: expected {expected} inputs x {expected_actions} actions, found {found} x {found_actions}")]
    Shape {
        expected: usize,
        expected_actions: usize,
        found: usize,
        found_actions: usize,
    },
}
