#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("environment failed to start: {0}")]
    Start(String),
    #[error("observation capture failed: {0}")]
    Capture(String),
    #[error("action could not be sent: {0}")]
    Action(String),
    #[error("transient environment failure: {0}")]
    Transient(String),
    #[error("environment is unusable: {0}")]
    Fatal(String),
}

impl EnvError {
    /// Whether the driver can no longer be used, as opposed to a flaky frame
    /// that the next iteration may get past.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Start(_) | Self::Fatal(_))
    }
}
