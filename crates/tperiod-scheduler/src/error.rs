use thiserror::Error;

/// Errors that can occur within the refresher.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The refresher settings cannot drive a periodic task.
    #[error("Invalid refresher configuration: {0}")]
    InvalidConfig(String),

    /// The refresher task panicked or was cancelled.
    #[error("Refresher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
