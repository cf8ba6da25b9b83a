/// Error taxonomy for the analysis pipeline.
///
/// `Fetch` aborts the current wallet cycle and is retried on the next
/// scheduled run. `Oracle` and `Persistence` are degraded-but-non-fatal at
/// the call site; they only surface here when a caller chooses to propagate.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("Event feed error: {0}")]
    Fetch(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Store error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;
