pub mod config;
pub mod db;
pub mod error;
pub mod holdings;
pub mod indexer;
pub mod ledger;
pub mod metrics;
pub mod oracle;
pub mod types;

pub use crate::error::{AppError, AppResult};
