use thiserror::Error;

use crate::config::ConfigError;

/// Unified application error.
///
/// Covers the fatal startup paths (environment and rule file); platform
/// errors never reach here — the scheduler and compliance workflows handle
/// them locally and keep running.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    RuleFile(#[from] ConfigError),
}
