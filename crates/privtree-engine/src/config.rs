//! Engine configuration.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! PRIVTREE_REVERT_WINDOW_SECS=300   # how long a move can be undone
//! PRIVTREE_CASCADE_WALK=inclusive   # or "exclusive"
//! PRIVTREE_LOG=info                 # default log filter for binaries
//! ```

use std::env;
use thiserror::Error;

use crate::resolver::WalkBoundary;

pub const DEFAULT_REVERT_WINDOW_SECS: u64 = 300;
/// Longest accepted revert window: one week.
pub const MAX_REVERT_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seconds a move's revert token stays valid.
    pub revert_window_secs: u64,
    /// Whether cascaded resolution for a node includes that node's own
    /// block/cascade rows.
    pub walk_boundary: WalkBoundary,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            revert_window_secs: DEFAULT_REVERT_WINDOW_SECS,
            walk_boundary: WalkBoundary::Inclusive,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid revert window: {0}. Expected whole seconds between 0 and {MAX_REVERT_WINDOW_SECS}")]
    InvalidRevertWindow(String),

    #[error("Invalid cascade walk: {0}. Expected 'inclusive' or 'exclusive'")]
    InvalidWalkBoundary(String),
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let revert_window_secs = match env::var("PRIVTREE_REVERT_WINDOW_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs <= MAX_REVERT_WINDOW_SECS => secs,
                _ => return Err(ConfigError::InvalidRevertWindow(raw)),
            },
            Err(_) => DEFAULT_REVERT_WINDOW_SECS,
        };

        let walk_boundary = match env::var("PRIVTREE_CASCADE_WALK") {
            Ok(raw) => raw
                .parse::<WalkBoundary>()
                .map_err(|_| ConfigError::InvalidWalkBoundary(raw))?,
            Err(_) => WalkBoundary::Inclusive,
        };

        let log_filter =
            env::var("PRIVTREE_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            revert_window_secs,
            walk_boundary,
            log_filter,
        })
    }

    /// The revert window as a duration, saturating at the largest one
    /// chrono can represent.
    pub fn revert_window(&self) -> chrono::Duration {
        i64::try_from(self.revert_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
