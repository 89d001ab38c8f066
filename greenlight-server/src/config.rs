//! Engine configuration from the environment.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::history::MAX_HISTORY_LIMIT;

/// Runtime configuration for an embedding service.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// Default page size for history reads.
    pub history_page_size: usize,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let database_path = env::var("GREENLIGHT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("greenlight.db"));

        let history_page_size = env::var("GREENLIGHT_HISTORY_PAGE_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse::<usize>()
            .context("GREENLIGHT_HISTORY_PAGE_SIZE must be a valid number")?;
        if history_page_size == 0 || history_page_size > MAX_HISTORY_LIMIT {
            anyhow::bail!(
                "GREENLIGHT_HISTORY_PAGE_SIZE must be between 1 and {}",
                MAX_HISTORY_LIMIT
            );
        }

        Ok(Self {
            database_path,
            history_page_size,
        })
    }
}
