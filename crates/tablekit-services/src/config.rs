//! Engine configuration

use serde::{Deserialize, Serialize};
use tablekit_connection::PoolConfig;

use crate::error::{ServiceError, ServiceResult};

/// Engine-wide configuration, loadable from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Connection pool sizing and timeouts
    pub pool: PoolConfig,
    /// Whether a forced structural update refuses to proceed when its
    /// safety-net backup failed
    pub require_backup_for_forced_updates: bool,
    /// Whether non-forced structural changes attempt a best-effort backup
    pub backup_on_structural_changes: bool,
    /// Default row limit for listing table data
    pub row_page_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            require_backup_for_forced_updates: true,
            backup_on_structural_changes: true,
            row_page_limit: 500,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(raw: &str) -> ServiceResult<Self> {
        toml::from_str(raw).map_err(|e| ServiceError::Configuration(e.to_string()))
    }
}
