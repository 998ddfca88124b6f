//! Driver registry for managing available database drivers

use std::collections::HashMap;
use std::sync::Arc;
use tablekit_core::{DatabaseDriver, DialectInfo};

/// Registry of available database drivers
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(tablekit_driver_sqlite::SqliteDriver::new()));

        registry
    }

    /// Register a new driver
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering database driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(name).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names
    pub fn list(&self) -> Vec<&str> {
        self.drivers.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Get dialect info for a driver by name
    pub fn dialect_info(&self, name: &str) -> Option<DialectInfo> {
        self.drivers.get(name).map(|driver| driver.dialect_info())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Get dialect info for a driver by name without a registry instance.
///
/// Unknown names fall back to the default dialect; callers that care use
/// `DriverRegistry::dialect_info` and handle the `None`.
pub fn get_dialect_info(driver_name: &str) -> DialectInfo {
    match driver_name.to_lowercase().as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => DialectInfo::sqlite(),
        "postgres" | "postgresql" => DialectInfo::postgres(),
        _ => DialectInfo::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_sqlite() {
        let registry = DriverRegistry::with_defaults();
        assert!(registry.has("sqlite"));
        assert!(registry.get("sqlite").is_some());
        assert!(registry.get("mysql").is_none());
    }

    #[test]
    fn dialect_lookup_by_name() {
        assert_eq!(get_dialect_info("sqlite").id, "sqlite");
        assert_eq!(get_dialect_info("PostgreSQL").id, "postgres");
        assert_eq!(get_dialect_info("unknown").id, DialectInfo::default().id);
    }
}
