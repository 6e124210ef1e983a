//! Configuration for the session manager.

use std::time::Duration;

use crate::store::memory::STORE_MEMORY;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default idle lifetime of a session.
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// Construction parameters for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Registered name of the backend to use.
    pub backend: String,

    /// How often the background task looks for idle sessions.
    pub sweep_interval: Duration,

    /// Sessions untouched for longer than this are expired by the sweep.
    pub max_lifetime: Duration,

    /// Opaque payload handed to the backend factory.
    pub backend_config: String,

    /// Whether to spawn the background sweep task.
    /// If false, idle sessions are only removed by [`sweep_now`](crate::SessionManager::sweep_now).
    pub enable_sweep: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backend: STORE_MEMORY.to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            backend_config: String::new(),
            enable_sweep: true,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the backend by its registered name.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = name.into();
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the idle lifetime of a session.
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set the backend configuration payload.
    pub fn with_backend_config(mut self, conf: impl Into<String>) -> Self {
        self.backend_config = conf.into();
        self
    }

    /// Enable or disable the background sweep task.
    pub fn with_sweep(mut self, enabled: bool) -> Self {
        self.enable_sweep = enabled;
        self
    }
}
