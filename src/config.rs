//! Configuration types for the version reconciler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Delay before the deferred update check fires after initialization.
pub const UPDATE_CHECK_DELAY: Duration = Duration::from_secs(5);

/// Grace period between triggering a service-worker update and the fallback
/// page reload.
pub const RELOAD_GRACE: Duration = Duration::from_secs(5);

/// Minimum elapsed time before a forced reload shows a user-facing notice.
/// An instant reload right after load should not visibly interrupt the user.
pub const NOTICE_THRESHOLD: Duration = Duration::from_secs(10);

/// Cooldown after a forced script load during which reload escalation is
/// suppressed.
pub const FORCE_LOAD_COOLDOWN: Duration = Duration::from_secs(30 * 60);

/// Immutable reconciler configuration, supplied once at startup.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Version string of the locally loaded application code.
    pub local_version: String,
    /// URL of the latest bootstrap script; a cache-busting query parameter is
    /// appended at injection time.
    pub latest_index_url: String,
    /// URL of the deployed-version query endpoint.
    pub version_api_url: String,
    /// `crossorigin` attribute applied to injected bootstrap scripts.
    pub cross_origin: Option<String>,
    /// Delay before the deferred update check.
    pub update_check_delay: Duration,
    /// Grace period before the reload that follows a service-worker update.
    pub reload_grace: Duration,
    /// Elapsed time past which a forced reload shows the user notice.
    pub notice_threshold: Duration,
    /// Window after a forced load during which reload escalation is refused.
    pub force_load_cooldown: Duration,
}

impl ReconcilerConfig {
    /// Creates a configuration with the protocol's default timings.
    #[must_use]
    pub fn new(
        local_version: impl Into<String>,
        latest_index_url: impl Into<String>,
        version_api_url: impl Into<String>,
    ) -> Self {
        Self {
            local_version: local_version.into(),
            latest_index_url: latest_index_url.into(),
            version_api_url: version_api_url.into(),
            cross_origin: None,
            update_check_delay: UPDATE_CHECK_DELAY,
            reload_grace: RELOAD_GRACE,
            notice_threshold: NOTICE_THRESHOLD,
            force_load_cooldown: FORCE_LOAD_COOLDOWN,
        }
    }

    /// Sets the `crossorigin` attribute for injected scripts.
    #[must_use]
    pub fn with_cross_origin(mut self, attr: impl Into<String>) -> Self {
        self.cross_origin = Some(attr.into());
        self
    }

    /// Sets the deferred update check delay.
    #[must_use]
    pub const fn with_update_check_delay(mut self, delay: Duration) -> Self {
        self.update_check_delay = delay;
        self
    }

    /// Sets the reload grace period.
    #[must_use]
    pub const fn with_reload_grace(mut self, grace: Duration) -> Self {
        self.reload_grace = grace;
        self
    }

    /// Sets the user-notice threshold.
    #[must_use]
    pub const fn with_notice_threshold(mut self, threshold: Duration) -> Self {
        self.notice_threshold = threshold;
        self
    }

    /// Sets the force-load cooldown window.
    #[must_use]
    pub const fn with_force_load_cooldown(mut self, cooldown: Duration) -> Self {
        self.force_load_cooldown = cooldown;
        self
    }
}

/// On-disk configuration consumed by the `staleguard` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Version string of the locally deployed client.
    pub local_version: String,
    /// Deployed-version query endpoint.
    pub version_api_url: String,
    /// Latest bootstrap script URL.
    #[serde(default)]
    pub latest_index_url: Option<String>,
    /// Directory for the persisted mismatch flag.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Polling interval in seconds; absent means a single check.
    #[serde(default)]
    pub watch_secs: Option<u64>,
}

impl FileConfig {
    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e).into()
        })
    }
}
