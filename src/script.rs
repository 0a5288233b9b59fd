//! Bootstrap script injection descriptions and the host environment seam.

use std::fmt;

/// Credentials mode applied when fetching an injected script, derived from
/// the element's `crossorigin` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    /// `crossorigin="use-credentials"`.
    Include,
    /// `crossorigin="anonymous"`.
    Omit,
    /// No recognized `crossorigin` attribute.
    SameOrigin,
}

impl CredentialsMode {
    /// Maps a `crossorigin` attribute value to a credentials mode.
    #[must_use]
    pub fn from_cross_origin(attr: Option<&str>) -> Self {
        match attr {
            Some("use-credentials") => Self::Include,
            Some("anonymous") => Self::Omit,
            _ => Self::SameOrigin,
        }
    }
}

/// Description of a `<script>` element the host must create to load a
/// bootstrap script.
///
/// Bootstrap scripts are by definition deferred modules (`type="module"`,
/// `defer` set); only the URL and credentials mode vary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
    /// Source URL of the script.
    pub url: String,
    /// Credentials mode for the fetch.
    pub credentials: CredentialsMode,
}

impl ScriptTag {
    /// Builds the tag for a bootstrap script at `url`.
    #[must_use]
    pub fn bootstrap(url: impl Into<String>, cross_origin: Option<&str>) -> Self {
        Self {
            url: url.into(),
            credentials: CredentialsMode::from_cross_origin(cross_origin),
        }
    }
}

impl fmt::Display for ScriptTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<script type=\"module\" defer src=\"{}\">", self.url)
    }
}

/// Appends a cache-busting `t=<millis>` query parameter to `url`.
#[must_use]
pub fn cache_busted(url: &str, millis: i64) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={millis}")
}

/// [`cache_busted`] using the current wall-clock time.
#[must_use]
pub fn cache_busted_now(url: &str) -> String {
    cache_busted(url, chrono::Utc::now().timestamp_millis())
}

/// Zero-argument trigger for a service-worker-driven update. May fail.
pub type UpdateTrigger =
    Box<dyn FnOnce() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// Abstraction over the environment that hosts the application scripts.
///
/// Implement this trait to connect the reconciler to an actual page (or an
/// embedder's equivalent). Methods that not every host can answer have
/// default implementations.
pub trait ScriptHost: Send + Sync {
    /// Loads the main application bundle.
    fn load_main_script(&self);

    /// Injects a new bootstrap script element into the document.
    fn inject_bootstrap_script(&self, script: &ScriptTag);

    /// Returns `true` if a script element with this exact URL already exists.
    fn has_script(&self, url: &str) -> bool {
        let _ = url;
        false
    }

    /// Presents a blocking user-facing notice before a visible reload.
    fn show_update_notice(&self, message: &str) {
        let _ = message;
    }

    /// Performs a full page reload.
    fn reload_page(&self);

    /// Returns the optional service-worker update trigger, if one is
    /// registered.
    fn service_worker_updater(&self) -> Option<UpdateTrigger> {
        None
    }
}

/// A host that ignores all script operations.
///
/// Useful for headless contexts where only flag bookkeeping matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl ScriptHost for NullHost {
    fn load_main_script(&self) {}

    fn inject_bootstrap_script(&self, _script: &ScriptTag) {}

    fn reload_page(&self) {}
}
