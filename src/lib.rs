//! staleguard - application version reconciliation and forced-reload protocol.
//!
//! This library decides, at startup and periodically afterwards, whether the
//! currently loaded client code is stale relative to the deployed version,
//! and orchestrates a safe transition to new code: normal main-script load,
//! forced bootstrap-script swap, or a full page reload coordinated with a
//! service-worker update.
//!
//! The environment (script injection, page reload, flag persistence, version
//! endpoint) is abstracted behind traits so the state machine itself stays
//! host-agnostic.
//!
//! # Example
//!
//! ```no_run
//! use staleguard::{
//!     HttpVersionProbe, MemoryFlagStore, NullHost, Reconciler, ReconcilerConfig,
//! };
//!
//! # async fn example() -> staleguard::Result<()> {
//! let config = ReconcilerConfig::new(
//!     "18.1.2",
//!     "/assets/index.js",
//!     "https://example.com/api/app-version",
//! );
//! let probe = HttpVersionProbe::new(config.version_api_url.clone());
//! let reconciler = Reconciler::new(config, MemoryFlagStore::new(), NullHost, probe)?;
//!
//! // Decide how to boot this session; also schedules the deferred check.
//! reconciler.initialize();
//!
//! // Later, when the runtime learns of a server-reported version string:
//! reconciler.reconcile("18.2.0")?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod flag;
pub mod probe;
pub mod reconciler;
pub mod script;
pub mod version;

// Re-export main types for convenience
pub use config::{FileConfig, ReconcilerConfig};
pub use error::{Error, Result};
pub use flag::{FileFlagStore, FlagStore, MemoryFlagStore, MismatchFlag, MISMATCH_FLAG_KEY};
pub use probe::{HttpVersionProbe, VersionProbe};
pub use reconciler::{LoadPhase, Reconciler, ReloadOutcome, ScriptLoadOutcome};
pub use script::{CredentialsMode, NullHost, ScriptHost, ScriptTag, UpdateTrigger};
pub use version::SemVer;
