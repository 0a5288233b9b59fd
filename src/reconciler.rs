//! The version-reconciliation and forced-reload state machine.
//!
//! On every startup the reconciler decides whether the loaded client code is
//! stale relative to the deployed version, and orchestrates either a normal
//! main-script load, a forced bootstrap-script swap, or a full page reload
//! coordinated with a service-worker update.
//!
//! The persisted [`MismatchFlag`] is the only state that survives reloads;
//! everything else lives in a per-session context discarded on navigation.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::flag::{FlagStore, MismatchFlag};
use crate::probe::VersionProbe;
use crate::script::{ScriptHost, ScriptTag, cache_busted_now};
use crate::version::SemVer;

/// Progress of script loading within the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// No load path has begun.
    NotStarted,
    /// A forced bootstrap load is in flight; the main script is not yet
    /// loaded.
    Starting,
    /// The main script loader has been invoked.
    Started,
}

/// Outcome of a bootstrap script reporting in during a forced upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLoadOutcome {
    /// Versions converged; the flag was cleared and the main script loaded.
    Converged,
    /// A different bootstrap script was injected; the chain continues until
    /// convergence.
    InjectAnother,
}

/// Outcome of a reload escalation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Suppressed: the latest scripts were force-loaded too recently for a
    /// reload to be safe.
    CooldownActive,
    /// The mismatch flag could not be persisted; nothing was reloaded.
    FlagWriteFailed,
    /// The page was reloaded immediately (no service-worker updater present).
    Reloaded,
    /// A service-worker update was triggered and the page reload scheduled
    /// after the grace period.
    ReloadScheduled,
}

/// Transient per-session state, discarded when the page navigates away.
#[derive(Debug)]
struct ProcessState {
    phase: LoadPhase,
    /// First reconciliation of this session has completed.
    reconciled: bool,
    /// Version string force-loaded this session, if the forced-upgrade path
    /// triggered.
    force_loaded: Option<String>,
}

struct Inner<S, H, P> {
    config: ReconcilerConfig,
    local: SemVer,
    store: S,
    host: H,
    probe: P,
    started_at: Instant,
    state: Mutex<ProcessState>,
}

/// The version reconciler context, constructed once at startup and shared by
/// every operation.
///
/// Cloning is cheap and shares the same session state.
pub struct Reconciler<S, H, P> {
    inner: Arc<Inner<S, H, P>>,
}

impl<S, H, P> Clone for Reconciler<S, H, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, H, P> Reconciler<S, H, P>
where
    S: FlagStore + 'static,
    H: ScriptHost + 'static,
    P: VersionProbe + 'static,
{
    /// Creates the reconciler context and parses the local version baseline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Version`] if the configured local version string is
    /// not of the exact `major.minor.patch` form. The reconciler cannot
    /// safely operate without a valid baseline.
    pub fn new(config: ReconcilerConfig, store: S, host: H, probe: P) -> Result<Self> {
        let local: SemVer = config.local_version.parse()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                local,
                store,
                host,
                probe,
                started_at: Instant::now(),
                state: Mutex::new(ProcessState {
                    phase: LoadPhase::NotStarted,
                    reconciled: false,
                    force_loaded: None,
                }),
            }),
        })
    }

    /// Returns the parsed local version baseline.
    #[must_use]
    pub fn local_version(&self) -> SemVer {
        self.inner.local
    }

    /// Returns the current load phase.
    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        self.state().phase
    }

    /// Returns the currently persisted mismatch flag.
    #[must_use]
    pub fn flag(&self) -> Option<MismatchFlag> {
        self.inner.store.get()
    }

    /// Runs the bootstrap decision for this session.
    ///
    /// With no persisted mismatch flag, the main script is loaded right away
    /// and an update check is scheduled after the configured delay. With a
    /// flag present, the forced-upgrade path injects the latest bootstrap
    /// script instead and defers the main load until the injected script
    /// reports back through [`Self::on_bootstrap_loaded`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (the deferred update check is
    /// a spawned task).
    pub fn initialize(&self) {
        let Some(flag) = self.inner.store.get() else {
            self.spawn_deferred_check();
            self.begin_main_load();
            return;
        };

        let already_forced = self.state().force_loaded.is_some();
        if already_forced {
            // The latest scripts are already active in this session.
            self.begin_main_load();
        } else {
            log::warn!(
                "found app version mismatch flag ({flag}, local={}), force loading latest scripts",
                self.inner.config.local_version
            );
            {
                let mut st = self.state();
                st.force_loaded = Some(self.inner.config.local_version.clone());
                st.phase = LoadPhase::Starting;
            }
            let url = cache_busted_now(&self.inner.config.latest_index_url);
            self.inject(&url);
        }
    }

    /// Transition for a freshly injected bootstrap script reporting its own
    /// version and source URL.
    ///
    /// Convergence (same version as the one that triggered forcing, or a
    /// script already present at that URL) clears the flag and loads the main
    /// script. Anything else injects the reported script and keeps the chain
    /// going; this models multiple deploys landing in quick succession.
    pub fn on_bootstrap_loaded(&self, script_version: &str, script_url: &str) -> ScriptLoadOutcome {
        let expected = {
            let st = self.state();
            st.force_loaded
                .clone()
                .unwrap_or_else(|| self.inner.config.local_version.clone())
        };

        if expected == script_version || self.inner.host.has_script(script_url) {
            log::debug!("same version or script already loaded");
            self.inner.store.clear();
            self.begin_main_load();
            ScriptLoadOutcome::Converged
        } else {
            self.inject(script_url);
            ScriptLoadOutcome::InjectAnother
        }
    }

    /// Reconciles a freshly observed version string against the local
    /// baseline, updating the persisted flag.
    ///
    /// A strictly newer major persists `major` (overwriting any lesser flag),
    /// a strictly newer minor under the same major persists `minor`. An
    /// equal or older version completes reconciliation: on the first such
    /// completion of the session the flag is cleared, unless a forced load
    /// happened for a different version than the one just observed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Version`] for a malformed version string, or an I/O
    /// error if the flag cannot be persisted.
    pub fn reconcile(&self, version_str: &str) -> Result<()> {
        let reported: SemVer = version_str.parse()?;

        match reported.severity_against(&self.inner.local) {
            Some(MismatchFlag::Major) => {
                log::warn!(
                    "found major update ({version_str} > {}), reloading app on next start",
                    self.inner.config.local_version
                );
                self.inner.store.set(MismatchFlag::Major)?;
            }
            Some(MismatchFlag::Minor) => {
                log::warn!("found minor update ({version_str})");
                self.inner.store.set(MismatchFlag::Minor)?;
            }
            None => {
                let mut st = self.state();
                if !st.reconciled {
                    st.reconciled = true;
                    let resolved = st.force_loaded.as_deref().is_none_or(|v| v == version_str);
                    if resolved {
                        drop(st);
                        self.inner.store.clear();
                        log::debug!("removed app version mismatch flag");
                    }
                }
            }
        }
        Ok(())
    }

    /// Queries the version endpoint and flags a major update.
    ///
    /// Only a strictly newer major is elevated by this path; minor bumps and
    /// equal/older results deliberately leave the flag untouched (live
    /// reconciliation via [`Self::reconcile`] handles those). Non-success
    /// responses are ignored without recording anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the reported version is
    /// malformed, or the flag cannot be persisted.
    pub async fn check_for_updates(&self) -> Result<()> {
        let Some(version_str) = self.inner.probe.deployed_version().await? else {
            return Ok(());
        };

        let deployed: SemVer = version_str.parse()?;
        if deployed.major > self.inner.local.major {
            log::warn!(
                "found major update ({version_str} > {}), reloading app on next start",
                self.inner.config.local_version
            );
            self.inner.store.set(MismatchFlag::Major)?;
        }
        Ok(())
    }

    /// Runs the deferred update check unless a load path has already begun.
    pub async fn deferred_update_check(&self) {
        if self.phase() != LoadPhase::NotStarted {
            log::debug!("load already started, skipping deferred update check");
            return;
        }
        match self.check_for_updates().await {
            Ok(()) => {}
            Err(e @ Error::Version(_)) => log::error!("deferred update check: {e}"),
            Err(e) => log::debug!("deferred update check ignored: {e}"),
        }
    }

    /// Escalates to a forced page reload, typically in response to an
    /// external "new version available" signal.
    ///
    /// Within the cooldown window after a forced script load the escalation
    /// is refused. Otherwise the flag is hardened to `major` (verified by
    /// reading it back), a user notice is shown when enough time has passed
    /// since startup for a reload to be visible, and the page is reloaded,
    /// after the grace period when a service-worker updater takes part.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when a service-worker updater
    /// is present (the delayed reload is a spawned task).
    pub fn reload_app(&self) -> ReloadOutcome {
        let elapsed = self.inner.started_at.elapsed();

        {
            let st = self.state();
            if st.force_loaded.is_some() && elapsed < self.inner.config.force_load_cooldown {
                log::error!("can not load the latest scripts: forced load {elapsed:?} ago");
                return ReloadOutcome::CooldownActive;
            }
        }

        if let Err(e) = self.inner.store.set(MismatchFlag::Major) {
            log::error!("can not set version mismatch flag: {e}");
            return ReloadOutcome::FlagWriteFailed;
        }
        if self.inner.store.get() != Some(MismatchFlag::Major) {
            log::error!("version mismatch flag did not persist");
            return ReloadOutcome::FlagWriteFailed;
        }

        if elapsed > self.inner.config.notice_threshold {
            self.inner.host.show_update_notice(
                "New app updates found. The page will reload to apply the latest version.",
            );
        }

        match self.inner.host.service_worker_updater() {
            Some(trigger) => {
                // Schedule the fallback reload first so a failing trigger can
                // never prevent it.
                let this = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(this.inner.config.reload_grace).await;
                    this.inner.host.reload_page();
                });
                if let Err(e) = trigger() {
                    log::error!("service worker update trigger failed: {e}");
                }
                ReloadOutcome::ReloadScheduled
            }
            None => {
                self.inner.host.reload_page();
                ReloadOutcome::Reloaded
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, ProcessState> {
        self.inner.state.lock().expect("state lock poisoned")
    }

    fn begin_main_load(&self) {
        self.state().phase = LoadPhase::Started;
        self.inner.host.load_main_script();
    }

    fn inject(&self, url: &str) {
        let tag = ScriptTag::bootstrap(url, self.inner.config.cross_origin.as_deref());
        self.inner.host.inject_bootstrap_script(&tag);
    }

    fn spawn_deferred_check(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.config.update_check_delay).await;
            this.deferred_update_check().await;
        });
    }
}
