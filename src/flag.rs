//! Persisted version-mismatch flag and its storage abstraction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fixed storage key under which the mismatch flag is persisted.
pub const MISMATCH_FLAG_KEY: &str = "app-version-mismatch";

/// Persisted marker indicating the client detected a deployed version newer
/// than what it has loaded.
///
/// At most one value is stored at a time; its presence gates bootstrap
/// behavior on the *next* load, not the current one. Absence means "no
/// mismatch known".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchFlag {
    /// A newer minor version was observed. Soft signal only; does not by
    /// itself force a reload.
    Minor,
    /// A newer major version was observed. Forces a future hard reload.
    Major,
}

impl MismatchFlag {
    /// Returns the exact literal persisted for this flag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }

    /// Parses a persisted literal back into a flag.
    ///
    /// Anything other than the exact `"minor"` / `"major"` literals yields
    /// `None` and is treated as an absent flag.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            _ => None,
        }
    }
}

impl fmt::Display for MismatchFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstraction over the persistent flag storage for testability.
///
/// Models browser-local storage semantics: reads and removals never fail
/// observably, writes can. Single writer assumed; concurrent writers from
/// multiple browsing contexts are an accepted race.
pub trait FlagStore: Send + Sync {
    /// Returns the currently persisted flag, or `None` if absent or
    /// unreadable.
    fn get(&self) -> Option<MismatchFlag>;

    /// Persists the given flag, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be written durably.
    fn set(&self, flag: MismatchFlag) -> std::io::Result<()>;

    /// Removes the persisted flag if present.
    fn clear(&self);
}

/// File-backed flag store writing the flag literal under a fixed key.
#[derive(Debug, Clone)]
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    /// Creates a store persisting the flag inside `dir` under
    /// [`MISMATCH_FLAG_KEY`].
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(MISMATCH_FLAG_KEY),
        }
    }

    /// Returns the default storage directory.
    ///
    /// Uses `STATE_DIRECTORY` (set by systemd when `StateDirectory=` is
    /// configured), falling back to `$XDG_DATA_HOME/staleguard` for
    /// interactive use.
    #[must_use]
    pub fn default_dir() -> PathBuf {
        std::env::var("STATE_DIRECTORY").map_or_else(
            |_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("staleguard")
            },
            PathBuf::from,
        )
    }

    /// Returns the path of the underlying flag file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FlagStore for FileFlagStore {
    fn get(&self) -> Option<MismatchFlag> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let flag = MismatchFlag::parse(contents.trim());
        if flag.is_none() {
            log::warn!(
                "ignoring unrecognized mismatch flag value {:?} in {}",
                contents.trim(),
                self.path.display()
            );
        }
        flag
    }

    fn set(&self, flag: MismatchFlag) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        // Atomic write (tmp + rename) so a crash never leaves a torn flag.
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, flag.as_str())?;
        std::fs::rename(&tmp_path, &self.path)
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!("failed to remove mismatch flag {}: {e}", self.path.display());
        }
    }
}

/// In-memory flag store. Useful for tests and for embedders that manage
/// persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flag: Mutex<Option<MismatchFlag>>,
}

impl MemoryFlagStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self) -> Option<MismatchFlag> {
        *self.flag.lock().expect("flag lock poisoned")
    }

    fn set(&self, flag: MismatchFlag) -> std::io::Result<()> {
        *self.flag.lock().expect("flag lock poisoned") = Some(flag);
        Ok(())
    }

    fn clear(&self) {
        *self.flag.lock().expect("flag lock poisoned") = None;
    }
}
