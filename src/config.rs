//! Ambient settings. Most of this crate's behavior is per-spawn
//! ([`crate::SpawnRequest`]); these are the few knobs that are process-wide.

/// Process-wide settings. Constructed once, typically via [`Settings::new`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Settings {
    /// If true (the default), [`crate::Reaper`] is installed the first time
    /// [`crate::spawn`] touches it. If false, a caller must call
    /// [`crate::Reaper::install`] explicitly before the first spawn;
    /// spawning before that is a contract violation. Overridable with the
    /// `EXEC_CORE_EAGER_REAPER` environment variable.
    pub lazy_reaper_install: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            lazy_reaper_install: std::env::var_os("EXEC_CORE_EAGER_REAPER").is_none(),
        }
    }
}

impl Settings {
    pub fn new() -> Settings {
        Default::default()
    }
}
