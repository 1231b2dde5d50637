//! Filesystem host: units are executable programs stored under a location,
//! one directory per name segment.

use crate::command::ExitCode;
use crate::search_path::{Location, QualifiedName};
use crate::unit::{EntryPoint, Unit, UnitSource};
use anyhow::{Context, Result};
use std::env::consts::EXE_SUFFIX;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::rc::Rc;
use tracing::{debug, info};

/// Resolves `a.b.App` to the file `<location>/a/b/App`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgramSource;

impl UnitSource for ProgramSource {
    fn try_locate(
        &self,
        location: &Location,
        name: &QualifiedName,
    ) -> Result<Option<Rc<dyn Unit>>> {
        let candidate = location.as_path().join(name.relative_path());
        Ok(find_program(&candidate).map(|path| Rc::new(Program::new(path)) as Rc<dyn Unit>))
    }
}

/// An external program found on the search path.
#[derive(Debug)]
pub struct Program {
    path: PathBuf,
}

impl Program {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Unit for Program {
    fn initialize(&self) -> Result<()> {
        debug!(path = %self.path.display(), "program loaded");
        Ok(())
    }

    fn entry_point(&self) -> Option<&dyn EntryPoint> {
        if is_executable(&self.path) {
            Some(self)
        } else {
            None
        }
    }
}

impl EntryPoint for Program {
    fn invoke(&self, args: &[String]) -> Result<ExitCode> {
        info!(path = %self.path.display(), ?args, "starting program");
        let mut child = std::process::Command::new(&self.path)
            .args(args)
            .spawn()
            .with_context(|| format!("failed to start {}", self.path.display()))?;
        let exit_status = child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.path.display()))?;
        Ok(exit_status
            .code()
            .unwrap_or_else(|| terminated_by_signal(exit_status)))
    }
}

fn find_program(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_owned());
    }
    if EXE_SUFFIX.is_empty() {
        return None;
    }
    let mut with_suffix = OsString::from(candidate.as_os_str());
    with_suffix.push(EXE_SUFFIX);
    let with_suffix = PathBuf::from(with_suffix);
    with_suffix.is_file().then_some(with_suffix)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Shell-style code for a program that ended without an exit code:
/// 128 plus the signal number, 255 for a core dump without a signal.
#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    match exit_status.signal() {
        Some(signal) => 128 + signal,
        None if exit_status.core_dumped() => 255,
        None => -1,
    }
}

/// Without signals every exit carries a code; kept for the type.
#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}
