use crate::command::{Command, ExitCode, MISSING_ENTRY_POINT};
use crate::error::ResolutionError;
use crate::program::ProgramSource;
use crate::search_path::{Location, QualifiedName, SearchPathStack};
use crate::unit::UnitSource;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Deferred invocation: the designated entry point and its arguments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    /// Qualified name set by the last `main` command.
    pub entry_point: Option<String>,
    /// Raw `arg` payloads in script order.
    pub args: Vec<String>,
}

/// Everything a control script mutates.
#[derive(Default)]
pub struct InterpreterState {
    /// Locations from `path` commands not yet folded into a layer.
    pub pending: Vec<Location>,
    pub stack: SearchPathStack,
    pub invocation: InvocationSpec,
}

impl InterpreterState {
    /// Fold pending locations into a new layer above the current top.
    ///
    /// No-op when nothing is pending. Returns whether a layer was created.
    pub fn update(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let locations = std::mem::take(&mut self.pending);
        info!(
            depth = self.stack.depth() + 1,
            locations = ?locations.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "composing search layer"
        );
        self.stack.push(locations);
        true
    }
}

/// How a script run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stopped by an `exit` command or by a script without `main`.
    Exited(ExitCode),
    /// The entry point ran and returned this code.
    Invoked(ExitCode),
}

impl Outcome {
    /// The exit code the launcher process should end with.
    pub fn code(self) -> ExitCode {
        match self {
            Outcome::Exited(code) | Outcome::Invoked(code) => code,
        }
    }
}

/// Interpreter for launcher control scripts.
///
/// The runner reads the script line by line, builds the search path and the
/// invocation, and finally hands off to the designated entry point. Units are
/// looked up through a list of [`UnitSource`]s, asked in order for each
/// location.
///
/// Example
/// ```
/// use script_launcher::{Location, Outcome, QualifiedName, Registry, Routine, ScriptRunner};
///
/// let dir = tempfile::tempdir().unwrap();
/// let script = dir.path().join("control");
/// std::fs::write(&script, "path\t/libs\nmain\tApp\narg\t--flag\n").unwrap();
///
/// let mut registry = Registry::new();
/// registry.register(
///     Location::from_path("/libs").unwrap(),
///     QualifiedName::parse("App").unwrap(),
///     Routine::new(|args| Ok(if args == ["--flag"] { 0 } else { 2 })),
/// );
///
/// let mut runner = ScriptRunner::new(vec![Box::new(registry)]);
/// assert_eq!(runner.run(&script).unwrap(), Outcome::Invoked(0));
/// assert!(!script.exists());
/// ```
pub struct ScriptRunner {
    sources: Vec<Box<dyn UnitSource>>,
    state: InterpreterState,
}

impl ScriptRunner {
    /// Create a runner with a custom set of unit sources.
    pub fn new(sources: Vec<Box<dyn UnitSource>>) -> Self {
        Self {
            sources,
            state: InterpreterState::default(),
        }
    }

    /// Interpreter state as built so far.
    pub fn state(&self) -> &InterpreterState {
        &self.state
    }

    /// Run the control script at `script` to completion.
    ///
    /// On `exit` the script file is left in place. Otherwise it is deleted
    /// before the entry point is resolved, unless no entry point was set.
    /// A script that cannot be deleted is logged and the run goes on.
    pub fn run(&mut self, script: &Path) -> Result<Outcome> {
        let file = File::open(script)
            .with_context(|| format!("failed to open control script {}", script.display()))?;

        if let ControlFlow::Break(code) = self.read_script(BufReader::new(file))? {
            info!(code, "exit requested by control script");
            return Ok(Outcome::Exited(code));
        }

        self.finalize(script)
    }

    /// Dispatch every line of `reader`, stopping early at `exit`.
    pub fn read_script(&mut self, reader: impl BufRead) -> Result<ControlFlow<ExitCode>> {
        for (index, line) in reader.lines().enumerate() {
            let line = line.context("failed to read control script")?;
            if let ControlFlow::Break(code) = self.dispatch(&line, index + 1)? {
                return Ok(ControlFlow::Break(code));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Apply a single script line to the interpreter state.
    pub fn dispatch(&mut self, line: &str, line_no: usize) -> Result<ControlFlow<ExitCode>> {
        let command = Command::parse(line, line_no)?;
        debug!(line = line_no, ?command, "dispatching");

        match command {
            Command::Path(path) => {
                let location = Location::from_path(path)
                    .with_context(|| format!("line {line_no}: invalid path `{path}`"))?;
                self.state.pending.push(location);
            }
            Command::Load(name) => {
                self.state.update();
                self.preload(name)
                    .with_context(|| format!("line {line_no}: failed to load `{name}`"))?;
            }
            Command::Exit(code) => return Ok(ControlFlow::Break(code)),
            Command::Main(name) => {
                self.state.invocation.entry_point = Some(name.to_owned());
            }
            Command::Arg(arg) => self.state.invocation.args.push(arg.to_owned()),
            Command::Unknown => trace!(line = line_no, "ignoring line"),
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Make `name` available through the current stack, running its
    /// initializer if this is the first time it is defined. The unit itself
    /// is not kept.
    pub fn preload(&self, name: &str) -> Result<()> {
        let name = QualifiedName::parse(name)?;
        self.state.stack.resolve(&self.sources, &name)?;
        Ok(())
    }

    fn finalize(&mut self, script: &Path) -> Result<Outcome> {
        let Some(entry) = self.state.invocation.entry_point.clone() else {
            warn!("control script did not designate an entry point");
            return Ok(Outcome::Exited(MISSING_ENTRY_POINT));
        };

        self.state.update();
        if let Err(err) = fs::remove_file(script) {
            warn!(script = %script.display(), %err, "could not delete control script");
        }

        let name = QualifiedName::parse(&entry)?;
        let unit = self.state.stack.resolve(&self.sources, &name)?;
        let entry_point = unit
            .entry_point()
            .ok_or_else(|| ResolutionError::NoEntryPoint(entry.clone()))?;

        info!(entry = %name, args = self.state.invocation.args.len(), "invoking entry point");
        let code = entry_point.invoke(&self.state.invocation.args)?;
        Ok(Outcome::Invoked(code))
    }
}

impl Default for ScriptRunner {
    /// Create a runner that resolves names to programs on the filesystem.
    fn default() -> Self {
        Self::new(vec![Box::new(ProgramSource)])
    }
}
