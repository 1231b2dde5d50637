//! A bootstrap interpreter for launcher control scripts.
//!
//! A control script is a tab-separated, line-oriented file that stacks search
//! path layers (`path`), preloads units through them (`load`), collects the
//! entry point (`main`) and its arguments (`arg`), or stops early (`exit`).
//! When the script is exhausted the runner deletes it, resolves the entry
//! point through the composed layers and invokes it with the collected
//! arguments.
//!
//! The main entry point is [`ScriptRunner`]. Units are found through pluggable
//! [`UnitSource`]s: [`ProgramSource`] maps qualified names to executables on
//! disk, [`Registry`] holds in-process [`Routine`]s.

pub mod command;
pub mod error;
mod interpreter;
pub mod logging;
mod program;
mod registry;
pub mod search_path;
pub mod unit;

pub use command::{Command, ExitCode, MISSING_ENTRY_POINT};
pub use error::{ResolutionError, ScriptError};
pub use interpreter::{InterpreterState, InvocationSpec, Outcome, ScriptRunner};
pub use program::{Program, ProgramSource};
pub use registry::{Registry, Routine};
pub use search_path::{Layer, Location, QualifiedName, SearchPathStack};
pub use unit::{EntryPoint, Unit, UnitSource};
