use crate::command::ExitCode;
use crate::search_path::{Location, QualifiedName};
use anyhow::Result;
use std::rc::Rc;

/// The conventional callable of a unit: takes the collected arguments and
/// runs the program.
///
/// The returned code becomes the exit status of the launcher.
pub trait EntryPoint {
    /// Run the entry point with the collected arguments.
    fn invoke(&self, args: &[String]) -> Result<ExitCode>;
}

/// Something a search layer can define under a qualified name.
pub trait Unit {
    /// Load-time side effects. Runs once, when a layer first defines the unit.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// The unit's entry point, or `None` when it has none.
    fn entry_point(&self) -> Option<&dyn EntryPoint>;
}

/// Factory that tries to find a unit for a name inside one location.
///
/// Returns `Ok(None)` when the location does not contain `name`.
pub trait UnitSource {
    /// Attempt to find `name` inside `location`.
    fn try_locate(&self, location: &Location, name: &QualifiedName)
    -> Result<Option<Rc<dyn Unit>>>;
}
