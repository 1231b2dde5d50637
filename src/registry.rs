//! In-memory units, registered by location and qualified name.
//!
//! Useful when embedding the launcher in a process that already knows its
//! programs, and for tests.

use crate::command::ExitCode;
use crate::search_path::{Location, QualifiedName};
use crate::unit::{EntryPoint, Unit, UnitSource};
use anyhow::Result;
use std::collections::HashMap;
use std::rc::Rc;

type InitFn = Box<dyn Fn() -> Result<()>>;
type MainFn = Box<dyn Fn(&[String]) -> Result<ExitCode>>;

/// A unit backed by closures.
pub struct Routine {
    init: Option<InitFn>,
    main: Option<MainFn>,
}

impl Routine {
    /// A routine whose entry point runs `main`.
    pub fn new(main: impl Fn(&[String]) -> Result<ExitCode> + 'static) -> Self {
        Self {
            init: None,
            main: Some(Box::new(main)),
        }
    }

    /// A routine without an entry point; only useful for its initializer.
    pub fn library() -> Self {
        Self {
            init: None,
            main: None,
        }
    }

    pub fn on_initialize(mut self, init: impl Fn() -> Result<()> + 'static) -> Self {
        self.init = Some(Box::new(init));
        self
    }
}

impl Unit for Routine {
    fn initialize(&self) -> Result<()> {
        match &self.init {
            Some(init) => init(),
            None => Ok(()),
        }
    }

    fn entry_point(&self) -> Option<&dyn EntryPoint> {
        self.main.as_ref().map(|_| self as &dyn EntryPoint)
    }
}

impl EntryPoint for Routine {
    fn invoke(&self, args: &[String]) -> Result<ExitCode> {
        match &self.main {
            Some(main) => main(args),
            None => anyhow::bail!("routine has no entry point"),
        }
    }
}

/// Unit source answering from a fixed table.
#[derive(Default)]
pub struct Registry {
    units: HashMap<Location, HashMap<QualifiedName, Rc<dyn Unit>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `unit` available as `name` under `location`, replacing any
    /// previous registration.
    pub fn register(&mut self, location: Location, name: QualifiedName, unit: impl Unit + 'static) {
        self.units
            .entry(location)
            .or_default()
            .insert(name, Rc::new(unit));
    }
}

impl UnitSource for Registry {
    fn try_locate(
        &self,
        location: &Location,
        name: &QualifiedName,
    ) -> Result<Option<Rc<dyn Unit>>> {
        Ok(self
            .units
            .get(location)
            .and_then(|units| units.get(name))
            .cloned())
    }
}
