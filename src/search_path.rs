//! Layered search path: locations, qualified names and the immutable chain of
//! layers that resolves one to a unit.

use crate::error::ResolutionError;
use crate::unit::{Unit, UnitSource};
use anyhow::{Context, Result};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;
use tracing::{debug, trace};

static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$-]*(\.[A-Za-z_$][A-Za-z0-9_$-]*)*$")
        .expect("qualified name pattern is valid")
});

/// A resolvable location: an absolute filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location(PathBuf);

impl Location {
    /// Convert a path into a location, making it absolute against the current
    /// working directory. The path does not have to exist.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        std::path::absolute(path).map(Self)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Dot-separated unit name, e.g. `com.example.App`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn parse(name: &str) -> Result<Self, ResolutionError> {
        if QUALIFIED_NAME.is_match(name) {
            Ok(Self(name.to_owned()))
        } else {
            Err(ResolutionError::InvalidName(name.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Path of the unit relative to a location: one component per segment.
    pub fn relative_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One immutable layer of the search path.
///
/// Resolution is parent-first: a layer answers from the units it already
/// defined, then asks its delegate, and only then probes its own locations.
/// Units defined earlier are therefore never shadowed by later layers.
pub struct Layer {
    locations: Vec<Location>,
    delegate: Option<Rc<Layer>>,
    defined: RefCell<HashMap<QualifiedName, Rc<dyn Unit>>>,
}

impl Layer {
    fn new(locations: Vec<Location>, delegate: Option<Rc<Layer>>) -> Self {
        Self {
            locations,
            delegate,
            defined: RefCell::new(HashMap::new()),
        }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn delegate(&self) -> Option<&Rc<Layer>> {
        self.delegate.as_ref()
    }

    /// Whether this layer itself (not its delegates) defined `name`.
    pub fn defines(&self, name: &QualifiedName) -> bool {
        self.defined.borrow().contains_key(name)
    }

    fn resolve(
        &self,
        sources: &[Box<dyn UnitSource>],
        name: &QualifiedName,
    ) -> Result<Option<Rc<dyn Unit>>> {
        if let Some(unit) = self.defined.borrow().get(name) {
            return Ok(Some(Rc::clone(unit)));
        }

        if let Some(delegate) = &self.delegate {
            if let Some(unit) = delegate.resolve(sources, name)? {
                return Ok(Some(unit));
            }
        }

        for location in &self.locations {
            for source in sources {
                trace!(%location, %name, "probing location");
                let Some(unit) = source.try_locate(location, name)? else {
                    continue;
                };
                debug!(%location, %name, "defining unit");
                unit.initialize()
                    .with_context(|| format!("failed to initialize `{name}`"))?;
                self.defined
                    .borrow_mut()
                    .insert(name.clone(), Rc::clone(&unit));
                return Ok(Some(unit));
            }
        }

        Ok(None)
    }
}

/// The stack of layers; only its top changes.
#[derive(Default, Clone)]
pub struct SearchPathStack {
    top: Option<Rc<Layer>>,
}

impl SearchPathStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a new layer holding `locations` above the current top.
    pub fn push(&mut self, locations: Vec<Location>) -> Rc<Layer> {
        let layer = Rc::new(Layer::new(locations, self.top.take()));
        self.top = Some(Rc::clone(&layer));
        layer
    }

    pub fn top(&self) -> Option<&Rc<Layer>> {
        self.top.as_ref()
    }

    /// Number of layers in the chain.
    pub fn depth(&self) -> usize {
        std::iter::successors(self.top.as_ref(), |layer| layer.delegate()).count()
    }

    /// Every location visible to resolution, oldest layer first.
    pub fn locations(&self) -> Vec<&Location> {
        let mut layers: Vec<&Rc<Layer>> =
            std::iter::successors(self.top.as_ref(), |layer| layer.delegate()).collect();
        layers.reverse();
        layers
            .into_iter()
            .flat_map(|layer| layer.locations().iter())
            .collect()
    }

    /// Resolve `name` through the chain, defining and initializing the unit on
    /// first sight.
    pub fn resolve(
        &self,
        sources: &[Box<dyn UnitSource>],
        name: &QualifiedName,
    ) -> Result<Rc<dyn Unit>> {
        let found = match &self.top {
            Some(top) => top.resolve(sources, name)?,
            None => None,
        };
        found.ok_or_else(|| ResolutionError::NotFound(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Routine};
    use std::cell::Cell;

    fn loc(path: &str) -> Location {
        Location::from_path(path).unwrap()
    }

    fn name(name: &str) -> QualifiedName {
        QualifiedName::parse(name).unwrap()
    }

    fn tagged(tag: i32) -> Routine {
        Routine::new(move |_| Ok(tag))
    }

    #[test]
    fn test_qualified_name_validation() {
        assert!(QualifiedName::parse("App").is_ok());
        assert!(QualifiedName::parse("com.example.App").is_ok());
        assert!(QualifiedName::parse("pkg.Outer$Inner").is_ok());
        assert!(QualifiedName::parse("tool-x.main_1").is_ok());

        for bad in ["", ".App", "App.", "a..b", "../etc/passwd", "a/b", "1abc", "a b"] {
            assert_eq!(
                QualifiedName::parse(bad),
                Err(ResolutionError::InvalidName(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_relative_path_has_one_component_per_segment() {
        assert_eq!(
            name("com.example.App").relative_path(),
            Path::new("com").join("example").join("App")
        );
    }

    #[test]
    fn test_location_is_absolute() {
        assert!(loc("relative/dir").as_path().is_absolute());
        assert!(loc("relative/dir").as_path().ends_with("relative/dir"));
    }

    #[test]
    fn test_push_wraps_previous_top() {
        let mut stack = SearchPathStack::new();
        assert_eq!(stack.depth(), 0);

        let first = stack.push(vec![loc("/a")]);
        let second = stack.push(vec![loc("/b"), loc("/c")]);

        assert_eq!(stack.depth(), 2);
        assert!(Rc::ptr_eq(second.delegate().unwrap(), &first));
        assert!(first.delegate().is_none());
        assert_eq!(
            stack.locations(),
            vec![&loc("/a"), &loc("/b"), &loc("/c")]
        );
    }

    #[test]
    fn test_empty_stack_resolves_nothing() {
        let stack = SearchPathStack::new();
        let sources: Vec<Box<dyn UnitSource>> = vec![Box::new(Registry::new())];
        let err = stack.resolve(&sources, &name("App")).err().unwrap();
        assert_eq!(
            err.downcast_ref::<ResolutionError>(),
            Some(&ResolutionError::NotFound("App".into()))
        );
    }

    #[test]
    fn test_parent_layer_wins_over_newer_layer() {
        let mut registry = Registry::new();
        registry.register(loc("/old"), name("App"), tagged(1));
        registry.register(loc("/new"), name("App"), tagged(2));
        let sources: Vec<Box<dyn UnitSource>> = vec![Box::new(registry)];

        let mut stack = SearchPathStack::new();
        let old = stack.push(vec![loc("/old")]);
        let new = stack.push(vec![loc("/new")]);

        let unit = stack.resolve(&sources, &name("App")).unwrap();
        assert_eq!(unit.entry_point().unwrap().invoke(&[]).unwrap(), 1);
        assert!(old.defines(&name("App")));
        assert!(!new.defines(&name("App")));
    }

    #[test]
    fn test_locations_within_a_layer_are_probed_in_order() {
        let mut registry = Registry::new();
        registry.register(loc("/first"), name("App"), tagged(1));
        registry.register(loc("/second"), name("App"), tagged(2));
        let sources: Vec<Box<dyn UnitSource>> = vec![Box::new(registry)];

        let mut stack = SearchPathStack::new();
        stack.push(vec![loc("/second"), loc("/first")]);

        let unit = stack.resolve(&sources, &name("App")).unwrap();
        assert_eq!(unit.entry_point().unwrap().invoke(&[]).unwrap(), 2);
    }

    #[test]
    fn test_defined_unit_is_initialized_once() {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let mut registry = Registry::new();
        registry.register(
            loc("/libs"),
            name("Init"),
            Routine::library().on_initialize(move || {
                counter.set(counter.get() + 1);
                Ok(())
            }),
        );
        let sources: Vec<Box<dyn UnitSource>> = vec![Box::new(registry)];

        let mut stack = SearchPathStack::new();
        stack.push(vec![loc("/libs")]);
        stack.resolve(&sources, &name("Init")).unwrap();
        stack.push(vec![loc("/more")]);
        stack.resolve(&sources, &name("Init")).unwrap();

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_initialize_failure_propagates() {
        let mut registry = Registry::new();
        registry.register(
            loc("/libs"),
            name("Broken"),
            Routine::library().on_initialize(|| anyhow::bail!("boom")),
        );
        let sources: Vec<Box<dyn UnitSource>> = vec![Box::new(registry)];

        let mut stack = SearchPathStack::new();
        let layer = stack.push(vec![loc("/libs")]);
        let err = stack.resolve(&sources, &name("Broken")).err().unwrap();

        assert!(format!("{err:#}").contains("boom"));
        assert!(!layer.defines(&name("Broken")));
    }
}
