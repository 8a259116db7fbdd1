//! Class metadata and the deferred registration driver.
//!
//! Classes form a single-inheritance tree rooted at `Object`. Registration is
//! order-independent: modules hand the builder *registrant* functions, the
//! builder drains them (registrants may enqueue further registrants while
//! running), and parent links are resolved by name only after the drain
//! completes. A class whose parent never registers is a configuration error
//! and aborts the process.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use stowage_foundation::{Error, Name, NameTable, Result};

use crate::object::Object;

/// Name of the implicit root class.
pub const ROOT_CLASS: &str = "Object";

/// Handle to a registered class.
///
/// Classes are registered once at startup and never destroyed, so the handle
/// is a plain index with no generation.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// Returns the raw index of this class.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Default-construction function for a class.
pub type ConstructFn = fn() -> Box<dyn Object>;

/// A registrant declares classes against the builder.
///
/// Registrants may call [`ClassRegistryBuilder::enqueue`] to pull in classes
/// they depend on; the driver keeps draining until the queue is empty.
pub type Registrant = fn(&mut ClassRegistryBuilder);

/// Static description of a class, as declared by a registrant.
#[derive(Clone)]
pub struct ClassSpec {
    /// Class name, unique across the registry.
    pub name: &'static str,
    /// Parent class name. `None` means the class derives from the root.
    pub parent: Option<&'static str>,
    /// Package-qualified namespace the class is declared in.
    pub package: &'static str,
    /// Default constructor; `None` marks the class abstract.
    pub construct: Option<ConstructFn>,
}

/// Resolved metadata for a registered class.
pub struct ClassDescriptor {
    /// Class name.
    pub name: Name,
    /// Package-qualified name, e.g. `script://stowage.Mesh`.
    pub qualified_name: Name,
    /// Parent class; `None` only for the root.
    pub parent: Option<ClassId>,
    construct: Option<ConstructFn>,
}

impl ClassDescriptor {
    /// True if the class cannot be instantiated.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.construct.is_none()
    }
}

/// Collects registrants and class specs during the startup phase.
///
/// Draining is driven by [`ClassRegistryBuilder::build`]: it repeatedly pops
/// registrants until none remain, then resolves parent links. Declaring the
/// same class twice is idempotent (the first declaration wins), which lets
/// independent modules both enqueue a shared dependency.
pub struct ClassRegistryBuilder {
    names: Arc<NameTable>,
    pending: VecDeque<Registrant>,
    specs: Vec<ClassSpec>,
    declared: HashSet<&'static str>,
}

impl ClassRegistryBuilder {
    /// Creates a builder with the implicit root class pre-declared.
    #[must_use]
    pub fn new(names: Arc<NameTable>) -> Self {
        let mut builder = Self {
            names,
            pending: VecDeque::new(),
            specs: Vec::new(),
            declared: HashSet::new(),
        };
        builder.declare(ClassSpec {
            name: ROOT_CLASS,
            parent: None,
            package: "script://stowage",
            construct: None,
        });
        builder
    }

    /// Queues a registrant for the next drain.
    pub fn enqueue(&mut self, registrant: Registrant) {
        self.pending.push_back(registrant);
    }

    /// Declares a class. Idempotent per class name.
    pub fn declare(&mut self, spec: ClassSpec) {
        if self.declared.insert(spec.name) {
            self.specs.push(spec);
        }
    }

    /// Drains all queued registrants and resolves the class tree.
    ///
    /// # Panics
    ///
    /// Panics if a declared parent class never registers — a fatal
    /// configuration error per the system's error taxonomy.
    #[must_use]
    pub fn build(mut self) -> ClassRegistry {
        // Registrants may enqueue more registrants; keep draining until the
        // queue is genuinely empty.
        while let Some(registrant) = self.pending.pop_front() {
            registrant(&mut self);
        }

        let mut by_name: HashMap<Name, ClassId> = HashMap::new();
        let mut interned: Vec<(Name, Name)> = Vec::with_capacity(self.specs.len());
        for (index, spec) in self.specs.iter().enumerate() {
            let name = self.names.intern(spec.name);
            let qualified = self
                .names
                .intern(&format!("{}.{}", spec.package, spec.name));
            let id = ClassId(u32::try_from(index).expect("class registry overflow"));
            by_name.insert(name, id);
            interned.push((name, qualified));
        }

        let root_name = self.names.intern(ROOT_CLASS);
        let root = by_name[&root_name];
        let classes = self
            .specs
            .iter()
            .zip(interned)
            .enumerate()
            .map(|(index, (spec, (name, qualified_name)))| {
                let parent = match spec.parent {
                    Some(parent_name) => {
                        let parent_id = self
                            .names
                            .find(parent_name)
                            .and_then(|n| by_name.get(&n).copied())
                            .unwrap_or_else(|| {
                                panic!(
                                    "class {} declares unregistered parent {}",
                                    spec.name, parent_name
                                )
                            });
                        Some(parent_id)
                    }
                    // Everything except the root implicitly derives from it.
                    None if index != root.index() as usize => Some(root),
                    None => None,
                };
                ClassDescriptor {
                    name,
                    qualified_name,
                    parent,
                    construct: spec.construct,
                }
            })
            .collect();

        ClassRegistry {
            classes,
            by_name,
            root,
            names: self.names,
        }
    }
}

/// Immutable registry of all classes, built once at startup.
pub struct ClassRegistry {
    classes: Vec<ClassDescriptor>,
    by_name: HashMap<Name, ClassId>,
    root: ClassId,
    names: Arc<NameTable>,
}

impl ClassRegistry {
    /// Returns the root class.
    #[must_use]
    pub fn root(&self) -> ClassId {
        self.root
    }

    /// Looks up a class by plain name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.names.find(name).and_then(|n| self.find_name(n))
    }

    /// Looks up a class by interned name.
    #[must_use]
    pub fn find_name(&self, name: Name) -> Option<ClassId> {
        self.by_name.get(&name).copied()
    }

    /// Returns the descriptor for a class.
    ///
    /// # Panics
    ///
    /// Panics if the handle did not come from this registry.
    #[must_use]
    pub fn descriptor(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.0 as usize]
    }

    /// True if `class` is `ancestor` or transitively derives from it.
    #[must_use]
    pub fn is_a(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.descriptor(id).parent;
        }
        false
    }

    /// Constructs a default instance of the class.
    ///
    /// # Errors
    ///
    /// Returns `AbstractClass` if the class has no constructor.
    pub fn instantiate(&self, id: ClassId) -> Result<Box<dyn Object>> {
        let descriptor = self.descriptor(id);
        match descriptor.construct {
            Some(construct) => Ok(construct()),
            None => Err(Error::abstract_class(&*self.names.resolve(descriptor.name))),
        }
    }

    /// Returns the number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if only the root class exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.len() <= 1
    }

    /// The name table shared with the rest of the system.
    #[must_use]
    pub fn names(&self) -> &Arc<NameTable> {
        &self.names
    }
}
