//! Structural ("goose") typing checks.
//!
//! A [`HookedAbc`] names a set of hook methods. Any type declaring all of
//! them somewhere in its lineage counts as a virtual subclass, as do types
//! registered explicitly. Both sets are inherited from parent ABCs.
//!
//! ```
//! use prop_kit::hooks::HookedAbc;
//! use prop_kit::TypeInfo;
//!
//! let closeable = HookedAbc::builder("Closeable").hooks(["close"]).build();
//! let file = TypeInfo::new("File").with_methods(["read", "close"]);
//!
//! assert!(closeable.is_subclass(&file));
//! assert!(!closeable.is_subclass(&TypeInfo::new("Socket")));
//! ```

pub mod io;

use crate::value::{TypeInfo, TypeTag, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An abstract base checked by hook methods and explicit registration.
#[derive(Debug)]
pub struct HookedAbc {
    type_info: Arc<TypeInfo>,
    hooks: BTreeSet<String>,
    registered: BTreeSet<TypeTag>,
}

impl HookedAbc {
    pub fn builder(name: impl Into<String>) -> HookedAbcBuilder {
        HookedAbcBuilder {
            name: name.into(),
            parents: Vec::new(),
            hooks: BTreeSet::new(),
            registered: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.type_info.name()
    }

    /// Type to use as a real base for concrete implementations.
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    /// Hook methods, own and inherited.
    pub fn hooks(&self) -> &BTreeSet<String> {
        &self.hooks
    }

    pub fn registered(&self) -> &BTreeSet<TypeTag> {
        &self.registered
    }

    /// Whether `ty` is a real or virtual subclass.
    ///
    /// An ABC without hooks accepts only real and registered subclasses.
    pub fn is_subclass(&self, ty: &TypeInfo) -> bool {
        let lineage = ty.lineage();
        if lineage.iter().any(|t| t.name() == self.name()) {
            return true;
        }
        if lineage
            .iter()
            .any(|t| self.registered.contains(&TypeTag::object(t.name())))
        {
            return true;
        }
        !self.hooks.is_empty() && self.hooks.iter().all(|hook| ty.has_method(hook))
    }

    /// `isinstance` over values: objects are checked with
    /// [`is_subclass`](Self::is_subclass), other values by registered tag.
    pub fn is_instance(&self, value: &Value) -> bool {
        match value {
            Value::Object(obj) => self.is_subclass(obj.type_info()),
            other => self.registered.contains(&other.type_tag()),
        }
    }
}

/// Builder for [`HookedAbc`].
pub struct HookedAbcBuilder {
    name: String,
    parents: Vec<Arc<HookedAbc>>,
    hooks: BTreeSet<String>,
    registered: BTreeSet<TypeTag>,
}

impl HookedAbcBuilder {
    /// Inherit the parent's hooks and registrations.
    pub fn extends(mut self, parent: &Arc<HookedAbc>) -> Self {
        self.parents.push(parent.clone());
        self
    }

    pub fn hooks<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hooks.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Register a virtual subclass regardless of its methods.
    pub fn register(mut self, tag: TypeTag) -> Self {
        self.registered.insert(tag);
        self
    }

    pub fn build(self) -> Arc<HookedAbc> {
        let mut hooks = self.hooks;
        let mut registered = self.registered;
        let mut type_info = TypeInfo::new(self.name.as_str());
        for parent in &self.parents {
            hooks.extend(parent.hooks.iter().cloned());
            registered.extend(parent.registered.iter().cloned());
            type_info = type_info.with_base(parent.type_info.clone());
        }
        let type_info = type_info.with_methods(hooks.iter().cloned());

        debug!(
            "Built ABC {} with hooks {:?}, {} registered",
            self.name,
            hooks,
            registered.len()
        );
        Arc::new(HookedAbc {
            type_info: Arc::new(type_info),
            hooks,
            registered,
        })
    }
}
