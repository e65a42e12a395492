//! Builder for classes of chained properties.
//!
//! Building a class is the explicit construction step: it validates every
//! declared property and method, composes the property table from the
//! ancestors' tables, and freezes the result.

use crate::error::{Error, Result};
use crate::expander::ChainedProps;
use crate::forward::OptMethod;
use crate::graph::PropertyTable;
use crate::key::GlobalPropertyId;
use crate::param::{check_params, Args, Param};
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Property computation. Receives the instance, so it can read other
/// properties, and the arguments resolved from the option store.
pub type Getter = dyn Fn(&ChainedProps, &Args) -> Result<Value> + Send + Sync;

/// One declared property.
pub struct PropertyDef {
    id: GlobalPropertyId,
    params: Vec<Param>,
    getter: Arc<Getter>,
}

impl PropertyDef {
    pub fn new<F>(id: GlobalPropertyId, params: Vec<Param>, getter: F) -> Self
    where
        F: Fn(&ChainedProps, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        PropertyDef {
            id,
            params,
            getter: Arc::new(getter),
        }
    }

    pub fn id(&self) -> &GlobalPropertyId {
        &self.id
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub(crate) fn compute(&self, this: &ChainedProps, args: &Args) -> Result<Value> {
        (self.getter)(this, args)
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("id", &self.id)
            .field("params", &self.params)
            .finish()
    }
}

/// A built, immutable class of chained properties.
#[derive(Debug)]
pub struct PropsClass {
    name: String,
    bases: Vec<Arc<PropsClass>>,
    table: PropertyTable,
    methods: IndexMap<String, Arc<OptMethod>>,
}

impl PropsClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[Arc<PropsClass>] {
        &self.bases
    }

    pub fn table(&self) -> &PropertyTable {
        &self.table
    }

    /// Most-derived property definition visible under `name`.
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDef>> {
        self.table.resolve(name).and_then(|index| self.table.get(index))
    }

    /// Most-derived forwarded method visible under `name`.
    pub fn method(&self, name: &str) -> Option<&Arc<OptMethod>> {
        self.methods.get(name)
    }

    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.name == name || self.bases.iter().any(|base| base.is_subclass_of(name))
    }
}

/// Fluent builder for [`PropsClass`].
///
/// # Example
///
/// ```
/// use prop_kit::{Param, PropsClassBuilder, Value};
///
/// let class = PropsClassBuilder::new("Greeting")
///     .property(
///         "text",
///         vec![Param::required("hej"), Param::optional("med", "dig")],
///         |_, args| Ok(Value::from(format!("{}{}", args.str("hej")?, args.str("med")?))),
///     )
///     .build()
///     .expect("valid class");
///
/// assert!(class.property("text").is_some());
/// ```
pub struct PropsClassBuilder {
    name: String,
    bases: Vec<Arc<PropsClass>>,
    properties: IndexMap<String, PropertyDef>,
    methods: IndexMap<String, OptMethod>,
}

impl PropsClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        PropsClassBuilder {
            name: name.into(),
            bases: Vec::new(),
            properties: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Add a base class. Bases are consulted in the order they are added.
    ///
    /// Lookup is depth-first: with `Diamond` extending `Left` then `Right`,
    /// a property `Left` inherits from a shared root is found before an
    /// override declared on `Right`. Override in `Left` or `Diamond` to
    /// change that.
    pub fn extends(mut self, base: &Arc<PropsClass>) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Declare a cached property. A later declaration of the same name
    /// replaces the earlier one.
    pub fn property<F>(mut self, name: impl Into<String>, params: Vec<Param>, getter: F) -> Self
    where
        F: Fn(&ChainedProps, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let id = GlobalPropertyId::new(self.name.as_str(), name.as_str());
        self.properties
            .insert(name, PropertyDef::new(id, params, getter));
        self
    }

    /// Declare a method whose arguments are partly sourced from options.
    pub fn method(mut self, method: OptMethod) -> Self {
        self.methods.insert(method.name().to_string(), method);
        self
    }

    /// Validate and freeze the class.
    ///
    /// # Errors
    ///
    /// Returns `Error::IllegalConstruction` when:
    /// - a property or method declares a variadic keyword parameter
    /// - a parameter name is declared twice
    /// - a forwarded method is static or class bound, or its selector does
    ///   not fit its parameters
    /// - a property and a method share a name
    pub fn build(self) -> Result<Arc<PropsClass>> {
        for def in self.properties.values() {
            check_params(&def.id.to_string(), &def.params)?;
        }
        for method in self.methods.values() {
            method.validate(&self.name)?;
            if self.properties.contains_key(method.name()) {
                return Err(Error::IllegalConstruction(format!(
                    "{}.{} is declared as both property and method",
                    self.name,
                    method.name()
                )));
            }
        }

        let own_props = self.properties.len();
        let own: Vec<Arc<PropertyDef>> = self.properties.into_values().map(Arc::new).collect();
        let base_tables: Vec<&PropertyTable> = self.bases.iter().map(|b| &b.table).collect();
        let table = PropertyTable::compose(own, &base_tables);

        let mut methods: IndexMap<String, Arc<OptMethod>> = self
            .methods
            .into_iter()
            .map(|(name, method)| (name, Arc::new(method)))
            .collect();
        for base in &self.bases {
            for (name, method) in &base.methods {
                methods
                    .entry(name.clone())
                    .or_insert_with(|| method.clone());
            }
        }

        info!(
            "✓ Built {}: {} own / {} visible properties, {} methods",
            self.name,
            own_props,
            table.len(),
            methods.len()
        );

        Ok(Arc::new(PropsClass {
            name: self.name,
            bases: self.bases,
            table,
            methods,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::ArgSelector;

    fn constant(v: &'static str) -> impl Fn(&ChainedProps, &Args) -> Result<Value> + Send + Sync {
        move |_, _| Ok(Value::from(v))
    }

    #[test]
    fn test_build_basic() {
        let class = PropsClassBuilder::new("Chained")
            .property("test", vec![Param::required("hej")], constant("x"))
            .build()
            .expect("Failed to build");

        assert_eq!(class.name(), "Chained");
        let def = class.property("test").expect("property missing");
        assert_eq!(def.id().to_string(), "Chained.test");
        assert_eq!(def.params().len(), 1);
    }

    #[test]
    fn test_rejects_var_keyword() {
        let result = PropsClassBuilder::new("Bad")
            .property("p", vec![Param::var_keyword("kwargs")], constant("x"))
            .build();
        assert!(matches!(result, Err(Error::IllegalConstruction(_))));
    }

    #[test]
    fn test_last_declaration_wins() {
        let class = PropsClassBuilder::new("C")
            .property("p", vec![], constant("first"))
            .property("p", vec![Param::optional("a", 1)], constant("second"))
            .build()
            .expect("Failed to build");
        assert_eq!(class.table().len(), 1);
        assert_eq!(class.property("p").unwrap().params().len(), 1);
    }

    #[test]
    fn test_inheritance() {
        let base = PropsClassBuilder::new("Base")
            .property("a", vec![], constant("a"))
            .property("b", vec![], constant("b"))
            .build()
            .expect("Failed to build base");
        let sub = PropsClassBuilder::new("Sub")
            .extends(&base)
            .property("b", vec![], constant("b2"))
            .build()
            .expect("Failed to build sub");

        assert!(sub.is_subclass_of("Base"));
        assert!(!base.is_subclass_of("Sub"));
        assert_eq!(sub.property("a").unwrap().id().class(), "Base");
        assert_eq!(sub.property("b").unwrap().id().class(), "Sub");
        assert_eq!(sub.table().len(), 3);
    }

    #[test]
    fn test_diamond_resolves_depth_first() {
        let root = PropsClassBuilder::new("Root")
            .property("r", vec![], constant("root"))
            .build()
            .expect("Failed to build root");
        let left = PropsClassBuilder::new("Left")
            .extends(&root)
            .build()
            .expect("Failed to build left");
        let right = PropsClassBuilder::new("Right")
            .extends(&root)
            .property("r", vec![], constant("right"))
            .build()
            .expect("Failed to build right");
        let diamond = PropsClassBuilder::new("Diamond")
            .extends(&left)
            .extends(&right)
            .build()
            .expect("Failed to build diamond");

        assert_eq!(diamond.property("r").unwrap().id().class(), "Root");
        assert_eq!(diamond.table().len(), 2);
    }

    #[test]
    fn test_property_method_clash() {
        let result = PropsClassBuilder::new("C")
            .property("p", vec![], constant("x"))
            .method(OptMethod::new("p", ArgSelector::AllFromOptions, vec![], |_, _| {
                Ok(Value::None)
            }))
            .build();
        assert!(matches!(result, Err(Error::IllegalConstruction(_))));
    }

    #[test]
    fn test_methods_inherited() {
        let base = PropsClassBuilder::new("Base")
            .method(OptMethod::new("m", ArgSelector::Leading(0), vec![], |_, _| {
                Ok(Value::Int(1))
            }))
            .build()
            .expect("Failed to build");
        let sub = PropsClassBuilder::new("Sub")
            .extends(&base)
            .build()
            .expect("Failed to build");
        assert!(sub.method("m").is_some());
        assert!(sub.method("n").is_none());
    }
}
