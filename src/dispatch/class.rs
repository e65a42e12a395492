//! Dispatch classes: construction-time overload merging and call-time
//! resolution.

use super::assert::type_assert;
use super::{Binding, Callable, DeclaredType, DispatchTree, Overload, Receiver};
use crate::error::{Error, Result};
use crate::value::{Object, TypeInfo, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A method resolved by trying a list of trees in order.
pub struct DispatchFunction {
    name: String,
    binding: Binding,
    trees: Vec<Arc<DispatchTree>>,
}

impl DispatchFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Trees in lookup order: the declaring class's first, then its
    /// ancestors' nearest to farthest.
    pub fn trees(&self) -> &[Arc<DispatchTree>] {
        &self.trees
    }

    /// Total number of overloads across every tree.
    pub fn count(&self) -> usize {
        self.trees.iter().map(|tree| tree.count()).sum()
    }

    /// Run the first matching overload, or the first tree's default.
    pub fn call(&self, receiver: &Receiver<'_>, args: &[Value]) -> Result<Value> {
        for (depth, tree) in self.trees.iter().enumerate() {
            if let Ok(func) = tree.resolve(args) {
                trace!("{} resolved in tree {}", self.name, depth);
                return func(receiver, args);
            }
        }

        match self.trees.first().and_then(|tree| tree.default()) {
            Some(default) => {
                debug!("✗ No overload of {} matches, using default", self.name);
                default.invoke(receiver, args)
            }
            None => Err(Error::NoMatch),
        }
    }
}

impl fmt::Debug for DispatchFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchFunction")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .field("trees", &self.trees)
            .finish()
    }
}

/// A class member.
#[derive(Clone)]
pub enum Member {
    /// Declared once; called directly.
    Plain { binding: Binding, overload: Overload },
    Dispatched(Arc<DispatchFunction>),
}

impl Member {
    pub fn binding(&self) -> Binding {
        match self {
            Member::Plain { binding, .. } => *binding,
            Member::Dispatched(function) => function.binding(),
        }
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, Member::Dispatched(_))
    }

    fn invoke(&self, receiver: &Receiver<'_>, args: &[Value]) -> Result<Value> {
        match self {
            Member::Plain { overload, .. } => overload.invoke(receiver, args),
            Member::Dispatched(function) => function.call(receiver, args),
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Plain { binding, overload } => f
                .debug_struct("Plain")
                .field("binding", binding)
                .field("overload", overload)
                .finish(),
            Member::Dispatched(function) => function.fmt(f),
        }
    }
}

/// A built dispatch class.
pub struct DispatchClass {
    name: String,
    bases: Vec<Arc<DispatchClass>>,
    type_info: Arc<TypeInfo>,
    members: IndexMap<String, Member>,
}

impl DispatchClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[Arc<DispatchClass>] {
        &self.bases
    }

    /// Runtime type of this class's instances, including plain ancestors.
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    /// Members declared on this class, after merging.
    pub fn own_members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    /// Own member named `name`, else the first found in the bases,
    /// depth-first and left to right.
    pub fn lookup(&self, name: &str) -> Option<&Member> {
        self.members
            .get(name)
            .or_else(|| self.bases.iter().find_map(|base| base.lookup(name)))
    }

    pub fn instantiate(self: &Arc<Self>) -> Instance {
        Instance {
            class: self.clone(),
            object: Arc::new(Object::new(self.type_info.clone())),
        }
    }

    /// Call a static or class-bound member through the class.
    ///
    /// # Errors
    ///
    /// - `Error::NoSuchMember`: no member of that name
    /// - `Error::UnboundMethod`: the member is instance-bound
    pub fn call(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value> {
        let member = self.member(name)?;
        let receiver = match member.binding() {
            Binding::Instance => return Err(Error::UnboundMethod(name.to_string())),
            Binding::Class => Receiver::Class(self),
            Binding::Static => Receiver::Static,
        };
        member.invoke(&receiver, args)
    }

    fn member(&self, name: &str) -> Result<&Member> {
        self.lookup(name).ok_or_else(|| Error::NoSuchMember {
            class: self.name.clone(),
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for DispatchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bases: Vec<&str> = self.bases.iter().map(|base| base.name()).collect();
        f.debug_struct("DispatchClass")
            .field("name", &self.name)
            .field("bases", &bases)
            .field("members", &self.members)
            .finish()
    }
}

/// An instance of a [`DispatchClass`].
#[derive(Clone)]
pub struct Instance {
    class: Arc<DispatchClass>,
    object: Arc<Object>,
}

impl Instance {
    pub fn class(&self) -> &Arc<DispatchClass> {
        &self.class
    }

    /// This instance as a dispatch argument.
    pub fn value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    /// Call any member; the receiver follows the member's binding.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let member = self.class.member(name)?;
        let receiver = match member.binding() {
            Binding::Instance => Receiver::Instance(self),
            Binding::Class => Receiver::Class(&self.class),
            Binding::Static => Receiver::Static,
        };
        member.invoke(&receiver, args)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

/// Fluent builder for [`DispatchClass`].
pub struct DispatchClassBuilder {
    name: String,
    bases: Vec<Arc<DispatchClass>>,
    type_bases: Vec<Arc<TypeInfo>>,
    groups: IndexMap<String, DispatchTree>,
    assert_types: bool,
    conflict: Option<Error>,
}

impl DispatchClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        DispatchClassBuilder {
            name: name.into(),
            bases: Vec::new(),
            type_bases: Vec::new(),
            groups: IndexMap::new(),
            assert_types: false,
            conflict: None,
        }
    }

    /// Add a dispatch ancestor. Its overloads take part in dispatch for
    /// every name this class also declares. Ancestors are searched
    /// depth-first in the order they are added.
    pub fn extends(mut self, base: &Arc<DispatchClass>) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Add a plain ancestor type. It only affects `isinstance` checks on
    /// instances; none of its methods are ever dispatched to.
    pub fn extends_type(mut self, base: Arc<TypeInfo>) -> Self {
        self.type_bases.push(base);
        self
    }

    /// Check every declared argument type before each call and fail with
    /// `Error::TypeMismatch`, including when the default runs as fallback.
    /// Overloads whose types are all `Any` are not wrapped.
    pub fn assert_types(mut self) -> Self {
        self.assert_types = true;
        self
    }

    pub fn method<I, F>(self, name: impl Into<String>, types: I, func: F) -> Self
    where
        I: IntoIterator<Item = DeclaredType>,
        F: Fn(&Receiver<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.declare(Binding::Instance, name.into(), types, Arc::new(func))
    }

    pub fn static_method<I, F>(self, name: impl Into<String>, types: I, func: F) -> Self
    where
        I: IntoIterator<Item = DeclaredType>,
        F: Fn(&Receiver<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.declare(Binding::Static, name.into(), types, Arc::new(func))
    }

    pub fn class_method<I, F>(self, name: impl Into<String>, types: I, func: F) -> Self
    where
        I: IntoIterator<Item = DeclaredType>,
        F: Fn(&Receiver<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.declare(Binding::Class, name.into(), types, Arc::new(func))
    }

    fn declare<I>(mut self, binding: Binding, name: String, types: I, func: Callable) -> Self
    where
        I: IntoIterator<Item = DeclaredType>,
    {
        let tree = self
            .groups
            .entry(name.clone())
            .or_insert_with(|| DispatchTree::new(binding));

        if tree.binding() != binding && self.conflict.is_none() {
            self.conflict = Some(Error::IllegalConstruction(format!(
                "{}.{} is declared as both {} and {} method",
                self.name,
                name,
                tree.binding(),
                binding
            )));
        }
        tree.register(Overload::new(types.into_iter().collect(), func));
        self
    }

    /// Merge every declared name with its ancestors' overloads and freeze
    /// the class.
    ///
    /// # Errors
    ///
    /// `Error::IllegalConstruction` when one name is declared with different
    /// bindings.
    pub fn build(self) -> Result<Arc<DispatchClass>> {
        if let Some(conflict) = self.conflict {
            return Err(conflict);
        }

        let mut members = IndexMap::new();
        for (name, tree) in self.groups {
            let binding = tree.binding();
            let tree = if self.assert_types {
                with_type_asserts(&self.name, &name, tree)
            } else {
                tree
            };

            let mut trees = vec![Arc::new(tree)];
            for base in &self.bases {
                match base.lookup(&name) {
                    Some(Member::Dispatched(function)) => {
                        trees.extend(function.trees().iter().cloned());
                    }
                    Some(Member::Plain {
                        binding: base_binding,
                        overload,
                    }) => {
                        trees.push(Arc::new(DispatchTree::single(
                            *base_binding,
                            overload.clone(),
                        )));
                    }
                    None => {}
                }
            }

            let member = match trees.as_slice() {
                [only] if only.count() == 1 => only.sole().map(|overload| Member::Plain { binding, overload }),
                _ => None,
            };
            let member = member.unwrap_or_else(|| {
                Member::Dispatched(Arc::new(DispatchFunction {
                    name: format!("{}.{}", self.name, name),
                    binding,
                    trees,
                }))
            });
            members.insert(name, member);
        }

        let mut type_info = TypeInfo::new(self.name.as_str()).with_methods(members.keys().cloned());
        for base in &self.bases {
            type_info = type_info.with_base(base.type_info.clone());
        }
        for base in self.type_bases {
            type_info = type_info.with_base(base);
        }

        let dispatched = members.values().filter(|m| m.is_dispatched()).count();
        info!(
            "✓ Built dispatch class {}: {} members, {} dispatched",
            self.name,
            members.len(),
            dispatched
        );

        Ok(Arc::new(DispatchClass {
            name: self.name,
            bases: self.bases,
            type_info: Arc::new(type_info),
            members,
        }))
    }
}

fn with_type_asserts(class: &str, name: &str, tree: DispatchTree) -> DispatchTree {
    let owner = format!("{}.{}", class, name);
    let wrap = |overload: Overload| {
        let func = type_assert(&owner, overload.types(), overload.func().clone());
        Overload::new(overload.types().to_vec(), func)
    };

    let mut asserted = DispatchTree::new(tree.binding());
    if let Some(default) = tree.default() {
        asserted.register(wrap(default.clone()));
    }
    for overload in tree.overloads() {
        asserted.register(wrap(overload));
    }
    asserted
}
