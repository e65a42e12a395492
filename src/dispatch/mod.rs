//! Type-directed multiple dispatch over declared parameter types.
//!
//! A class built with [`DispatchClassBuilder`] may declare the same method
//! name several times with different [`DeclaredType`] signatures. Each name
//! gets a [`DispatchTree`]; at build time the class's own tree is merged
//! with the trees its dispatch ancestors resolved for that name, and at call
//! time the trees are consulted most-derived first. When nothing matches,
//! the first overload declared on the most-derived class runs.
//!
//! A name declared exactly once, with no dispatch ancestor defining it, is
//! installed as a plain method and carries no dispatch overhead.
//!
//! # Example
//!
//! ```
//! use prop_kit::dispatch::{DeclaredType, DispatchClassBuilder};
//! use prop_kit::{TypeTag, Value};
//!
//! let int = DeclaredType::of(TypeTag::Int);
//! let text = DeclaredType::of(TypeTag::Str);
//!
//! let class = DispatchClassBuilder::new("Describe")
//!     .method("describe", [int.clone(), int], |_, _| Ok(Value::from("default")))
//!     .method("describe", [DeclaredType::Any, text], |_, _| Ok(Value::from("any, str")))
//!     .build()?;
//!
//! let instance = class.instantiate();
//! let out = instance.call("describe", &[Value::Float(1.5), Value::from("hi")])?;
//! assert_eq!(out, Value::from("any, str"));
//!
//! let fallback = instance.call("describe", &[Value::None, Value::None])?;
//! assert_eq!(fallback, Value::from("default"));
//! # Ok::<(), prop_kit::Error>(())
//! ```

pub mod assert;
mod class;
mod tree;

pub use class::{DispatchClass, DispatchClassBuilder, DispatchFunction, Instance, Member};
pub use tree::{DispatchNode, DispatchTree};

use crate::error::Result;
use crate::value::{TypeTag, Value};
use std::fmt;
use std::sync::Arc;

/// How a method binds its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Receives the instance it was called on.
    Instance,
    /// Receives nothing.
    Static,
    /// Receives the class it was called through.
    Class,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Instance => write!(f, "instance"),
            Binding::Static => write!(f, "static"),
            Binding::Class => write!(f, "class"),
        }
    }
}

/// Declared type of one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    /// No declared type. Matches anything, but only after every concrete
    /// branch at the same position has failed.
    Any,
    Of(TypeTag),
}

impl DeclaredType {
    pub fn of(tag: TypeTag) -> Self {
        DeclaredType::Of(tag)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, DeclaredType::Any)
    }
}

impl From<TypeTag> for DeclaredType {
    fn from(tag: TypeTag) -> Self {
        DeclaredType::Of(tag)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Any => write!(f, "_"),
            DeclaredType::Of(tag) => write!(f, "{tag}"),
        }
    }
}

/// What a method receives in place of `self`.
#[derive(Debug, Clone, Copy)]
pub enum Receiver<'a> {
    Instance(&'a Instance),
    Class(&'a Arc<DispatchClass>),
    Static,
}

impl<'a> Receiver<'a> {
    pub fn instance(&self) -> Option<&'a Instance> {
        match self {
            Receiver::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// The receiving class; for instance receivers, the instance's class.
    pub fn class(&self) -> Option<&'a Arc<DispatchClass>> {
        match self {
            Receiver::Instance(instance) => Some(instance.class()),
            Receiver::Class(class) => Some(class),
            Receiver::Static => None,
        }
    }
}

/// Method implementation.
pub type Callable = Arc<dyn Fn(&Receiver<'_>, &[Value]) -> Result<Value> + Send + Sync>;

/// One implementation with its declared signature.
#[derive(Clone)]
pub struct Overload {
    types: Vec<DeclaredType>,
    func: Callable,
}

impl Overload {
    pub fn new(types: Vec<DeclaredType>, func: Callable) -> Self {
        Overload { types, func }
    }

    pub fn types(&self) -> &[DeclaredType] {
        &self.types
    }

    pub fn func(&self) -> &Callable {
        &self.func
    }

    pub(crate) fn invoke(&self, receiver: &Receiver<'_>, args: &[Value]) -> Result<Value> {
        (self.func)(receiver, args)
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<String> = self.types.iter().map(ToString::to_string).collect();
        write!(f, "Overload({})", types.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_display() {
        assert_eq!(Binding::Instance.to_string(), "instance");
        assert_eq!(Binding::Static.to_string(), "static");
        assert_eq!(Binding::Class.to_string(), "class");
    }

    #[test]
    fn test_overload_debug() {
        let overload = Overload::new(
            vec![DeclaredType::of(TypeTag::Int), DeclaredType::Any],
            Arc::new(|_: &Receiver<'_>, _: &[Value]| Ok(Value::None)),
        );
        assert_eq!(format!("{:?}", overload), "Overload(int, _)");
    }

    #[test]
    fn test_static_receiver_has_no_class() {
        assert!(Receiver::Static.class().is_none());
        assert!(Receiver::Static.instance().is_none());
    }
}
