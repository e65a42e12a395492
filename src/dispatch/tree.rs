//! Per-name overload trie.

use super::{Binding, Callable, DeclaredType, Overload};
use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;

/// One level of the trie: a child per declared type seen at this position,
/// plus the implementation whose signature ends here.
#[derive(Clone, Default)]
pub struct DispatchNode {
    children: IndexMap<DeclaredType, DispatchNode>,
    func: Option<Callable>,
}

impl DispatchNode {
    fn insert(&mut self, types: &[DeclaredType], func: Callable) {
        match types.split_first() {
            Some((first, rest)) => self
                .children
                .entry(first.clone())
                .or_default()
                .insert(rest, func),
            None => self.func = Some(func),
        }
    }

    /// Walk the trie along `args`.
    ///
    /// Concrete branches are tried in first-declaration order and a branch
    /// whose subtree fails is abandoned for the next one. The `Any` branch is
    /// tried last; it consumes an argument when one is left and otherwise
    /// stands in for a trailing parameter the caller omitted.
    pub fn resolve(&self, args: &[Value]) -> Result<&Callable> {
        match args.split_first() {
            Some((arg, rest)) => {
                for (declared, child) in &self.children {
                    if let DeclaredType::Of(tag) = declared {
                        if tag.matches(arg) {
                            if let Ok(func) = child.resolve(rest) {
                                return Ok(func);
                            }
                        }
                    }
                }
            }
            None => {
                if let Some(func) = &self.func {
                    return Ok(func);
                }
            }
        }

        match self.children.get(&DeclaredType::Any) {
            Some(any) => any.resolve(args.get(1..).unwrap_or_default()),
            None => Err(Error::NoMatch),
        }
    }

    /// Number of implementations reachable from this node.
    pub fn count(&self) -> usize {
        self.children.values().map(DispatchNode::count).sum::<usize>() + usize::from(self.func.is_some())
    }
}

/// All overloads of one method name declared on one class.
///
/// The first registered overload is the default. Registering a signature
/// again replaces its implementation but keeps its position.
#[derive(Clone)]
pub struct DispatchTree {
    root: DispatchNode,
    default: Option<Overload>,
    signatures: IndexMap<Vec<DeclaredType>, Callable>,
    binding: Binding,
}

impl DispatchTree {
    pub fn new(binding: Binding) -> Self {
        DispatchTree {
            root: DispatchNode::default(),
            default: None,
            signatures: IndexMap::new(),
            binding,
        }
    }

    /// Tree holding a single overload, for an ancestor's plain method.
    pub fn single(binding: Binding, overload: Overload) -> Self {
        let mut tree = Self::new(binding);
        tree.register(overload);
        tree
    }

    pub fn register(&mut self, overload: Overload) {
        self.root.insert(&overload.types, overload.func.clone());
        self.signatures
            .insert(overload.types.clone(), overload.func.clone());
        if self.default.is_none() {
            self.default = Some(overload);
        }
    }

    /// Implementation for `args`, or `Error::NoMatch`.
    pub fn resolve(&self, args: &[Value]) -> Result<&Callable> {
        self.root.resolve(args)
    }

    pub fn default(&self) -> Option<&Overload> {
        self.default.as_ref()
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn count(&self) -> usize {
        self.root.count()
    }

    /// The only overload, when exactly one signature is registered.
    pub fn sole(&self) -> Option<Overload> {
        if self.signatures.len() != 1 {
            return None;
        }
        self.signatures
            .first()
            .map(|(types, func)| Overload::new(types.clone(), func.clone()))
    }

    /// Current overload of every signature, in first-registration order.
    pub fn overloads(&self) -> impl Iterator<Item = Overload> + '_ {
        self.signatures
            .iter()
            .map(|(types, func)| Overload::new(types.clone(), func.clone()))
    }

    pub fn signatures(&self) -> impl Iterator<Item = &[DeclaredType]> {
        self.signatures.keys().map(Vec::as_slice)
    }

    pub fn root(&self) -> &DispatchNode {
        &self.root
    }
}

impl fmt::Debug for DispatchTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signatures: Vec<String> = self
            .signatures()
            .map(|types| {
                let names: Vec<String> = types.iter().map(ToString::to_string).collect();
                format!("({})", names.join(", "))
            })
            .collect();
        f.debug_struct("DispatchTree")
            .field("binding", &self.binding)
            .field("signatures", &signatures)
            .finish()
    }
}
