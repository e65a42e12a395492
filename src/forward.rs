//! Methods whose arguments are partly sourced from the option store.
//!
//! Unlike properties, forwarded methods are neither cached nor tracked in
//! the dependency graph: every call resolves its option-sourced parameters
//! afresh.

use crate::dispatch::Binding;
use crate::error::{Error, Result};
use crate::expander::ChainedProps;
use crate::param::{check_params, Args, Param};
use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Method body. Receives every parameter, caller-supplied or sourced.
pub type MethodFn = dyn Fn(&ChainedProps, &Args) -> Result<Value> + Send + Sync;

/// Which parameters the caller supplies positionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSelector {
    /// The first N parameters.
    Leading(usize),
    /// The named parameters, in declaration order.
    Named(BTreeSet<String>),
    /// None; every parameter comes from options.
    AllFromOptions,
}

impl ArgSelector {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgSelector::Named(names.into_iter().map(Into::into).collect())
    }

    fn is_caller_supplied(&self, index: usize, name: &str) -> bool {
        match self {
            ArgSelector::Leading(n) => index < *n,
            ArgSelector::Named(names) => names.contains(name),
            ArgSelector::AllFromOptions => false,
        }
    }
}

/// A method on a chained-properties class with option-sourced arguments.
pub struct OptMethod {
    name: String,
    selector: ArgSelector,
    params: Vec<Param>,
    binding: Binding,
    func: Arc<MethodFn>,
}

impl OptMethod {
    pub fn new<F>(name: impl Into<String>, selector: ArgSelector, params: Vec<Param>, func: F) -> Self
    where
        F: Fn(&ChainedProps, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        OptMethod {
            name: name.into(),
            selector,
            params,
            binding: Binding::Instance,
            func: Arc::new(func),
        }
    }

    /// Declare a non-instance binding. Such methods are rejected at build
    /// time: without an instance there is no option store to read.
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &ArgSelector {
        &self.selector
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn caller_params(&self) -> usize {
        self.params
            .iter()
            .enumerate()
            .filter(|(i, p)| self.selector.is_caller_supplied(*i, p.name()))
            .count()
    }

    pub(crate) fn validate(&self, class: &str) -> Result<()> {
        let owner = format!("{}.{}", class, self.name);
        if self.binding != Binding::Instance {
            return Err(Error::IllegalConstruction(format!(
                "{} sources arguments from options and cannot be a {} method",
                owner, self.binding
            )));
        }
        check_params(&owner, &self.params)?;

        match &self.selector {
            ArgSelector::Leading(n) if *n > self.params.len() => {
                Err(Error::IllegalConstruction(format!(
                    "{} has {} parameters, cannot take the first {} from the caller",
                    owner,
                    self.params.len(),
                    n
                )))
            }
            ArgSelector::Named(names) => {
                match names
                    .iter()
                    .find(|name| !self.params.iter().any(|p| p.name() == name.as_str()))
                {
                    Some(unknown) => Err(Error::IllegalConstruction(format!(
                        "{} has no parameter \"{}\"",
                        owner, unknown
                    ))),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Call with `caller` filling the selected parameters in order.
    ///
    /// Missing trailing caller arguments fall back to parameter defaults.
    pub(crate) fn invoke(&self, this: &ChainedProps, caller: &[Value]) -> Result<Value> {
        let expected = self.caller_params();
        let count_error = || Error::ArgumentCount {
            name: self.name.clone(),
            expected,
            actual: caller.len(),
        };
        if caller.len() > expected {
            return Err(count_error());
        }

        let mut supplied = caller.iter();
        let mut args = Args::new();
        for (i, param) in self.params.iter().enumerate() {
            let value = if self.selector.is_caller_supplied(i, param.name()) {
                match supplied.next() {
                    Some(value) => value.clone(),
                    None => param.default_value().cloned().ok_or_else(count_error)?,
                }
            } else {
                param.resolve(this.options())?
            };
            args.push(param.name(), value);
        }

        debug!("Calling {} with {} argument(s)", self.name, args.len());
        (self.func)(this, &args)
    }
}

impl fmt::Debug for OptMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptMethod")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("params", &self.params)
            .field("binding", &self.binding)
            .finish()
    }
}
