//! Declared parameters and the arguments resolved for them.

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::value::{TypeTag, Value};
use indexmap::IndexMap;

/// How a parameter is filled.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Must be present in the option store at evaluation time.
    Required,
    /// Taken from the option store when present, else this default.
    Optional(Value),
    /// Open-ended keyword parameter. Cannot be sourced from options and is
    /// rejected when a class is built.
    VarKeyword,
}

/// A named parameter of a getter or method.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            kind: ParamKind::Required,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Param {
            name: name.into(),
            kind: ParamKind::Optional(default.into()),
        }
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            kind: ParamKind::VarKeyword,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.kind {
            ParamKind::Optional(default) => Some(default),
            _ => None,
        }
    }

    /// Look this parameter up in `options`, falling back to its default.
    pub(crate) fn resolve(&self, options: &ConfigStore) -> Result<Value> {
        match &self.kind {
            ParamKind::Required => options
                .get(&self.name)
                .ok_or_else(|| Error::MissingOption(self.name.clone())),
            ParamKind::Optional(default) => {
                Ok(options.get(&self.name).unwrap_or_else(|| default.clone()))
            }
            ParamKind::VarKeyword => Err(Error::IllegalConstruction(format!(
                "variadic keyword parameter \"{}\" cannot be sourced from options",
                self.name
            ))),
        }
    }
}

/// Reject parameter lists the option store cannot fill.
pub(crate) fn check_params(owner: &str, params: &[Param]) -> Result<()> {
    if let Some(param) = params
        .iter()
        .find(|p| matches!(p.kind, ParamKind::VarKeyword))
    {
        return Err(Error::IllegalConstruction(format!(
            "{} declares variadic keyword parameter \"{}\"",
            owner, param.name
        )));
    }

    for (i, param) in params.iter().enumerate() {
        if params[..i].iter().any(|p| p.name == param.name) {
            return Err(Error::IllegalConstruction(format!(
                "{} declares parameter \"{}\" twice",
                owner, param.name
            )));
        }
    }
    Ok(())
}

/// Arguments handed to a getter or method, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| Error::MissingOption(name.to_string()))
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: TypeTag,
        read: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T> {
        let (index, _, value) = self
            .values
            .get_full(name)
            .ok_or_else(|| Error::MissingOption(name.to_string()))?;
        read(value).ok_or_else(|| Error::TypeMismatch {
            name: name.to_string(),
            index,
            expected: expected.to_string(),
            actual: value.type_tag().to_string(),
        })
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        self.typed(name, TypeTag::Str, Value::as_str)
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.typed(name, TypeTag::Int, Value::as_int)
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        self.typed(name, TypeTag::Float, Value::as_float)
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        self.typed(name, TypeTag::Bool, Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Positional view of the arguments.
    pub fn values(&self) -> Vec<Value> {
        self.values.values().cloned().collect()
    }
}
