//! Runtime values and the closed set of types they can carry.
//!
//! Option-store entries, property results and dispatch arguments are all
//! [`Value`]s. A [`TypeTag`] names the runtime type of a value, and
//! [`TypeTag::matches`] is the `isinstance` check used by dispatch.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A dynamically typed value.
///
/// Serializes untagged, so JSON maps onto it directly. `Tuple` serializes as
/// a sequence and comes back as a `List`; `Object` cannot be serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(IndexMap<String, Value>),
    #[serde(skip)]
    Object(Arc<Object>),
}

impl Value {
    /// Build a tuple value.
    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Instantiate an object of the given user type with no fields.
    pub fn object(type_info: &Arc<TypeInfo>) -> Self {
        Value::Object(Arc::new(Object::new(type_info.clone())))
    }

    /// Runtime type of this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::None => TypeTag::None,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::List(_) => TypeTag::List,
            Value::Tuple(_) => TypeTag::Tuple,
            Value::Map(_) => TypeTag::Map,
            Value::Object(obj) => TypeTag::Object(obj.type_info().name_arc()),
        }
    }

    /// Equality that treats ints and floats of the same magnitude as equal.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
            _ => self == other,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and ints widened to float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Parse `raw` into a value of the same runtime type as `self`.
    ///
    /// Used when option values arrive as text (environment variables).
    /// `None` templates accept the text as a string.
    pub fn coerce_like(&self, raw: &str) -> Result<Value> {
        let bad = |tag: TypeTag| Error::ConfigError(format!("cannot read {raw:?} as {tag}"));
        match self {
            Value::None | Value::Str(_) => Ok(Value::Str(raw.to_string())),
            Value::Bool(_) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(bad(TypeTag::Bool)),
            },
            Value::Int(_) => raw
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| bad(TypeTag::Int)),
            Value::Float(_) => raw
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| bad(TypeTag::Float)),
            Value::List(_) | Value::Tuple(_) | Value::Map(_) => {
                let parsed: Value = serde_json::from_str(raw)?;
                match (self, parsed) {
                    (Value::List(_), Value::List(items)) => Ok(Value::List(items)),
                    (Value::Tuple(_), Value::List(items)) => Ok(Value::Tuple(items)),
                    (Value::Map(_), Value::Map(map)) => Ok(Value::Map(map)),
                    _ => Err(bad(self.type_tag())),
                }
            }
            Value::Object(_) => Err(bad(self.type_tag())),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            Value::Str(s) => write!(f, "{s:?}")?,
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                write_seq(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_seq(f, items)?;
                write!(f, ")")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Object(obj) => write!(f, "<{} object>", obj.type_info().name()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Arc<Object>> for Value {
    fn from(obj: Arc<Object>) -> Self {
        Value::Object(obj)
    }
}

/// Runtime type of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Map,
    /// A user type, matched against an object's whole lineage.
    Object(Arc<str>),
}

impl TypeTag {
    pub fn object(name: impl Into<Arc<str>>) -> Self {
        TypeTag::Object(name.into())
    }

    /// `isinstance` check.
    ///
    /// Objects match their own type name and every ancestor's. `Bool` and
    /// `Int` are disjoint.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeTag::Object(name), Value::Object(obj)) => obj.type_info().is_subtype_of(name),
            (TypeTag::Object(_), _) => false,
            (tag, value) => *tag == value.type_tag(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::None => write!(f, "none"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::Str => write!(f, "str"),
            TypeTag::List => write!(f, "list"),
            TypeTag::Tuple => write!(f, "tuple"),
            TypeTag::Map => write!(f, "map"),
            TypeTag::Object(name) => write!(f, "{name}"),
        }
    }
}

/// Description of a user type: its name, direct bases and the method names
/// it declares itself.
#[derive(Debug)]
pub struct TypeInfo {
    name: Arc<str>,
    bases: Vec<Arc<TypeInfo>>,
    methods: BTreeSet<String>,
}

impl TypeInfo {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        TypeInfo {
            name: name.into(),
            bases: Vec::new(),
            methods: BTreeSet::new(),
        }
    }

    pub fn with_base(mut self, base: Arc<TypeInfo>) -> Self {
        self.bases.push(base);
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn bases(&self) -> &[Arc<TypeInfo>] {
        &self.bases
    }

    pub fn declared_methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// This type followed by its ancestors, depth-first and left to right,
    /// each name listed once.
    pub fn lineage(&self) -> Vec<&TypeInfo> {
        fn walk<'a>(ty: &'a TypeInfo, out: &mut Vec<&'a TypeInfo>) {
            if out.iter().any(|seen| seen.name == ty.name) {
                return;
            }
            out.push(ty);
            for base in &ty.bases {
                walk(base, out);
            }
        }

        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.lineage().iter().any(|ty| ty.name() == name)
    }

    /// Whether `method` is declared anywhere in the lineage.
    pub fn has_method(&self, method: &str) -> bool {
        self.lineage().iter().any(|ty| ty.methods.contains(method))
    }
}

/// An instance of a user type.
#[derive(Debug)]
pub struct Object {
    type_info: Arc<TypeInfo>,
    fields: IndexMap<String, Value>,
}

impl Object {
    pub fn new(type_info: Arc<TypeInfo>) -> Self {
        Object {
            type_info,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

// Objects compare by identity.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animal_types() -> (Arc<TypeInfo>, Arc<TypeInfo>) {
        let animal = Arc::new(TypeInfo::new("Animal").with_methods(["speak"]));
        let dog = Arc::new(TypeInfo::new("Dog").with_base(animal.clone()));
        (animal, dog)
    }

    #[test]
    fn test_type_tag_matches_primitives() {
        assert!(TypeTag::Int.matches(&Value::Int(1)));
        assert!(TypeTag::Str.matches(&Value::from("hi")));
        assert!(!TypeTag::Int.matches(&Value::Float(1.0)));
        assert!(!TypeTag::Int.matches(&Value::Bool(true)));
        assert!(TypeTag::Tuple.matches(&Value::tuple([2.2])));
    }

    #[test]
    fn test_object_matches_lineage() {
        let (_, dog) = animal_types();
        let rex = Value::object(&dog);

        assert!(TypeTag::object("Dog").matches(&rex));
        assert!(TypeTag::object("Animal").matches(&rex));
        assert!(!TypeTag::object("Cat").matches(&rex));
        assert!(!TypeTag::object("Dog").matches(&Value::Int(3)));
        assert_eq!(rex.type_tag(), TypeTag::object("Dog"));
    }

    #[test]
    fn test_lineage_and_methods() {
        let (_, dog) = animal_types();
        let names: Vec<&str> = dog.lineage().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Dog", "Animal"]);
        assert!(dog.has_method("speak"));
        assert!(!dog.has_method("fetch"));
    }

    #[test]
    fn test_object_identity_equality() {
        let (animal, _) = animal_types();
        let a = Value::object(&animal);
        let b = Value::object(&animal);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_json_round_into_value() {
        let value: Value = serde_json::from_str(r#"{"a": 1, "b": 1.5, "c": [true, null, "x"]}"#)
            .expect("Failed to parse");
        let Value::Map(map) = value else {
            panic!("Expected map");
        };
        assert_eq!(map["a"], Value::Int(1));
        assert_eq!(map["b"], Value::Float(1.5));
        assert_eq!(
            map["c"],
            Value::List(vec![Value::Bool(true), Value::None, Value::from("x")])
        );
    }

    #[test]
    fn test_object_not_serializable() {
        let (animal, _) = animal_types();
        assert!(serde_json::to_string(&Value::object(&animal)).is_err());
    }

    #[test]
    fn test_coerce_like() {
        assert_eq!(Value::Int(0).coerce_like(" 42 ").unwrap(), Value::Int(42));
        assert_eq!(Value::Float(0.0).coerce_like("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(Value::Bool(false).coerce_like("yes").unwrap(), Value::Bool(true));
        assert_eq!(Value::None.coerce_like("x").unwrap(), Value::from("x"));
        assert_eq!(
            Value::List(vec![]).coerce_like("[1, 2]").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert!(Value::Int(0).coerce_like("many").is_err());
        assert!(Value::Map(IndexMap::new()).coerce_like("[1]").is_err());
    }

    #[test]
    fn test_equivalent_numbers() {
        assert!(Value::Int(1).equivalent(&Value::Float(1.0)));
        assert!(Value::Float(2.0).equivalent(&Value::Int(2)));
        assert!(!Value::Int(1).equivalent(&Value::Float(1.5)));
        assert!(!Value::Bool(true).equivalent(&Value::Int(1)));
        assert!(Value::from("a").equivalent(&Value::from("a")));
    }

    #[test]
    fn test_display() {
        let v = Value::tuple([Value::from("int"), Value::from("str")]);
        assert_eq!(v.to_string(), r#"("int", "str")"#);
        assert_eq!(Value::from("foobar").to_string(), "foobar");
    }
}
