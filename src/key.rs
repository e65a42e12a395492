//! Globally qualified property identifiers.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// `(owning type, property name)` pair used as cache and dependency key.
///
/// Equality is structural. Printed as `Type.property`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalPropertyId {
    class: Arc<str>,
    name: Arc<str>,
}

impl GlobalPropertyId {
    pub fn new(class: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        GlobalPropertyId {
            class: class.into(),
            name: name.into(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for GlobalPropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

impl FromStr for GlobalPropertyId {
    type Err = Error;

    /// Parse `Type.property`. The split happens at the last dot.
    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((class, name)) if !class.is_empty() && !name.is_empty() => {
                Ok(GlobalPropertyId::new(class, name))
            }
            _ => Err(Error::UnknownProperty(format!(
                "invalid qualified property name: {}",
                s
            ))),
        }
    }
}
