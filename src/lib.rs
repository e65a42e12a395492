//! # prop-kit
//!
//! Lazy, dependency-tracked properties over a shared option store, and
//! type-directed multiple dispatch with inheritance-aware overload merging.
//!
//! ## Features
//!
//! - **Chained properties:** properties computed on first read, cached per
//!   instance, and invalidated transitively when an option they read changes
//! - **Option store:** ordered key/value store with weakly held change callbacks
//! - **Option-sourced methods:** uncached methods whose remaining arguments
//!   come from the store
//! - **Multiple dispatch:** overloads selected by declared argument types,
//!   merged across dispatch ancestors, with a declared default
//! - **Goose typing:** hook-method checks for virtual subclasses
//! - **Observability:** `log` throughout, pluggable cache metrics
//!
//! ## Quick Start
//!
//! ```
//! use prop_kit::{ChainedProps, ConfigStore, Param, PropsClassBuilder, Value};
//!
//! // 1. Declare properties and the options they read
//! let class = PropsClassBuilder::new("Chained")
//!     .property(
//!         "test",
//!         vec![Param::required("hej"), Param::optional("med", "dig")],
//!         |_, args| Ok(Value::from(format!("{}{}", args.str("hej")?, args.str("med")?))),
//!     )
//!     .property("shout", vec![], |this, _| {
//!         Ok(Value::from(this.get("test")?.to_string().to_uppercase()))
//!     })
//!     .build()?;
//!
//! // 2. Bind an instance to an option store
//! let opts = ConfigStore::from_pairs([("hej", "foo"), ("med", "bar")]);
//! let chained = ChainedProps::new(&class, &opts);
//!
//! // 3. Read; changing an option invalidates everything downstream
//! assert_eq!(chained.get("shout")?, Value::from("FOOBAR"));
//! opts.set("hej", "boo");
//! assert_eq!(chained.get("shout")?, Value::from("BOOBAR"));
//! # Ok::<(), prop_kit::Error>(())
//! ```

#[macro_use]
extern crate log;

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod expander;
pub mod forward;
pub mod graph;
pub mod hooks;
pub mod key;
pub mod observability;
pub mod param;
pub mod value;

// Re-exports for convenience
pub use builder::{PropertyDef, PropsClass, PropsClassBuilder};
pub use config::{ConfigStore, Subscription};
pub use dispatch::{
    Binding, DeclaredType, DispatchClass, DispatchClassBuilder, Instance, Receiver,
};
pub use error::{Error, Result};
pub use expander::ChainedProps;
pub use forward::{ArgSelector, OptMethod};
pub use hooks::HookedAbc;
pub use key::GlobalPropertyId;
pub use observability::{CountingMetrics, NoOpMetrics, PropMetrics};
pub use param::{Args, Param, ParamKind};
pub use value::{Object, TypeInfo, TypeTag, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
