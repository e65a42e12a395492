//! Chained properties - lazy, dependency-tracked property evaluation.
//!
//! A [`ChainedProps`] instance binds a built [`PropsClass`] to a
//! [`ConfigStore`]. Reading a property:
//!
//! 1. records the property currently being computed (top of the call stack)
//!    as a dependant of the one being read, even on a cache hit;
//! 2. returns the cached value if there is one;
//! 3. otherwise resolves the getter's parameters from the store, subscribes
//!    the property to every key it consulted, runs the getter and caches the
//!    result.
//!
//! When a consulted key changes, or a property is invalidated explicitly,
//! the cached value is dropped together with every property that
//! transitively consumed it.

use crate::builder::{PropertyDef, PropsClass};
use crate::config::{Callback, ConfigStore};
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, PropIndex};
use crate::key::GlobalPropertyId;
use crate::observability::{NoOpMetrics, PropMetrics};
use crate::param::Args;
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

struct PropState {
    cache: HashMap<PropIndex, Value>,
    /// Properties each thread is currently computing, innermost last.
    stacks: HashMap<ThreadId, Vec<PropIndex>>,
    /// Bumped whenever a property is invalidated. A computation only
    /// caches its result if the generation it started under is current.
    generations: HashMap<PropIndex, u64>,
    graph: DependencyGraph,
    /// One change listener per property, shared by every key it consults.
    listeners: HashMap<PropIndex, Arc<Callback>>,
}

impl PropState {
    fn generation(&self, index: PropIndex) -> u64 {
        self.generations.get(&index).copied().unwrap_or(0)
    }

    fn is_computing(&self, index: PropIndex) -> bool {
        self.stacks.values().any(|stack| stack.contains(&index))
    }

    fn pop(&mut self, thread: ThreadId, index: PropIndex) {
        if let Some(stack) = self.stacks.get_mut(&thread) {
            if let Some(pos) = stack.iter().rposition(|&i| i == index) {
                stack.remove(pos);
            }
            if stack.is_empty() {
                self.stacks.remove(&thread);
            }
        }
    }
}

struct Inner {
    class: Arc<PropsClass>,
    options: ConfigStore,
    metrics: Arc<dyn PropMetrics>,
    state: Mutex<PropState>,
}

impl Inner {
    fn def(&self, index: PropIndex) -> Result<&Arc<PropertyDef>> {
        self.class
            .table()
            .get(index)
            .ok_or_else(|| Error::UnknownProperty(format!("{} in {}", index, self.class.name())))
    }

    /// Drop `index` and, breadth-first, everything that consumed it.
    ///
    /// Properties that are being computed are not cached yet. Their
    /// generation is bumped so the running computation discards its result.
    fn invalidate(&self, index: PropIndex) {
        let table = self.class.table();
        let mut state = self.state.lock();

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([index]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            // An uncached property that nobody is computing or consuming has
            // never been computed or was already invalidated with its
            // dependants. One whose getter failed may still have consumers.
            let cached = state.cache.remove(&next).is_some();
            let consumed = state.graph.dependants_of(next).next().is_some();
            if !cached && !consumed && !state.is_computing(next) {
                continue;
            }
            *state.generations.entry(next).or_default() += 1;
            queue.extend(state.graph.dependants_of(next));

            let Some(def) = table.get(next) else { continue };
            if cached {
                state.graph.clear_dependencies_of(next);
                debug!("Invalidated {}", def.id());
                self.metrics.record_invalidation(def.id());
            } else {
                trace!("Invalidating consumers of uncached {}", def.id());
            }
        }
    }
}

/// An instance of a chained-properties class.
///
/// Clones share the same cache. Locks are never held while a getter runs,
/// so getters may read other properties. Each thread keeps its own call
/// stack, and a value computed while one of its inputs changed is returned
/// but not cached.
///
/// # Example
///
/// ```
/// use prop_kit::{ChainedProps, ConfigStore, Param, PropsClassBuilder, Value};
///
/// let class = PropsClassBuilder::new("Chained")
///     .property(
///         "test",
///         vec![Param::required("hej"), Param::optional("med", "dig")],
///         |_, args| Ok(Value::from(format!("{}{}", args.str("hej")?, args.str("med")?))),
///     )
///     .build()?;
///
/// let opts = ConfigStore::from_pairs([("hej", "foo"), ("med", "bar")]);
/// let chained = ChainedProps::new(&class, &opts);
///
/// assert_eq!(chained.get("test")?, Value::from("foobar"));
/// opts.set("med", "far");
/// assert_eq!(chained.get("test")?, Value::from("foofar"));
/// # Ok::<(), prop_kit::Error>(())
/// ```
#[derive(Clone)]
pub struct ChainedProps {
    inner: Arc<Inner>,
}

impl ChainedProps {
    /// Bind `class` to `options`.
    pub fn new(class: &Arc<PropsClass>, options: &ConfigStore) -> Self {
        Self::with_metrics(class, options, Arc::new(NoOpMetrics))
    }

    /// Bind `class` to `options`, reporting cache events to `metrics`.
    pub fn with_metrics(
        class: &Arc<PropsClass>,
        options: &ConfigStore,
        metrics: Arc<dyn PropMetrics>,
    ) -> Self {
        let size = class.table().len();
        ChainedProps {
            inner: Arc::new(Inner {
                class: class.clone(),
                options: options.clone(),
                metrics,
                state: Mutex::new(PropState {
                    cache: HashMap::new(),
                    stacks: HashMap::new(),
                    generations: HashMap::new(),
                    graph: DependencyGraph::new(size),
                    listeners: HashMap::new(),
                }),
            }),
        }
    }

    pub fn class(&self) -> &Arc<PropsClass> {
        &self.inner.class
    }

    pub fn options(&self) -> &ConfigStore {
        &self.inner.options
    }

    fn resolve(&self, name: &str) -> Result<PropIndex> {
        self.inner
            .class
            .table()
            .resolve(name)
            .ok_or_else(|| Error::NoSuchMember {
                class: self.inner.class.name().to_string(),
                name: name.to_string(),
            })
    }

    fn index_of(&self, id: &GlobalPropertyId) -> Result<PropIndex> {
        if let Some(index) = self.inner.class.table().index_of(id) {
            return Ok(index);
        }

        let class = self.inner.class.name();
        let dependant = {
            let state = self.inner.state.lock();
            state
                .stacks
                .get(&thread::current().id())
                .and_then(|stack| stack.last())
                .and_then(|&top| self.inner.class.table().get(top))
                .map(|def| def.id().clone())
        };
        Err(Error::UnknownProperty(match dependant {
            Some(dependant) => format!(
                "{} cannot depend on {}, {} is not a subclass of {}",
                dependant,
                id,
                class,
                id.class()
            ),
            None => format!("{} is not a property of {}", id, class),
        }))
    }

    /// Read the most-derived property named `name`.
    ///
    /// # Errors
    ///
    /// - `Error::NoSuchMember`: no property of that name
    /// - `Error::MissingOption`: a required parameter is not in the store
    /// - `Error::CyclicDependency`: the property is already being computed
    /// - any error returned by the getter
    pub fn get(&self, name: &str) -> Result<Value> {
        let index = self.resolve(name)?;
        self.get_index(index)
    }

    /// Read a specific definition, e.g. an ancestor's overridden one.
    ///
    /// # Errors
    ///
    /// `Error::UnknownProperty` if `id` is not visible from this class, plus
    /// everything [`get`](Self::get) can return.
    pub fn get_qualified(&self, id: &GlobalPropertyId) -> Result<Value> {
        let index = self.index_of(id)?;
        self.get_index(index)
    }

    fn get_index(&self, index: PropIndex) -> Result<Value> {
        let inner = &self.inner;
        let def = inner.def(index)?.clone();
        let thread = thread::current().id();
        let timer = Instant::now();

        let generation = {
            let mut state = inner.state.lock();
            let stack = state.stacks.entry(thread).or_default();

            if stack.contains(&index) {
                let chain = stack
                    .iter()
                    .filter_map(|&i| inner.class.table().get(i))
                    .map(|d| d.id().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                warn!("Cyclic property dependency: {} -> {}", chain, def.id());
                return Err(Error::CyclicDependency(format!("{} -> {}", chain, def.id())));
            }

            // The edge is recorded on hits too: the reader may be forming a
            // new dependency on an already cached value.
            let top = stack.last().copied();
            if let Some(dependant) = top {
                if state.graph.add_dependant(index, dependant) {
                    trace!("{} consumed {}", dependant, def.id());
                }
            }

            if let Some(value) = state.cache.get(&index).cloned() {
                if top.is_none() {
                    state.stacks.remove(&thread);
                }
                drop(state);
                debug!("✓ Property cache hit: {}", def.id());
                inner.metrics.record_hit(def.id(), timer.elapsed());
                return Ok(value);
            }

            state.stacks.entry(thread).or_default().push(index);
            state.generation(index)
        };

        debug!("✗ Property cache miss: {}", def.id());
        let result = self.evaluate(index, &def);

        let mut state = inner.state.lock();
        state.pop(thread, index);

        match result {
            Ok(value) => {
                if state.generation(index) == generation {
                    state.cache.insert(index, value.clone());
                } else {
                    debug!("✗ {} changed while computing, not cached", def.id());
                }
                drop(state);
                debug!("Computed {} in {:?}", def.id(), timer.elapsed());
                inner.metrics.record_miss(def.id(), timer.elapsed());
                Ok(value)
            }
            Err(e) => {
                drop(state);
                inner.metrics.record_error(def.id(), &e.to_string());
                Err(e)
            }
        }
    }

    fn evaluate(&self, index: PropIndex, def: &PropertyDef) -> Result<Value> {
        let listener = self.listener(index);
        let options = &self.inner.options;

        let mut args = Args::new();
        for param in def.params() {
            // Subscribe first: a missing key must still invalidate readers
            // once it is supplied.
            options.set_callback(param.name(), &listener);
            args.push(param.name(), param.resolve(options)?);
        }

        def.compute(self, &args)
    }

    fn listener(&self, index: PropIndex) -> Arc<Callback> {
        let mut state = self.inner.state.lock();
        state
            .listeners
            .entry(index)
            .or_insert_with(|| {
                let weak = Arc::downgrade(&self.inner);
                let callback: Arc<Callback> = Arc::new(move |key: &str, _value: &Value| {
                    if let Some(inner) = weak.upgrade() {
                        trace!("Option {} changed, invalidating {}", key, index);
                        inner.invalidate(index);
                    }
                });
                callback
            })
            .clone()
    }

    /// Drop the cached value of `name` and of everything that consumed it.
    /// Invalidating an uncached property is a no-op.
    pub fn invalidate(&self, name: &str) -> Result<()> {
        let index = self.resolve(name)?;
        self.inner.invalidate(index);
        Ok(())
    }

    pub fn invalidate_qualified(&self, id: &GlobalPropertyId) -> Result<()> {
        let index = self.index_of(id)?;
        self.inner.invalidate(index);
        Ok(())
    }

    pub fn is_cached(&self, name: &str) -> bool {
        match self.resolve(name) {
            Ok(index) => self.inner.state.lock().cache.contains_key(&index),
            Err(_) => false,
        }
    }

    /// Properties that consumed `name` during their last computation.
    pub fn dependants(&self, name: &str) -> Result<Vec<GlobalPropertyId>> {
        let index = self.resolve(name)?;
        let table = self.inner.class.table();
        let state = self.inner.state.lock();
        Ok(state
            .graph
            .dependants_of(index)
            .filter_map(|i| table.get(i))
            .map(|def| def.id().clone())
            .collect())
    }

    /// Call a method whose arguments are partly sourced from options.
    ///
    /// # Errors
    ///
    /// - `Error::NoSuchMember`: no method of that name
    /// - `Error::ArgumentCount`: wrong number of caller arguments
    /// - `Error::MissingOption`: a required sourced parameter is absent
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self
            .inner
            .class
            .method(name)
            .ok_or_else(|| Error::NoSuchMember {
                class: self.inner.class.name().to_string(),
                name: name.to_string(),
            })?
            .clone();
        method.invoke(self, args)
    }
}

impl fmt::Debug for ChainedProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.inner.state.lock().cache.len();
        f.debug_struct("ChainedProps")
            .field("class", &self.inner.class.name())
            .field("cached", &cached)
            .finish()
    }
}
