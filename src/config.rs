//! Shared option store with per-key change notification.
//!
//! [`ConfigStore`] is the single source of arguments for chained properties.
//! Every clone is a handle to the same store; [`ConfigStore::deep_copy`]
//! makes an independent one.
//!
//! Change callbacks are held weakly: the store never keeps a subscriber
//! alive, and a callback whose last strong reference is dropped silently
//! stops firing. [`Subscription`] packages that as an RAII guard.
//!
//! # Example
//!
//! ```
//! use prop_kit::ConfigStore;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let opts = ConfigStore::from_pairs([("hej", "foo"), ("med", "bar")]);
//! let fired = Arc::new(AtomicUsize::new(0));
//!
//! let counter = fired.clone();
//! let sub = opts.subscribe("med", move |_, _| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! opts.set("med", "far");
//! opts.set("med", "far"); // unchanged, no notification
//! drop(sub);
//! opts.set("med", "bar"); // unsubscribed
//!
//! assert_eq!(fired.load(Ordering::SeqCst), 1);
//! ```

use crate::error::{Error, Result};
use crate::value::Value;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

/// Change callback, invoked as `callback(key, new_value)`.
pub type Callback = dyn Fn(&str, &Value) + Send + Sync;

#[derive(Default)]
struct StoreInner {
    values: RwLock<IndexMap<String, Value>>,
    callbacks: DashMap<String, Vec<Weak<Callback>>>,
}

/// Ordered key/value option store.
#[derive(Clone, Default)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from ordered pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<IndexMap<_, _>>();
        ConfigStore {
            inner: Arc::new(StoreInner {
                values: RwLock::new(values),
                callbacks: DashMap::new(),
            }),
        }
    }

    /// Load a store from a JSON object.
    ///
    /// # Errors
    ///
    /// - `Error::Json`: the input is not valid JSON
    /// - `Error::ConfigError`: the root is not an object
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Map(map) => Ok(Self::from_pairs(map)),
            other => Err(Error::ConfigError(format!(
                "option root must be an object, got {}",
                other.type_tag()
            ))),
        }
    }

    /// Serialize the current contents as a JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.inner.values.read())?)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.values.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.values.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.values.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.read().is_empty()
    }

    /// Store `value` under `key`.
    ///
    /// Subscribers of `key` are notified when the stored value actually
    /// changes, including when the key was previously absent. Ints and
    /// floats compare numerically, so replacing `1` with `1.0` stores the
    /// float without notifying anyone. Callbacks run
    /// synchronously after the store's locks are released, so they may read
    /// the store.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        let changed = {
            let mut values = self.inner.values.write();
            match values.get_mut(&key) {
                Some(current) => {
                    let changed = !current.equivalent(&value);
                    *current = value.clone();
                    changed
                }
                None => {
                    values.insert(key.clone(), value.clone());
                    true
                }
            }
        };

        if changed {
            self.trigger_callbacks(&key, &value);
        }
    }

    fn trigger_callbacks(&self, key: &str, value: &Value) {
        let live: Vec<Arc<Callback>> = match self.inner.callbacks.get_mut(key) {
            Some(mut subscribers) => {
                subscribers.retain(|weak| weak.strong_count() > 0);
                subscribers.iter().filter_map(Weak::upgrade).collect()
            }
            None => return,
        };

        trace!("Option {} changed, notifying {} subscriber(s)", key, live.len());
        for callback in live {
            callback(key, value);
        }
    }

    /// Register a weakly held callback on `key`.
    ///
    /// The same callback may be registered on many keys; registering it
    /// twice on one key is a no-op. The key does not need to exist yet.
    pub fn set_callback(&self, key: impl Into<String>, callback: &Arc<Callback>) {
        let weak = Arc::downgrade(callback);
        let mut subscribers = self.inner.callbacks.entry(key.into()).or_default();
        subscribers.retain(|w| w.strong_count() > 0);
        if !subscribers.iter().any(|w| w.ptr_eq(&weak)) {
            subscribers.push(weak);
        }
    }

    /// Register `callback` on `key` for as long as the returned guard lives.
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let key = key.into();
        let callback: Arc<Callback> = Arc::new(callback);
        self.set_callback(key.clone(), &callback);
        Subscription {
            key,
            _callback: callback,
        }
    }

    /// Number of callbacks on `key` that are still alive.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .callbacks
            .get(key)
            .map(|subs| subs.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Independent store with the same contents and no subscribers.
    pub fn deep_copy(&self) -> ConfigStore {
        Self::from_pairs(self.inner.values.read().clone())
    }

    /// Set each pair whose key is already present; other keys are ignored.
    pub fn update_if_present<I, K, V>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in pairs {
            let key = key.into();
            if self.contains(&key) {
                self.set(key, value);
            }
        }
    }

    /// Override present keys from environment variables.
    ///
    /// Key `med` with prefix `APP` is read from `APP_MED` (`MED` when the
    /// prefix is empty). The text is parsed as the type of the current value.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if a variable cannot be read as the type
    /// of the value it replaces. Keys before the failing one stay updated.
    pub fn update_from_env(&self, prefix: &str) -> Result<usize> {
        let mut updated = 0;
        for key in self.keys() {
            let var = if prefix.is_empty() {
                key.to_uppercase()
            } else {
                format!("{}_{}", prefix, key).to_uppercase()
            };

            let Ok(raw) = std::env::var(&var) else {
                continue;
            };
            let Some(current) = self.get(&key) else {
                continue;
            };

            let value = current.coerce_like(&raw)?;
            debug!("Option {} overridden from ${}", key, var);
            self.set(key, value);
            updated += 1;
        }
        Ok(updated)
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.values.read().iter()).finish()
    }
}

/// Keeps a callback registered; dropping it unsubscribes.
pub struct Subscription {
    key: String,
    _callback: Arc<Callback>,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Unsubscribe now.
    pub fn cancel(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
