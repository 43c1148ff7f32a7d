//! Caching of compiled schemas.
//!
//! Concurrent requests for the same key share one build: the first caller
//! runs the resolver, later callers block until it finishes. A failed build
//! is delivered to every caller that waited for it and is not cached.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::IonSchemaError;
use crate::schema::Schema;

/// Builds the schema for a key that is not cached yet.
pub type Resolver<'a, T = Schema> = dyn FnMut() -> Result<Arc<T>, IonSchemaError> + 'a;

/// Storage for compiled schemas, keyed by schema id.
pub trait SchemaCache: Send + Sync {
    /// Returns the cached schema for `key`, calling `resolver` to build it if
    /// needed. At most one resolver runs per key at any time.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error. Callers that waited on another caller's
    /// failed build get `IonSchemaError::SharedFailure`.
    fn get_or_put(
        &self,
        key: &str,
        resolver: &mut Resolver<'_>,
    ) -> Result<Arc<Schema>, IonSchemaError>;

    /// Returns the schema for `key` if one has been built.
    fn get(&self, key: &str) -> Option<Arc<Schema>>;

    /// Removes `key` from the cache. Does nothing if it is absent.
    fn invalidate(&self, key: &str);
}

enum Outcome<T> {
    Ready(Arc<T>),
    Failed(Arc<IonSchemaError>),
}

struct BuildState<T> {
    outcome: Option<Outcome<T>>,
    waiters: usize,
}

/// One in-flight resolver run.
struct Build<T> {
    state: Mutex<BuildState<T>>,
    done: Condvar,
}

impl<T> Build<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(BuildState {
                outcome: None,
                waiters: 0,
            }),
            done: Condvar::new(),
        }
    }

    fn wait(&self, key: &str) -> Result<Arc<T>, IonSchemaError> {
        let mut state = self.state.lock();
        loop {
            match &state.outcome {
                Some(Outcome::Ready(value)) => return Ok(Arc::clone(value)),
                Some(Outcome::Failed(source)) => {
                    return Err(IonSchemaError::SharedFailure {
                        key: key.to_string(),
                        source: Arc::clone(source),
                    })
                }
                None => self.done.wait(&mut state),
            }
        }
    }
}

enum Slot<T> {
    Ready(Arc<T>),
    Building(Arc<Build<T>>),
}

/// The default [`SchemaCache`], an unbounded map of per-key slots.
pub struct DefaultSchemaCache<T = Schema> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> Default for DefaultSchemaCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> DefaultSchemaCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`SchemaCache::get_or_put`].
    pub fn get_or_build(
        &self,
        key: &str,
        resolver: &mut Resolver<'_, T>,
    ) -> Result<Arc<T>, IonSchemaError> {
        let build = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(Slot::Ready(value)) => {
                    tracing::debug!(key, "schema cache hit");
                    return Ok(Arc::clone(value));
                }
                Some(Slot::Building(build)) => {
                    // Registered while the map is locked so the builder
                    // counts every caller that could have seen its slot.
                    let build = Arc::clone(build);
                    build.state.lock().waiters += 1;
                    drop(slots);
                    tracing::debug!(key, "waiting for schema build");
                    return build.wait(key);
                }
                None => {
                    let build = Arc::new(Build::new());
                    slots.insert(key.to_string(), Slot::Building(Arc::clone(&build)));
                    build
                }
            }
        };

        tracing::debug!(key, "schema cache miss");
        let mut guard = PublishGuard {
            cache: self,
            key,
            build,
            published: false,
        };
        let result = resolver();
        guard.publish(result)
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn invalidate(&self, key: &str) {
        if self.slots.lock().remove(key).is_some() {
            tracing::debug!(key, "schema cache entry invalidated");
        }
    }

    /// Number of built entries.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Completes a build, including when the resolver panics.
struct PublishGuard<'c, 'k, T> {
    cache: &'c DefaultSchemaCache<T>,
    key: &'k str,
    build: Arc<Build<T>>,
    published: bool,
}

impl<T> PublishGuard<'_, '_, T> {
    fn publish(
        &mut self,
        result: Result<Arc<T>, IonSchemaError>,
    ) -> Result<Arc<T>, IonSchemaError> {
        self.published = true;
        {
            let mut slots = self.cache.slots.lock();
            let owned = matches!(
                slots.get(self.key),
                Some(Slot::Building(build)) if Arc::ptr_eq(build, &self.build)
            );
            if owned {
                match &result {
                    Ok(value) => {
                        slots.insert(self.key.to_string(), Slot::Ready(Arc::clone(value)));
                    }
                    Err(_) => {
                        slots.remove(self.key);
                    }
                }
            }
        }

        let mut state = self.build.state.lock();
        let result = match result {
            Ok(value) => {
                state.outcome = Some(Outcome::Ready(Arc::clone(&value)));
                Ok(value)
            }
            Err(e) if state.waiters == 0 => Err(e),
            Err(e) => {
                let source = Arc::new(e);
                state.outcome = Some(Outcome::Failed(Arc::clone(&source)));
                Err(IonSchemaError::SharedFailure {
                    key: self.key.to_string(),
                    source,
                })
            }
        };
        drop(state);
        self.build.done.notify_all();
        result
    }
}

impl<T> Drop for PublishGuard<'_, '_, T> {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        {
            let mut slots = self.cache.slots.lock();
            if matches!(
                slots.get(self.key),
                Some(Slot::Building(build)) if Arc::ptr_eq(build, &self.build)
            ) {
                slots.remove(self.key);
            }
        }
        let failure = IonSchemaError::invalid(format!("building schema '{}' panicked", self.key));
        self.build.state.lock().outcome = Some(Outcome::Failed(Arc::new(failure)));
        self.build.done.notify_all();
    }
}

impl SchemaCache for DefaultSchemaCache<Schema> {
    fn get_or_put(
        &self,
        key: &str,
        resolver: &mut Resolver<'_>,
    ) -> Result<Arc<Schema>, IonSchemaError> {
        self.get_or_build(key, resolver)
    }

    fn get(&self, key: &str) -> Option<Arc<Schema>> {
        DefaultSchemaCache::get(self, key)
    }

    fn invalidate(&self, key: &str) {
        DefaultSchemaCache::invalidate(self, key)
    }
}
