//! Serializer cache.
//!
//! Memoizes [`CompiledSchema`]s by schema key and row type. Reads are
//! lock-free loads of a copy-on-write map; inserts swap in a new map.
//!
//! Two tasks missing on the same key may both compile, but only the first
//! insert is kept and every caller gets that instance back. Entries are
//! never evicted, which suits a bounded set of `(table, columns)` pairs.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use crate::error::{Error, Result};
use crate::observability::{self, TARGET};
use crate::schema::{CompiledSchema, SchemaKey};

type ErasedSchema = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    row_type: TypeId,
    row_type_name: &'static str,
    schema: ErasedSchema,
}

type Entries = HashMap<SchemaKey, Vec<Entry>>;

fn lookup(entries: &Entries, key: &SchemaKey, row_type: TypeId) -> Option<ErasedSchema> {
    entries
        .get(key)?
        .iter()
        .find(|entry| entry.row_type == row_type)
        .map(|entry| Arc::clone(&entry.schema))
}

/// Concurrent cache of compiled schemas.
pub struct SerializerCache {
    entries: ArcSwap<Entries>,
}

static GLOBAL: OnceLock<SerializerCache> = OnceLock::new();

impl SerializerCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Process-wide cache, created on first use.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Return the cached schema for `key` and `R`, compiling it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the compiler's error; failures are not cached.
    pub fn get_or_compile<R, F>(&self, key: &SchemaKey, compile: F) -> Result<Arc<CompiledSchema<R>>>
    where
        R: Send + Sync + 'static,
        F: FnOnce() -> Result<CompiledSchema<R>>,
    {
        let row_type = TypeId::of::<R>();
        if let Some(hit) = lookup(&self.entries.load(), key, row_type) {
            tracing::event!(target: TARGET, tracing::Level::DEBUG, cache.result = "hit", cache.key = %key);
            return downcast(key, hit);
        }

        tracing::event!(target: TARGET, tracing::Level::DEBUG, cache.result = "miss", cache.key = %key);
        let compiled: ErasedSchema = Arc::new(compile()?);
        observability::record_compilation();

        let mut retained = Arc::clone(&compiled);
        let mut adopted = false;
        self.entries.rcu(|current| {
            if let Some(existing) = lookup(current, key, row_type) {
                retained = existing;
                adopted = true;
                return Arc::clone(current);
            }
            let mut next = Entries::clone(current);
            next.entry(key.clone()).or_default().push(Entry {
                row_type,
                row_type_name: std::any::type_name::<R>(),
                schema: Arc::clone(&compiled),
            });
            retained = Arc::clone(&compiled);
            adopted = false;
            Arc::new(next)
        });

        if adopted {
            tracing::event!(
                target: TARGET,
                tracing::Level::DEBUG,
                cache.result = "adopted",
                cache.key = %key,
                "another task inserted this schema first"
            );
        }
        downcast(key, retained)
    }

    /// Returns true if a schema for `key` and `R` is cached.
    #[must_use]
    pub fn contains<R: 'static>(&self, key: &SchemaKey) -> bool {
        lookup(&self.entries.load(), key, TypeId::of::<R>()).is_some()
    }

    /// Number of cached schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().values().map(Vec::len).sum()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row type names cached under `key`.
    #[must_use]
    pub fn row_types(&self, key: &SchemaKey) -> Vec<&'static str> {
        self.entries
            .load()
            .get(key)
            .map(|entries| entries.iter().map(|e| e.row_type_name).collect())
            .unwrap_or_default()
    }
}

fn downcast<R>(key: &SchemaKey, schema: ErasedSchema) -> Result<Arc<CompiledSchema<R>>>
where
    R: Send + Sync + 'static,
{
    schema.downcast::<CompiledSchema<R>>().map_err(|_| {
        Error::row_type_mismatch(key, "a different row type", std::any::type_name::<R>())
    })
}

impl Default for SerializerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerializerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::schema::{Shape, compile};

    struct Row {
        id: u32,
    }

    struct OtherRow {
        id: u32,
    }

    fn row_shape() -> Shape<Row> {
        Shape::new().field("id", |r: &Row| &r.id)
    }

    fn key(table: &str, columns: &[&str]) -> SchemaKey {
        SchemaKey::new(table, columns.iter().copied()).unwrap()
    }

    #[test]
    fn test_hit_returns_same_instance() {
        let cache = SerializerCache::new();
        let k = key("t", &["id"]);
        let first = cache.get_or_compile(&k, || compile(&k, &row_shape())).unwrap();
        let second = cache
            .get_or_compile::<Row, _>(&k, || panic!("must not recompile"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains::<Row>(&k));
    }

    #[test]
    fn test_different_keys_miss() {
        let cache = SerializerCache::new();
        let calls = AtomicUsize::new(0);
        for k in [key("t", &["id"]), key("u", &["id"]), key("t", &["id", "id"])] {
            cache
                .get_or_compile(&k, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    compile(&k, &row_shape())
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_row_types_do_not_alias() {
        let cache = SerializerCache::new();
        let k = key("t", &["id"]);
        cache.get_or_compile(&k, || compile(&k, &row_shape())).unwrap();
        let other = cache
            .get_or_compile(&k, || {
                compile(&k, &Shape::new().field("id", |r: &OtherRow| &r.id))
            })
            .unwrap();
        assert_eq!(other.columns().len(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.row_types(&k).len(), 2);
    }

    #[test]
    fn test_failures_not_cached() {
        let cache = SerializerCache::new();
        let k = key("t", &["missing"]);
        assert!(cache.get_or_compile(&k, || compile(&k, &row_shape())).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_misses_converge() {
        let cache = Arc::new(SerializerCache::new());
        let k = key("t", &["id"]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let k = k.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_compile(&k, || compile(&k, &row_shape()))
                        .unwrap()
                })
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for schema in &schemas[1..] {
            assert!(Arc::ptr_eq(&schemas[0], schema));
        }
        assert_eq!(cache.len(), 1);
    }
}
