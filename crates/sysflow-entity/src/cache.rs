//! Parsed schemas and compiled programs, memoized by schema fingerprint.

use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use log::debug;
use parking_lot::RwLock;
use sysflow_avro::{compile, Fingerprint, Program, Result, Schema, SchemaError};

type ProgramKey = (Fingerprint, Fingerprint);

/// Memoizes schema parsing and compilation.
///
/// Keys are the fingerprints of the schema *texts*, so two spellings of the
/// same schema are cached separately. Compilation is deterministic, so racing
/// threads that compile the same pair produce equal programs and the first
/// insert wins.
///
/// Each map holds at most `capacity` entries; inserting past that evicts the
/// oldest entry. Evicted programs stay alive for as long as a caller holds
/// their `Arc`.
pub struct ProgramCache {
    capacity: usize,
    schemas: RwLock<IndexMap<Fingerprint, Arc<Schema>>>,
    programs: RwLock<IndexMap<ProgramKey, Arc<Program>>>,
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl ProgramCache {
    /// Capacity of [`ProgramCache::new`] and of the global cache.
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` schemas and `capacity` programs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            schemas: RwLock::new(IndexMap::new()),
            programs: RwLock::new(IndexMap::new()),
        }
    }

    /// Process-wide cache used by the entity constructors.
    pub fn global() -> &'static ProgramCache {
        static CACHE: OnceLock<ProgramCache> = OnceLock::new();
        CACHE.get_or_init(ProgramCache::new)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn schema(&self, text: &str) -> std::result::Result<Arc<Schema>, SchemaError> {
        let key = Fingerprint::of(text.as_bytes());
        if let Some(schema) = self.schemas.read().get(&key) {
            return Ok(schema.clone());
        }
        let schema = Arc::new(Schema::parse(text)?);
        Ok(insert_bounded(&mut self.schemas.write(), self.capacity, key, schema))
    }

    /// The program reading `writer` data into the `reader` shape.
    pub fn program(&self, writer: &str, reader: &str) -> Result<Arc<Program>> {
        let key = (
            Fingerprint::of(writer.as_bytes()),
            Fingerprint::of(reader.as_bytes()),
        );
        if let Some(program) = self.programs.read().get(&key) {
            return Ok(program.clone());
        }
        let program = Arc::new(compile(&*self.schema(writer)?, &*self.schema(reader)?)?);
        debug!("cached program {} -> {}", key.0, key.1);
        Ok(insert_bounded(&mut self.programs.write(), self.capacity, key, program))
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.programs.write().clear();
        self.schemas.write().clear();
    }
}

/// Inserts unless `key` is already present, evicting the oldest entry when full.
fn insert_bounded<K: Hash + Eq, V>(
    map: &mut IndexMap<K, Arc<V>>,
    capacity: usize,
    key: K,
    value: Arc<V>,
) -> Arc<V> {
    if let Some(existing) = map.get(&key) {
        return existing.clone();
    }
    if map.len() >= capacity {
        map.shift_remove_index(0);
        debug!("program cache full at {capacity} entries, evicted the oldest");
    }
    map.insert(key, value.clone());
    value
}
