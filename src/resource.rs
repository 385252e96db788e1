//! Process-wide shared resources and their lifecycle.
//!
//! The symbol interner and handler-internal caches are shared across all
//! documents in a batch. Rather than ambient globals, they live in an
//! explicit [`SharedResources`] value passed to every handler invocation,
//! so tests can construct isolated instances. The batch controller evicts
//! them between documents, never while a document session is mid-run, so
//! in-flight references are never invalidated.

use log::debug;
use std::collections::HashMap;

/// Interned string handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

/// String interner shared by all linguistic handlers in a process.
#[derive(Debug, Default)]
pub struct SymbolTable {
    ids: HashMap<String, u32>,
    strings: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&id) = self.ids.get(s) {
            return Symbol(id);
        }
        let id = self.strings.len() as u32;
        self.ids.insert(s.to_string(), id);
        self.strings.push(s.to_string());
        Symbol(id)
    }

    pub fn resolve(&self, symbol: Symbol) -> Option<&str> {
        self.strings.get(symbol.0 as usize).map(String::as_str)
    }

    /// Number of interned strings. The batch controller compares this
    /// against `max_symbol_table_size` to trigger eviction.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Drop all interned strings. Outstanding [`Symbol`] handles become
    /// dangling, which is why eviction only happens between documents.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.strings.clear();
    }
}

/// A memoizing cache owned by a stage handler that can release its entries
/// on request. Handlers register their caches so the batch controller can
/// evict them on its cleanup schedule.
pub trait EvictableCache: Send {
    /// A short name for logging.
    fn name(&self) -> &str;
    /// Release memoized entries.
    fn evict(&mut self);
}

/// The explicit process-wide state object handed to the orchestrator.
pub struct SharedResources {
    pub symbols: SymbolTable,
    caches: Vec<Box<dyn EvictableCache>>,
}

impl Default for SharedResources {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedResources {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            caches: Vec::new(),
        }
    }

    /// Register a handler-owned cache for scheduled eviction.
    pub fn register_cache(&mut self, cache: Box<dyn EvictableCache>) {
        self.caches.push(cache);
    }

    /// Evict every registered cache and the symbol table. Only ever called
    /// by the batch controller between documents.
    pub fn cleanup(&mut self) {
        for cache in &mut self.caches {
            debug!("evicting cache `{}`", cache.name());
            cache.evict();
        }
        debug!("clearing symbol table ({} entries)", self.symbols.len());
        self.symbols.clear();
    }
}

impl std::fmt::Debug for SharedResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResources")
            .field("symbols", &self.symbols.len())
            .field("caches", &self.caches.len())
            .finish()
    }
}
