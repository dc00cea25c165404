//! Per-command callback registry with a compiled-chain cache.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::callbacks::chain::{AsyncAround, CallbackTarget, ChainKey, CompiledChain, Proceed};
use crate::callbacks::entry::{Callback, CallbackEntry, CallbackId, Flow};
use crate::error::ConfigurationError;

type Slot<T> = Arc<OnceCell<Arc<CompiledChain<T>>>>;

/// Counters describing the compiled-chain cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered by an already compiled chain.
    pub hits: u64,
    /// Lookups that found no compiled chain.
    pub misses: u64,
    /// Chains actually compiled. At most one per key between invalidations.
    pub compilations: u64,
    /// Cached chains discarded by later registrations.
    pub invalidations: u64,
    pub cached_chains: usize,
}

/// Callbacks registered for one command type.
///
/// Chains are compiled lazily per [`ChainKey`] and cached. Concurrent
/// lookups of a cold key compile it once; the other callers wait for that
/// compilation and share its result. Registering a callback discards only
/// the cached chains it could appear in.
pub struct CallbackRegistry<T> {
    callbacks: RwLock<Vec<Arc<Callback<T>>>>,
    cache: RwLock<HashMap<ChainKey, Slot<T>>>,
    next_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    invalidations: AtomicU64,
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compilations: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }
}

impl<T: CallbackTarget> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback.
    ///
    /// Fails if the transition name is unknown, or if a state filter names a
    /// state the transition can never start from or end in.
    pub fn register(&self, entry: CallbackEntry<T>) -> Result<CallbackId, ConfigurationError> {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let callback = Arc::new(entry.resolve(id)?);

        let mut callbacks = self.callbacks.write();
        callbacks.push(callback.clone());

        let mut cache = self.cache.write();
        let cached = cache.len();
        cache.retain(|key, _| !callback.matches(key.transition, key.from, key.to));
        let invalidated = cached - cache.len();
        self.invalidations
            .fetch_add(invalidated as u64, Ordering::Relaxed);

        tracing::debug!(
            component = module_path!(),
            op = "register_callback",
            callback = %callback.label(),
            transition = %callback.transition,
            priority = callback.priority,
            invalidated,
        );
        Ok(id)
    }

    pub fn register_before<F>(
        &self,
        transition: impl AsRef<str>,
        f: F,
    ) -> Result<CallbackId, ConfigurationError>
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.register(CallbackEntry::before(transition, f))
    }

    pub fn register_after<F>(
        &self,
        transition: impl AsRef<str>,
        f: F,
    ) -> Result<CallbackId, ConfigurationError>
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.register(CallbackEntry::after(transition, f))
    }

    pub fn register_around<F>(
        &self,
        transition: impl AsRef<str>,
        f: F,
    ) -> Result<CallbackId, ConfigurationError>
    where
        F: Fn(&mut T, Proceed<'_, T>) -> Flow + Send + Sync + 'static,
    {
        self.register(CallbackEntry::around(transition, f))
    }

    pub fn register_around_async<A>(
        &self,
        transition: impl AsRef<str>,
        around: A,
    ) -> Result<CallbackId, ConfigurationError>
    where
        A: AsyncAround<T> + 'static,
    {
        self.register(CallbackEntry::around_async(transition, around))
    }

    /// Returns the compiled chain for `key`, compiling it on first use.
    pub fn chain(&self, key: ChainKey) -> Arc<CompiledChain<T>> {
        let slot = self.slot(key);
        if let Some(chain) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return chain.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        slot.get_or_init(|| {
            self.compilations.fetch_add(1, Ordering::Relaxed);
            let callbacks = self.callbacks.read();
            let chain = CompiledChain::compile(key, &callbacks);
            tracing::debug!(
                component = module_path!(),
                op = "compile_chain",
                key = %key,
                callbacks = chain.len(),
            );
            Arc::new(chain)
        })
        .clone()
    }

    fn slot(&self, key: ChainKey) -> Slot<T> {
        if let Some(slot) = self.cache.read().get(&key) {
            return slot.clone();
        }
        self.cache.write().entry(key).or_default().clone()
    }
}

impl<T> CallbackRegistry<T> {
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            cached_chains: self.cache.read().len(),
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Discards every compiled chain. Registered callbacks are kept.
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        self.invalidations
            .fetch_add(cache.len() as u64, Ordering::Relaxed);
        cache.clear();
    }
}

impl<T> fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
