// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The generation-scoped store.
//!
//! Locking is two-level and always taken coarse-then-fine: the structural
//! lock guards the current generation's key mapping and is only held for a
//! lookup, an insert, or the generation swap. Value access then goes through
//! the resolved [`Slot`]'s own lock, after the structural lock is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock as ParkingRwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::config::{ConfigError, StoreConfig};
use crate::setter::{DeferredSetter, Reservation};
use crate::slot::Slot;
use crate::status::Generation;

/// Key mapping for a single generation.
struct GenerationMap<V> {
    id: Generation,
    slots: HashMap<String, Arc<Slot<V>>>,
}

impl<V> GenerationMap<V> {
    fn new(id: Generation, capacity: usize) -> Self {
        Self {
            id,
            slots: HashMap::with_capacity(capacity),
        }
    }
}

/// Concurrency-safe key/value store with whole-store generation resets and
/// deferred setters.
///
/// All operations are point lookups; there is no way to enumerate keys.
/// Independent `Store` instances share no state.
pub struct Store<V> {
    current: ParkingRwLock<GenerationMap<V>>,
    config: StoreConfig,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl<V> Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty store at generation 0 with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store at generation 0.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            current: ParkingRwLock::new(GenerationMap::new(0, config.initial_capacity)),
            config,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a store configured from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_config(StoreConfig::from_env()?))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Tracker owning every coordination task spawned by
    /// [`reserve_setter`](Self::reserve_setter).
    pub fn task_tracker(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Id of the current generation.
    pub fn generation(&self) -> Generation {
        self.current.read().id
    }

    // ── Structural operations ─────────────────────────────────────────

    /// Resolve `key` in the current generation without creating a slot.
    pub fn lookup(&self, key: &str) -> Option<Arc<Slot<V>>> {
        self.current.read().slots.get(key).cloned()
    }

    /// Resolve `key` in the current generation, creating its slot if absent.
    ///
    /// At most one slot is ever created per key and generation.
    pub fn get_or_create(&self, key: &str) -> Arc<Slot<V>> {
        if let Some(slot) = self.lookup(key) {
            return slot;
        }

        let mut current = self.current.write();
        let generation = current.id;
        let slot = current
            .slots
            .entry(key.to_owned())
            .or_insert_with(|| {
                trace!(key, generation, "slot created");
                Arc::new(Slot::new(generation))
            });
        Arc::clone(slot)
    }

    /// Retire the current generation and start an empty one.
    ///
    /// Slots from the retired generation keep working for anyone already
    /// holding them, including in-flight deferred setters; they are just no
    /// longer reachable through the store. Returns the new generation id.
    pub fn reset_generation(&self) -> Generation {
        let mut current = self.current.write();
        let next = current.id + 1;
        let retired = std::mem::replace(
            &mut *current,
            GenerationMap::new(next, self.config.initial_capacity),
        );
        drop(current);

        debug!(
            retired = retired.id,
            retired_keys = retired.slots.len(),
            generation = next,
            "generation reset"
        );
        next
    }

    // ── Value operations ──────────────────────────────────────────────

    /// Read the value for `key`, waiting while a writer holds its slot.
    ///
    /// Returns `None` when the key has no slot in the current generation or
    /// its slot has never been written.
    pub async fn get(&self, key: &str) -> Option<V> {
        let slot = self.lookup(key)?;
        slot.read().await
    }

    /// Blocking variant of [`get`](Self::get) for threads outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_get(&self, key: &str) -> Option<V> {
        self.lookup(key)?.blocking_read()
    }

    /// Assign `value` to `key`, waiting for any in-flight writer on that key.
    pub async fn set(&self, key: &str, value: V) {
        let slot = self.get_or_create(key);
        slot.write(value).await;
    }

    /// Blocking variant of [`set`](Self::set) for threads outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_set(&self, key: &str, value: V) {
        self.get_or_create(key).blocking_write(value);
    }

    /// Reserve the right to write `key` now and supply the value later.
    ///
    /// The slot's exclusive hold is taken before this returns, so any read
    /// of `key` issued afterwards waits until the setter resolves. If
    /// another writer currently holds the slot, this waits for it first.
    ///
    /// The reservation resolves on the first of: a delivery, `cancel`
    /// firing, [`shutdown`](Self::shutdown), the configured setter timeout,
    /// or every setter handle being dropped. A resolved reservation on a
    /// slot whose generation has since been reset still unblocks readers
    /// holding that slot, but is never visible through the store.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn reserve_setter(&self, key: &str, cancel: CancellationToken) -> DeferredSetter<V> {
        let slot = self.get_or_create(key);
        let hold = slot.acquire_for_deferred_write().await;

        Reservation {
            key: Arc::from(key),
            hold,
            cancel,
            shutdown: self.shutdown.clone(),
            deadline: self.config.setter_timeout(),
        }
        .spawn(&self.tasks)
    }

    /// Cancel every pending reservation and wait for their slots to be
    /// released.
    ///
    /// Reservations made afterwards resolve as cancelled immediately.
    pub async fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!(generation = self.generation(), "store shutdown");
        }
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

impl<V> Default for Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.read();
        f.debug_struct("Store")
            .field("generation", &current.id)
            .field("keys", &current.slots.len())
            .field("pending_setters", &self.tasks.len())
            .finish()
    }
}
