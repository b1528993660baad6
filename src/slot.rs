// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-key value container.
//!
//! A [`Slot`] pairs a value with its own reader/writer lock. Readers share
//! the lock; a writer (immediate or deferred) holds it exclusively, so a
//! reader never observes anything but the initial `None` or the last
//! committed value. Commits are a single assignment made under the
//! exclusive lock.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::status::Generation;

/// Returned by [`Slot::try_read`] while a writer holds the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("slot from generation {generation} is held by an in-flight writer")]
pub struct SlotBusy {
    generation: Generation,
}

impl SlotBusy {
    /// Generation of the busy slot.
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// The unit of synchronization for a single key within one generation.
///
/// Slots are handed out as `Arc<Slot<V>>`. A slot stays fully functional
/// after its generation is retired; it is simply no longer reachable
/// through the store.
pub struct Slot<V> {
    generation: Generation,
    value: Arc<RwLock<Option<V>>>,
}

impl<V> Slot<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(generation: Generation) -> Self {
        Self {
            generation,
            value: Arc::new(RwLock::new(None)),
        }
    }

    /// Generation in which this slot was created.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Read the committed value, waiting while a writer holds the slot.
    pub async fn read(&self) -> Option<V> {
        self.value.read().await.clone()
    }

    /// Blocking variant of [`read`](Self::read) for threads outside the
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_read(&self) -> Option<V> {
        self.value.blocking_read().clone()
    }

    /// Read the committed value without waiting.
    pub fn try_read(&self) -> Result<Option<V>, SlotBusy> {
        self.value
            .try_read()
            .map(|guard| guard.clone())
            .map_err(|_| SlotBusy {
                generation: self.generation,
            })
    }

    /// Assign `value` immediately, waiting for any in-flight writer first.
    pub async fn write(&self, value: V) {
        *self.value.write().await = Some(value);
    }

    /// Blocking variant of [`write`](Self::write).
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_write(&self, value: V) {
        *self.value.blocking_write() = Some(value);
    }

    /// Take exclusive write access without assigning a value.
    ///
    /// Readers block until the returned hold is committed, released, or
    /// dropped.
    pub async fn acquire_for_deferred_write(&self) -> SlotWriteHold<V> {
        let guard = Arc::clone(&self.value).write_owned().await;
        SlotWriteHold {
            generation: self.generation,
            guard,
        }
    }
}

impl<V> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`Slot`], detached from the caller's stack.
///
/// Dropping the hold releases the slot without assigning.
#[must_use = "readers of the slot stay blocked until the hold is resolved"]
pub struct SlotWriteHold<V> {
    generation: Generation,
    guard: OwnedRwLockWriteGuard<Option<V>>,
}

impl<V> SlotWriteHold<V> {
    /// Generation of the held slot.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Assign `value`, then release the slot.
    pub fn commit(mut self, value: V) {
        *self.guard = Some(value);
    }

    /// Release the slot, keeping whatever value it held before.
    pub fn release(self) {}
}

impl<V> fmt::Debug for SlotWriteHold<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotWriteHold")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
