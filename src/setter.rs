// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Deferred setters.
//!
//! A reservation takes a slot's exclusive hold up front and hands it to a
//! coordination task. The task resolves the hold exactly once, on whichever
//! of these it observes first:
//!
//! - a value arriving through [`DeferredSetter::deliver`] (commit),
//! - the caller's cancellation token or the store's shutdown token,
//! - the configured deadline,
//! - every setter handle being dropped without a delivery.
//!
//! Delivery is gated by an atomic `PENDING -> DELIVERED | CANCELLED`
//! transition, so at most one value ever reaches the task no matter how many
//! callers race on `deliver`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::Mutex as ParkingMutex;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::slot::SlotWriteHold;
use crate::status::{Generation, Resolution};

const PENDING: u8 = 0;
const DELIVERED: u8 = 1;
const CANCELLED: u8 = 2;

/// Single-use flag for one reservation.
#[derive(Debug)]
struct ReservationState(AtomicU8);

impl ReservationState {
    fn new() -> Self {
        Self(AtomicU8::new(PENDING))
    }

    /// Move out of `PENDING`; only the first caller succeeds.
    fn claim(&self, next: u8) -> bool {
        self.0
            .compare_exchange(PENDING, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire) == PENDING
    }
}

struct SetterInner<V> {
    key: Arc<str>,
    generation: Generation,
    state: Arc<ReservationState>,
    sender: ParkingMutex<Option<oneshot::Sender<V>>>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

/// One-shot handle that supplies the value for a reserved slot.
///
/// Clones share the same reservation. Dropping every clone without a
/// delivery releases the slot unchanged.
///
/// Holding a setter that is never delivered, with a token that never fires
/// and no configured deadline, keeps the slot locked for as long as the
/// setter lives. Callers must guarantee one of the resolution paths.
pub struct DeferredSetter<V> {
    inner: Arc<SetterInner<V>>,
    resolution: watch::Receiver<Option<Resolution>>,
}

impl<V> Clone for DeferredSetter<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            resolution: self.resolution.clone(),
        }
    }
}

impl<V> DeferredSetter<V>
where
    V: Send + Sync + 'static,
{
    /// Hand `value` to the coordination task.
    ///
    /// Returns `true` only for the single call that claims the reservation.
    /// Later calls, losers of a concurrent race, and calls made after the
    /// cancellation token fired return `false` and drop `value`. A `true`
    /// return means the value was handed off; [`resolved`](Self::resolved)
    /// reports whether it was committed.
    pub fn deliver(&self, value: V) -> bool {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() || inner.shutdown.is_cancelled() {
            inner.state.claim(CANCELLED);
            return false;
        }
        if !inner.state.claim(DELIVERED) {
            return false;
        }
        let Some(sender) = inner.sender.lock().take() else {
            return false;
        };
        sender.send(value).is_ok()
    }

    /// Key this setter was reserved for.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Generation of the reserved slot.
    pub fn generation(&self) -> Generation {
        self.inner.generation
    }

    /// True until a delivery is claimed or a cancellation is observed.
    pub fn is_pending(&self) -> bool {
        self.inner.state.is_pending()
    }

    /// True once the coordination task released the slot.
    pub fn is_resolved(&self) -> bool {
        self.resolution.borrow().is_some()
    }

    /// Wait for the coordination task to release the slot.
    pub async fn resolved(&self) -> Resolution {
        let mut resolution = self.resolution.clone();
        match resolution.wait_for(Option::is_some).await {
            Ok(observed) => (*observed).unwrap_or(Resolution::Abandoned),
            Err(_) => Resolution::Abandoned,
        }
    }
}

impl<V> fmt::Debug for DeferredSetter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredSetter")
            .field("key", &self.inner.key)
            .field("generation", &self.inner.generation)
            .field("resolution", &*self.resolution.borrow())
            .finish()
    }
}

/// Parameters for a single reservation.
pub(crate) struct Reservation<V> {
    pub(crate) key: Arc<str>,
    pub(crate) hold: SlotWriteHold<V>,
    pub(crate) cancel: CancellationToken,
    pub(crate) shutdown: CancellationToken,
    pub(crate) deadline: Option<Duration>,
}

impl<V> Reservation<V>
where
    V: Send + Sync + 'static,
{
    /// Start the coordination task and return the caller's setter.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(self, tasks: &TaskTracker) -> DeferredSetter<V> {
        let Reservation {
            key,
            hold,
            cancel,
            shutdown,
            deadline,
        } = self;

        let generation = hold.generation();
        let state = Arc::new(ReservationState::new());
        let (value_tx, value_rx) = oneshot::channel();
        let (resolved_tx, resolved_rx) = watch::channel(None);

        trace!(%key, generation, "deferred setter reserved");

        let task_key = Arc::clone(&key);
        let task_state = Arc::clone(&state);
        let task_cancel = cancel.clone();
        let task_shutdown = shutdown.clone();
        tasks.spawn(async move {
            let resolution = tokio::select! {
                biased;
                delivered = value_rx => match delivered {
                    Ok(value) => {
                        hold.commit(value);
                        Resolution::Committed
                    }
                    Err(_) => {
                        hold.release();
                        Resolution::Abandoned
                    }
                },
                _ = task_cancel.cancelled() => {
                    task_state.claim(CANCELLED);
                    hold.release();
                    Resolution::Cancelled
                }
                _ = task_shutdown.cancelled() => {
                    task_state.claim(CANCELLED);
                    hold.release();
                    Resolution::Cancelled
                }
                _ = expire(deadline) => {
                    task_state.claim(CANCELLED);
                    hold.release();
                    Resolution::TimedOut
                }
            };

            match resolution {
                Resolution::Committed => {
                    trace!(key = %task_key, generation, "deferred setter committed")
                }
                other => debug!(
                    key = %task_key,
                    generation,
                    resolution = %other,
                    "deferred setter released without a value"
                ),
            }
            resolved_tx.send_replace(Some(resolution));
        });

        DeferredSetter {
            inner: Arc::new(SetterInner {
                key,
                generation,
                state,
                sender: ParkingMutex::new(Some(value_tx)),
                cancel,
                shutdown,
            }),
            resolution: resolved_rx,
        }
    }
}

async fn expire(deadline: Option<Duration>) {
    match deadline {
        Some(deadline) => tokio::time::sleep(deadline).await,
        None => std::future::pending().await,
    }
}
