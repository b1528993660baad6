// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Generation-scoped key/value store with deferred, cancellable setters.
//!
//! # Overview
//!
//! - [`Store`] — maps keys to [`Slot`]s for the current generation;
//!   [`Store::reset_generation`] swaps in an empty mapping in O(1)
//! - [`Slot`] — per-key value guarded by its own reader/writer lock
//! - [`DeferredSetter`] — one-shot handle returned by
//!   [`Store::reserve_setter`]; the slot stays exclusively held, and
//!   readers wait, until a value is delivered or the reservation is
//!   cancelled
//! - [`StoreConfig`] — figment-backed tuning (setter deadline, map capacity)
//!
//! ```rust,ignore
//! let store = Store::new();
//! let setter = store.reserve_setter("model", CancellationToken::new()).await;
//! // readers of "model" now wait
//! setter.deliver(load_model().await);
//! assert!(store.get("model").await.is_some());
//! ```

mod config;
mod setter;
mod slot;
mod status;
mod store;

// ── Re-exports ───────────────────────────────────────────────────────

pub use config::{CONFIG_PATH_ENV, ConfigError, ENV_PREFIX, StoreConfig};
pub use setter::DeferredSetter;
pub use slot::{Slot, SlotBusy, SlotWriteHold};
pub use status::{Generation, Resolution};
pub use store::Store;
pub use tokio_util::sync::CancellationToken;
