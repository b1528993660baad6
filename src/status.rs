// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Generation counters and reservation outcomes shared across the store.

use std::fmt::{self, Display, Formatter};

/// Alias for store generation counters.
pub type Generation = u64;

/// How a deferred setter's exclusive hold was resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// A delivered value was assigned to the slot before the hold was released.
    Committed,
    /// The caller's token (or the store's shutdown token) fired first; the
    /// slot keeps its previous value.
    Cancelled,
    /// The configured setter deadline elapsed before a value arrived.
    TimedOut,
    /// Every handle to the setter was dropped without delivering a value.
    Abandoned,
}

impl Resolution {
    /// True when the reservation assigned a value.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Committed => "committed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed out",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_committed_assigns() {
        assert!(Resolution::Committed.is_committed());
        assert!(!Resolution::Cancelled.is_committed());
        assert!(!Resolution::TimedOut.is_committed());
        assert!(!Resolution::Abandoned.is_committed());
    }

    #[test]
    fn display_names() {
        assert_eq!(Resolution::TimedOut.to_string(), "timed out");
        assert_eq!(format!("{}", Resolution::Abandoned), "abandoned");
    }
}
