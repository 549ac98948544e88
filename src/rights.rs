// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Model granted access rights and their validation predicates.
// Author: Lukas Bower

//! The closed set of authorities the compiler can grant. One record grants
//! one authority; records are built for a single loader domain, encoded,
//! and discarded. Field widths match the wire layout, so a record that
//! exists is already in range — the predicates here are the single place
//! both resolver entry points (document-driven and interactive) enforce the
//! bounds before construction.

use crate::constants::{MAX_CHANNEL_ID, PERM_EXECUTE, PERM_READ, PERM_WRITE};
use crate::sysdesc::ProtectionDomain;

/// One granted authority, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRight {
    /// Scheduling parameters for the loaded program.
    Scheduling {
        /// Granted priority; never exceeds the loader's own.
        priority: u8,
        /// Granted budget.
        budget: u64,
        /// Granted period; at least the budget.
        period: u64,
    },
    /// A channel endpoint toward a domain in the loader's subtree.
    Channel {
        /// Identifier of the targeted protection domain.
        target_pd_id: u8,
        /// Channel identifier the targeted domain uses.
        target_pd_channel_id: u8,
        /// Channel identifier the loaded program uses.
        own_channel_id: u8,
    },
    /// A mapping of one of the loader's memory regions.
    MemoryRegion {
        /// Slot index of the region's first page capability.
        page_cap_index: u64,
        /// Virtual address for the new mapping.
        vaddr: u64,
        /// Region size in bytes.
        size: u64,
        /// Permission mask combining the `PERM_*` bits.
        perms: u8,
        /// Whether the mapping is cache-enabled.
        cached: bool,
    },
    /// Delivery of one of the loader's interrupt lines.
    Irq {
        /// Channel identifier the loader receives the interrupt on.
        parent_irq_channel_id: u8,
        /// Channel identifier the loaded program receives it on.
        own_irq_channel_id: u8,
    },
}

/// Whether a channel identifier lies inside the grantable range [0, 62].
pub fn channel_id_in_range(value: u64) -> bool {
    value <= MAX_CHANNEL_ID
}

/// Whether a granted priority stays within the loader's own priority.
pub fn within_loader_priority(loader: &ProtectionDomain, priority: u64) -> bool {
    priority <= loader.priority as u64
}

/// Whether a scheduling period covers its budget.
pub fn period_covers_budget(budget: u64, period: u64) -> bool {
    period >= budget
}

/// Translate a permission string drawn from {r, w, x} into its bitmask.
/// Returns the first invalid character on failure.
pub fn perms_mask(text: &str) -> Result<u8, char> {
    let mut perms = 0u8;
    for ch in text.chars() {
        match ch {
            'r' => perms |= PERM_READ,
            'w' => perms |= PERM_WRITE,
            'x' => perms |= PERM_EXECUTE,
            other => return Err(other),
        }
    }
    Ok(perms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_ceiling_is_62() {
        assert!(channel_id_in_range(0));
        assert!(channel_id_in_range(62));
        assert!(!channel_id_in_range(63));
    }

    #[test]
    fn perms_mask_combines_bits() {
        assert_eq!(perms_mask("r"), Ok(PERM_READ));
        assert_eq!(perms_mask("rw"), Ok(PERM_READ | PERM_WRITE));
        assert_eq!(perms_mask("rwx"), Ok(PERM_READ | PERM_WRITE | PERM_EXECUTE));
        assert_eq!(perms_mask(""), Ok(0));
        assert_eq!(perms_mask("rz"), Err('z'));
    }

    #[test]
    fn period_must_cover_budget() {
        assert!(period_covers_budget(1000, 1000));
        assert!(period_covers_budget(1000, 2000));
        assert!(!period_covers_budget(1000, 999));
    }
}
