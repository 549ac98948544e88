// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Model the declared system topology consumed by rights resolution.
// Author: Lukas Bower

//! Immutable value types for the declared system: protection domains,
//! memory regions, channels, maps, and interrupt lines. The ordering of
//! every list is document order and is load-bearing: the positional slot
//! arithmetic in [`SystemDescription::page_cap_slot`] reconstructs the
//! capability-slot convention the consuming loader assumes.

/// A named span of physical memory that protection domains may map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Unique region name, the key maps refer to.
    pub name: String,
    /// Region size in bytes; need not be page-aligned.
    pub size: u64,
    /// Granule used for slot arithmetic; defaults to
    /// [`PAGE_SIZE`](crate::constants::PAGE_SIZE).
    pub page_size: u64,
}

impl MemoryRegion {
    /// Number of page capabilities the region occupies, rounding up.
    pub fn page_count(&self) -> u64 {
        ceil_div(self.size, self.page_size)
    }
}

/// One endpoint of a declared channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEnd {
    /// Name of the protection domain holding this end.
    pub pd: String,
    /// Channel identifier the domain uses for this end.
    pub id: u64,
}

/// A declared communication channel between two protection domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// First endpoint, in document order.
    pub end_a: ChannelEnd,
    /// Second endpoint.
    pub end_b: ChannelEnd,
}

/// A memory region mapped into a protection domain's address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    /// Name of the targeted memory region.
    pub mr: String,
    /// Virtual address of the mapping.
    pub vaddr: u64,
    /// Permission mask combining the `PERM_*` bits.
    pub perms: u8,
    /// Whether the mapping is cache-enabled.
    pub cached: bool,
}

/// A hardware interrupt line owned by a protection domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Irq {
    /// Hardware interrupt number.
    pub irq: u64,
    /// Channel identifier the owning domain receives notifications on.
    pub channel_id: u8,
}

/// An isolated execution context with its own scheduling parameters and
/// capability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionDomain {
    /// Unique identifier assigned by the document; fits one byte.
    pub pd_id: u8,
    /// Identifier of the enclosing domain; `None` for roots.
    pub parent_pd_id: Option<u8>,
    /// Domain name, the key rights requests refer to.
    pub name: String,
    /// Scheduling priority.
    pub priority: u8,
    /// Scheduling budget.
    pub budget: u64,
    /// Scheduling period; defaults to the budget when undeclared.
    pub period: u64,
    /// Mapped regions, in document order.
    pub maps: Vec<Map>,
    /// Owned interrupt lines, in document order.
    pub irqs: Vec<Irq>,
}

/// Positional capability slot resolved for a mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCapSlot {
    /// Slot index of the region's first page capability.
    pub index: u64,
    /// Size of the region in bytes.
    pub size: u64,
}

/// The whole declared system, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDescription {
    /// All protection domains, flattened in pre-order: each domain is
    /// immediately followed by its descendants.
    pub protection_domains: Vec<ProtectionDomain>,
    /// All declared memory regions.
    pub memory_regions: Vec<MemoryRegion>,
    /// All declared channels.
    pub channels: Vec<Channel>,
}

impl SystemDescription {
    /// Find a protection domain by name.
    pub fn find_pd(&self, name: &str) -> Option<&ProtectionDomain> {
        self.protection_domains.iter().find(|pd| pd.name == name)
    }

    /// Find a memory region by name.
    pub fn memory_region(&self, name: &str) -> Option<&MemoryRegion> {
        self.memory_regions.iter().find(|mr| mr.name == name)
    }

    /// Direct children of the domain with the given identifier.
    pub fn children_of(&self, pd_id: u8) -> impl Iterator<Item = &ProtectionDomain> {
        self.protection_domains
            .iter()
            .filter(move |pd| pd.parent_pd_id == Some(pd_id))
    }

    /// Resolve the capability slot of `region_name` within `pd`'s address
    /// space: the sum of the page counts of every map preceding the match,
    /// in document order. Returns `Ok(None)` when the domain does not map a
    /// region of that name, and an error naming the map whose region is
    /// undeclared.
    pub fn page_cap_slot(
        &self,
        pd: &ProtectionDomain,
        region_name: &str,
    ) -> Result<Option<PageCapSlot>, String> {
        let mut index = 0u64;
        for map in &pd.maps {
            let region = self
                .memory_region(&map.mr)
                .ok_or_else(|| format!("map references undeclared memory region '{}'", map.mr))?;
            if map.mr == region_name {
                return Ok(Some(PageCapSlot {
                    index,
                    size: region.size,
                }));
            }
            index += region.page_count();
        }
        Ok(None)
    }
}

/// Divide rounding up; slot arithmetic never rounds down.
pub fn ceil_div(value: u64, divisor: u64) -> u64 {
    value.div_ceil(divisor)
}
