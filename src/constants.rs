// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Centralize layout and limit constants for the capability table.
// Author: Lukas Bower

//! Every literal the slot arithmetic and wire layout depend on lives here so
//! the compiler and the consuming loader can be audited against one module.

/// Default granule used when a memory region declares no page size.
pub const PAGE_SIZE: u64 = 0x1000;

/// Permission bit set by an `x` character in a perms string.
pub const PERM_EXECUTE: u8 = 1;
/// Permission bit set by a `w` character in a perms string.
pub const PERM_WRITE: u8 = 2;
/// Permission bit set by an `r` character in a perms string.
pub const PERM_READ: u8 = 4;

/// Highest channel identifier a document may grant; 63 and up are reserved
/// for implementation use.
pub const MAX_CHANNEL_ID: u64 = 62;

/// Highest protection-domain identifier; records store domain ids in one
/// byte, so wider ids are a validation error rather than a truncation.
pub const MAX_PD_ID: u64 = 255;

/// Scheduling budget assumed when a protection domain declares none.
pub const DEFAULT_BUDGET: u64 = 1000;

/// Byte index of the 7-byte little-endian table-offset field inside the
/// image identification header.
pub const RIGHTS_OFFSET_FIELD_POS: u64 = 9;

/// Width of the table-offset field in bytes.
pub const RIGHTS_OFFSET_FIELD_LEN: usize = 7;

/// Largest table offset the 7-byte field can represent.
pub const MAX_TABLE_OFFSET: u64 = (1 << 56) - 1;

/// Minimum image length: the identification header must contain the whole
/// offset field.
pub const MIN_IMAGE_LEN: u64 = RIGHTS_OFFSET_FIELD_POS + RIGHTS_OFFSET_FIELD_LEN as u64;
