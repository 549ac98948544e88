// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode access-right records in their fixed wire layout.
// Author: Lukas Bower

//! Fixed-width little-endian codec for [`AccessRight`] records: one tag
//! byte followed by a tag-specific payload. Encoding is pure and total;
//! the field types of [`AccessRight`] guarantee every value fits its slot.

use crate::rights::AccessRight;

/// Wire tag of a scheduling record.
pub const TAG_SCHEDULING: u8 = 0;
/// Wire tag of a channel record.
pub const TAG_CHANNEL: u8 = 1;
/// Wire tag of a memory-region record.
pub const TAG_MEMORY_REGION: u8 = 2;
/// Wire tag of an irq record.
pub const TAG_IRQ: u8 = 3;

/// Decoding failures; encoding cannot fail.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input buffer was shorter than the record layout requires.
    #[error("truncated record")]
    Truncated,
    /// Encountered a tag outside the closed variant set.
    #[error("unknown record tag {0}")]
    UnknownTag(u8),
    /// A boolean field held something other than 0 or 1.
    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),
}

/// Encode one record into its wire representation.
pub fn encode(right: &AccessRight) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(right));
    match right {
        AccessRight::Scheduling {
            priority,
            budget,
            period,
        } => {
            out.push(TAG_SCHEDULING);
            out.push(*priority);
            out.extend_from_slice(&budget.to_le_bytes());
            out.extend_from_slice(&period.to_le_bytes());
        }
        AccessRight::Channel {
            target_pd_id,
            target_pd_channel_id,
            own_channel_id,
        } => {
            out.push(TAG_CHANNEL);
            out.push(*target_pd_id);
            out.push(*target_pd_channel_id);
            out.push(*own_channel_id);
        }
        AccessRight::MemoryRegion {
            page_cap_index,
            vaddr,
            size,
            perms,
            cached,
        } => {
            out.push(TAG_MEMORY_REGION);
            out.extend_from_slice(&page_cap_index.to_le_bytes());
            out.extend_from_slice(&vaddr.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.push(*perms);
            out.push(u8::from(*cached));
        }
        AccessRight::Irq {
            parent_irq_channel_id,
            own_irq_channel_id,
        } => {
            out.push(TAG_IRQ);
            out.push(*parent_irq_channel_id);
            out.push(*own_irq_channel_id);
        }
    }
    out
}

/// Byte length of one encoded record.
pub fn encoded_len(right: &AccessRight) -> usize {
    match right {
        AccessRight::Scheduling { .. } => 1 + 1 + 8 + 8,
        AccessRight::Channel { .. } => 1 + 1 + 1 + 1,
        AccessRight::MemoryRegion { .. } => 1 + 8 + 8 + 8 + 1 + 1,
        AccessRight::Irq { .. } => 1 + 1 + 1,
    }
}

/// Encode a whole table: an 8-byte little-endian record count followed by
/// the concatenated records.
pub fn encode_table(rights: &[AccessRight]) -> Vec<u8> {
    let body: usize = rights.iter().map(encoded_len).sum();
    let mut out = Vec::with_capacity(8 + body);
    out.extend_from_slice(&(rights.len() as u64).to_le_bytes());
    for right in rights {
        out.extend_from_slice(&encode(right));
    }
    out
}

/// Decode one record from the front of `bytes`, returning it together with
/// the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(AccessRight, usize), CodecError> {
    let (&tag, rest) = bytes.split_first().ok_or(CodecError::Truncated)?;
    match tag {
        TAG_SCHEDULING => {
            let (&priority, rest) = rest.split_first().ok_or(CodecError::Truncated)?;
            let budget = take_u64(rest, 0)?;
            let period = take_u64(rest, 8)?;
            Ok((
                AccessRight::Scheduling {
                    priority,
                    budget,
                    period,
                },
                18,
            ))
        }
        TAG_CHANNEL => {
            if rest.len() < 3 {
                return Err(CodecError::Truncated);
            }
            Ok((
                AccessRight::Channel {
                    target_pd_id: rest[0],
                    target_pd_channel_id: rest[1],
                    own_channel_id: rest[2],
                },
                4,
            ))
        }
        TAG_MEMORY_REGION => {
            if rest.len() < 26 {
                return Err(CodecError::Truncated);
            }
            let cached = match rest[25] {
                0 => false,
                1 => true,
                other => return Err(CodecError::InvalidBool(other)),
            };
            Ok((
                AccessRight::MemoryRegion {
                    page_cap_index: take_u64(rest, 0)?,
                    vaddr: take_u64(rest, 8)?,
                    size: take_u64(rest, 16)?,
                    perms: rest[24],
                    cached,
                },
                27,
            ))
        }
        TAG_IRQ => {
            if rest.len() < 2 {
                return Err(CodecError::Truncated);
            }
            Ok((
                AccessRight::Irq {
                    parent_irq_channel_id: rest[0],
                    own_irq_channel_id: rest[1],
                },
                3,
            ))
        }
        other => Err(CodecError::UnknownTag(other)),
    }
}

fn take_u64(bytes: &[u8], at: usize) -> Result<u64, CodecError> {
    let slice = bytes.get(at..at + 8).ok_or(CodecError::Truncated)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(slice);
    Ok(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduling_layout_is_stable() {
        let right = AccessRight::Scheduling {
            priority: 5,
            budget: 1000,
            period: 1000,
        };
        let bytes = encode(&right);
        assert_eq!(bytes.len(), 18);
        assert_eq!(bytes[0], TAG_SCHEDULING);
        assert_eq!(bytes[1], 5);
        assert_eq!(&bytes[2..10], &1000u64.to_le_bytes());
        assert_eq!(&bytes[10..18], &1000u64.to_le_bytes());
    }

    #[test]
    fn scheduling_round_trips() {
        let right = AccessRight::Scheduling {
            priority: 5,
            budget: 1000,
            period: 1000,
        };
        let bytes = encode(&right);
        let (decoded, consumed) = decode(&bytes).expect("decode scheduling");
        assert_eq!(decoded, right);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn encoding_is_deterministic() {
        let right = AccessRight::MemoryRegion {
            page_cap_index: 3,
            vaddr: 0x400_0000,
            size: 5000,
            perms: 6,
            cached: true,
        };
        assert_eq!(encode(&right), encode(&right));
    }

    #[test]
    fn memory_region_layout_is_stable() {
        let right = AccessRight::MemoryRegion {
            page_cap_index: 1,
            vaddr: 0x1234,
            size: 4096,
            perms: 7,
            cached: false,
        };
        let bytes = encode(&right);
        assert_eq!(bytes.len(), 27);
        assert_eq!(bytes[0], TAG_MEMORY_REGION);
        assert_eq!(bytes[25], 7);
        assert_eq!(bytes[26], 0);
        let (decoded, _) = decode(&bytes).expect("decode memory region");
        assert_eq!(decoded, right);
    }

    #[test]
    fn channel_and_irq_round_trip() {
        for right in [
            AccessRight::Channel {
                target_pd_id: 2,
                target_pd_channel_id: 7,
                own_channel_id: 9,
            },
            AccessRight::Irq {
                parent_irq_channel_id: 4,
                own_irq_channel_id: 8,
            },
        ] {
            let bytes = encode(&right);
            assert_eq!(bytes.len(), encoded_len(&right));
            let (decoded, consumed) = decode(&bytes).expect("decode record");
            assert_eq!(decoded, right);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn unknown_tag_and_truncation_are_rejected() {
        assert_eq!(decode(&[9]), Err(CodecError::UnknownTag(9)));
        assert_eq!(decode(&[]), Err(CodecError::Truncated));
        assert_eq!(decode(&[TAG_SCHEDULING, 5, 0, 0]), Err(CodecError::Truncated));
    }

    #[test]
    fn table_prefixes_record_count() {
        let rights = vec![
            AccessRight::Irq {
                parent_irq_channel_id: 1,
                own_irq_channel_id: 2,
            },
            AccessRight::Channel {
                target_pd_id: 0,
                target_pd_channel_id: 1,
                own_channel_id: 1,
            },
        ];
        let table = encode_table(&rights);
        assert_eq!(&table[0..8], &2u64.to_le_bytes());
        assert_eq!(table.len(), 8 + 3 + 4);
    }
}
