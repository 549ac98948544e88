// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Write the encoded capability table into a target image file.
// Author: Lukas Bower

//! Image patcher: locates (or creates) the capability table through the
//! self-describing 7-byte offset field in the image identification header,
//! overwrites it with the freshly encoded table, and truncates away any
//! stale tail from a previous, longer table.
//!
//! The write-then-truncate sequence is not atomic with respect to process
//! termination: a crash between back-patching the offset field and the
//! final truncate can leave old and new table bytes intermixed. That is the
//! accepted risk profile of a one-shot build step, not a runtime guarantee.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};

use crate::codec::encode_table;
use crate::constants::{
    MAX_TABLE_OFFSET, MIN_IMAGE_LEN, RIGHTS_OFFSET_FIELD_LEN, RIGHTS_OFFSET_FIELD_POS,
};
use crate::error::ConfigError;
use crate::rights::AccessRight;

/// Outcome of a successful patch, reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSummary {
    /// Byte offset of the capability table inside the image.
    pub table_offset: u64,
    /// Number of records written.
    pub record_count: u64,
    /// Bytes written at the table offset, count field included.
    pub bytes_written: u64,
}

impl PatchSummary {
    /// One-line human-readable report.
    pub fn summary(&self) -> String {
        format!(
            "{} access rights ({} bytes) at offset {:#x}",
            self.record_count, self.bytes_written, self.table_offset
        )
    }
}

/// Patch the capability table of the image at `path` with `rights`.
///
/// The 7-byte little-endian field at [`RIGHTS_OFFSET_FIELD_POS`] either
/// holds zero (no table yet; the table is appended at end-of-file and the
/// field back-patched) or the offset of an existing table (re-patched in
/// place). The file is truncated to the exact end of the written bytes.
pub fn patch_image(path: &Path, rights: &[AccessRight]) -> Result<PatchSummary, ConfigError> {
    let display = path.display().to_string();
    let mut image = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| ConfigError::io(format!("failed to open image {display}"), err))?;

    let image_len = image
        .seek(SeekFrom::End(0))
        .map_err(|err| ConfigError::io(format!("failed to measure image {display}"), err))?;
    if image_len < MIN_IMAGE_LEN {
        return Err(ConfigError::Image {
            path: display,
            reason: format!(
                "image is {image_len} bytes, too short to hold the identification header"
            ),
        });
    }

    // The offset field is not aligned to a full word: read 8 bytes starting
    // one byte earlier and shift the stray low byte away.
    let mut raw = [0u8; 8];
    image
        .seek(SeekFrom::Start(RIGHTS_OFFSET_FIELD_POS - 1))
        .and_then(|_| image.read_exact(&mut raw))
        .map_err(|err| ConfigError::io(format!("failed to read offset field of {display}"), err))?;
    let stored_offset = u64::from_le_bytes(raw) >> 8;

    let table_offset = if stored_offset == 0 {
        // First patch: the table goes at the current end of the file and
        // the header learns where it lives.
        if image_len > MAX_TABLE_OFFSET {
            return Err(ConfigError::Image {
                path: display,
                reason: format!(
                    "table offset {image_len:#x} does not fit the 7-byte offset field"
                ),
            });
        }
        image
            .seek(SeekFrom::Start(RIGHTS_OFFSET_FIELD_POS))
            .and_then(|_| image.write_all(&image_len.to_le_bytes()[..RIGHTS_OFFSET_FIELD_LEN]))
            .map_err(|err| {
                ConfigError::io(format!("failed to back-patch offset field of {display}"), err)
            })?;
        debug!("no existing table; appending at {image_len:#x}");
        image_len
    } else {
        if stored_offset > image_len {
            return Err(ConfigError::Image {
                path: display,
                reason: format!(
                    "stored table offset {stored_offset:#x} points past end of file ({image_len:#x})"
                ),
            });
        }
        debug!("re-patching existing table at {stored_offset:#x}");
        stored_offset
    };

    let table = encode_table(rights);
    image
        .seek(SeekFrom::Start(table_offset))
        .and_then(|_| image.write_all(&table))
        .map_err(|err| ConfigError::io(format!("failed to write table to {display}"), err))?;

    // Drop stale trailing bytes left by a previous, longer table.
    let table_end = table_offset + table.len() as u64;
    image
        .set_len(table_end)
        .map_err(|err| ConfigError::io(format!("failed to truncate {display}"), err))?;

    let summary = PatchSummary {
        table_offset,
        record_count: rights.len() as u64,
        bytes_written: table.len() as u64,
    };
    info!("patched {display}: {}", summary.summary());
    Ok(summary)
}
