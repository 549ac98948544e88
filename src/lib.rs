// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Expose the capability-table compilation pipeline for the CLI and tests.
// Author: Lukas Bower

//! capcfg compiles a declarative system description into a capability-grant
//! table and injects it into a target executable image. The pipeline is:
//! system document → [`sysdesc::SystemDescription`] → rights resolution
//! (from a rights-request document or an interactive session) →
//! [`rights::AccessRight`] records → fixed-layout encoding → image patch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod constants;
pub mod error;
pub mod patch;
pub mod prompt;
pub mod resolve;
pub mod rights;
pub mod sysdesc;
pub mod sysparse;
mod xml;

use anyhow::{bail, Result};
use log::info;
use std::io;
use std::path::PathBuf;

pub use patch::PatchSummary;

/// Inputs of one configuration run.
#[derive(Debug, Clone)]
pub struct ConfigureOptions {
    /// Target executable image to patch.
    pub image_path: PathBuf,
    /// XML system description.
    pub system_path: PathBuf,
    /// Optional XML rights-request document; when absent, rights are
    /// gathered interactively on stdin/stdout.
    pub rights_path: Option<PathBuf>,
}

/// Compile the capability table for one loader domain and patch it into the
/// target image. Any error before the patch leaves the image untouched.
pub fn configure(options: &ConfigureOptions) -> Result<PatchSummary> {
    if !options.system_path.is_file() {
        bail!(
            "system description does not exist or is not a file: {}",
            options.system_path.display()
        );
    }
    if !options.image_path.is_file() {
        bail!(
            "target image does not exist or is not a file: {}",
            options.image_path.display()
        );
    }

    let system = sysparse::parse_system(&options.system_path)?;
    info!(
        "parsed system: {} protection domains, {} memory regions, {} channels",
        system.protection_domains.len(),
        system.memory_regions.len(),
        system.channels.len()
    );

    let rights = match &options.rights_path {
        Some(path) => resolve::resolve_rights(path, &system)?,
        None => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            prompt::gather_rights(&mut stdin.lock(), &mut stdout.lock(), &system)?
        }
    };
    info!("resolved {} access rights", rights.len());

    let summary = patch::patch_image(&options.image_path, &rights)?;
    Ok(summary)
}
