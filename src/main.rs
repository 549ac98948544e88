// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: CLI entry point for the capcfg capability-table compiler.
// Author: Lukas Bower

use anyhow::Result;
use capcfg::{configure, ConfigureOptions};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the target executable image to patch.
    image: PathBuf,
    /// Path to the XML system description.
    system: PathBuf,
    /// Path to an XML rights-request document; when omitted, access rights
    /// are gathered interactively.
    #[arg(long)]
    rights: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let options = ConfigureOptions {
        image_path: args.image,
        system_path: args.system,
        rights_path: args.rights,
    };
    let summary = configure(&options)?;
    println!("capcfg: wrote {}", summary.summary());
    Ok(())
}
