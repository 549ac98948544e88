// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Build a SystemDescription from an XML system document.
// Author: Lukas Bower

//! Topology builder: walks the system document tree and produces the
//! [`SystemDescription`] the resolver validates against. Protection domains
//! are flattened in pre-order, so a domain always precedes its descendants
//! and descendants of different domains never interleave.

use std::fs;
use std::path::Path;

use roxmltree::Node;

use crate::constants::{DEFAULT_BUDGET, MAX_CHANNEL_ID, MAX_PD_ID, PAGE_SIZE};
use crate::error::ConfigError;
use crate::rights::perms_mask;
use crate::sysdesc::{
    Channel, ChannelEnd, Irq, Map, MemoryRegion, ProtectionDomain, SystemDescription,
};
use crate::xml;

/// Parse the system document at `path`.
pub fn parse_system(path: &Path) -> Result<SystemDescription, ConfigError> {
    let source = path.display().to_string();
    let text = fs::read_to_string(path)
        .map_err(|err| ConfigError::io(format!("failed to read system document {source}"), err))?;
    parse_system_str(&text, &source)
}

/// Parse a system document held in memory; `source` names it in errors.
pub fn parse_system_str(text: &str, source: &str) -> Result<SystemDescription, ConfigError> {
    let doc = roxmltree::Document::parse(text).map_err(|err| {
        let pos = err.pos();
        ConfigError::MalformedDocument {
            source_name: source.to_owned(),
            line: pos.row,
            column: pos.col,
        }
    })?;

    let mut protection_domains = Vec::new();
    let mut memory_regions = Vec::new();
    let mut channels = Vec::new();
    for child in doc.root_element().children().filter(Node::is_element) {
        match child.tag_name().name() {
            "memory_region" => memory_regions.push(parse_memory_region(child, source)?),
            "channel" => channels.push(parse_channel(child, source)?),
            "protection_domain" => {
                parse_protection_domain(child, source, None, &mut protection_domains)?
            }
            other => {
                return Err(xml::invalid(
                    child,
                    source,
                    format!(
                        "unrecognized element '{other}'; valid elements are 'memory_region', 'channel', and 'protection_domain'"
                    ),
                ))
            }
        }
    }

    Ok(SystemDescription {
        protection_domains,
        memory_regions,
        channels,
    })
}

fn parse_memory_region(node: Node<'_, '_>, source: &str) -> Result<MemoryRegion, ConfigError> {
    let name = xml::checked_attr(node, source, "name")?.to_owned();
    let size = xml::checked_int(node, source, "size")?;
    if size == 0 {
        return Err(xml::invalid(node, source, "the attribute 'size' must be positive"));
    }
    let page_size = xml::int_or_default(node, source, "page_size", PAGE_SIZE)?;
    if page_size == 0 {
        return Err(xml::invalid(node, source, "the attribute 'page_size' must be positive"));
    }
    Ok(MemoryRegion {
        name,
        size,
        page_size,
    })
}

fn parse_channel(node: Node<'_, '_>, source: &str) -> Result<Channel, ConfigError> {
    let ends: Vec<_> = node.children().filter(Node::is_element).collect();
    let [end_a, end_b]: [Node<'_, '_>; 2] = match ends.try_into() {
        Ok(pair) => pair,
        Err(_) => {
            return Err(xml::invalid(
                node,
                source,
                "the channel does not have exactly two ends",
            ))
        }
    };
    let parse_end = |end: Node<'_, '_>| -> Result<ChannelEnd, ConfigError> {
        if end.tag_name().name() != "end" {
            return Err(xml::invalid(end, source, "expected 'end' element"));
        }
        Ok(ChannelEnd {
            pd: xml::checked_attr(end, source, "pd")?.to_owned(),
            id: xml::checked_int(end, source, "id")?,
        })
    };
    Ok(Channel {
        end_a: parse_end(end_a)?,
        end_b: parse_end(end_b)?,
    })
}

fn parse_map(node: Node<'_, '_>, source: &str) -> Result<Map, ConfigError> {
    let mr = xml::checked_attr(node, source, "mr")?.to_owned();
    let vaddr = xml::checked_int(node, source, "vaddr")?;
    let perms_str = xml::checked_attr(node, source, "perms")?;
    let perms = perms_mask(perms_str).map_err(|bad| {
        xml::invalid(
            node,
            source,
            format!("the permission '{bad}' is not valid; valid values are 'r', 'w', and 'x'"),
        )
    })?;
    let cached = xml::bool_or_default(node, source, "cached", true)?;
    Ok(Map {
        mr,
        vaddr,
        perms,
        cached,
    })
}

fn parse_irq(node: Node<'_, '_>, source: &str) -> Result<Irq, ConfigError> {
    let irq = xml::checked_int(node, source, "irq")?;
    let channel_id = xml::int_in_range(node, source, "id", 0, MAX_CHANNEL_ID, None)? as u8;
    Ok(Irq { irq, channel_id })
}

fn parse_protection_domain(
    node: Node<'_, '_>,
    source: &str,
    parent_pd_id: Option<u8>,
    out: &mut Vec<ProtectionDomain>,
) -> Result<(), ConfigError> {
    let pd_id = xml::int_in_range(node, source, "pd_id", 0, MAX_PD_ID, None)? as u8;
    let name = xml::checked_attr(node, source, "name")?.to_owned();
    let priority = xml::int_in_range(node, source, "priority", 0, u8::MAX as u64, None)? as u8;
    let budget = xml::int_or_default(node, source, "budget", DEFAULT_BUDGET)?;
    let period = xml::int_or_default(node, source, "period", budget)?;

    let mut maps = Vec::new();
    let mut irqs = Vec::new();
    let mut descendants = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "protection_domain" => {
                parse_protection_domain(child, source, Some(pd_id), &mut descendants)?
            }
            "map" => maps.push(parse_map(child, source)?),
            "irq" => irqs.push(parse_irq(child, source)?),
            // Relevant only to program loading, which is outside this tool.
            "program_image" => continue,
            _ => {
                return Err(xml::invalid(
                    child,
                    source,
                    "invalid element for the child of a protection domain",
                ))
            }
        }
    }

    out.push(ProtectionDomain {
        pd_id,
        parent_pd_id,
        name,
        priority,
        budget,
        period,
        maps,
        irqs,
    });
    out.extend(descendants);
    Ok(())
}
