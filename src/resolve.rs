// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Resolve a rights-request document against the system topology.
// Author: Lukas Bower

//! Document-driven entry point of the access-right resolver. Each request
//! element is validated against the loader domain's own holdings — a grant
//! can never exceed what the loader itself was declared to have — and any
//! failure aborts the whole resolution with no partial result.

use std::fs;
use std::path::Path;

use roxmltree::Node;

use crate::constants::MAX_CHANNEL_ID;
use crate::error::ConfigError;
use crate::rights::{
    channel_id_in_range, period_covers_budget, perms_mask, within_loader_priority, AccessRight,
};
use crate::sysdesc::{ProtectionDomain, SystemDescription};
use crate::xml;

/// Resolve the rights-request document at `path` against `system`.
pub fn resolve_rights(
    path: &Path,
    system: &SystemDescription,
) -> Result<Vec<AccessRight>, ConfigError> {
    let source = path.display().to_string();
    let text = fs::read_to_string(path)
        .map_err(|err| ConfigError::io(format!("failed to read rights document {source}"), err))?;
    resolve_rights_str(&text, &source, system)
}

/// Resolve a rights-request document held in memory.
pub fn resolve_rights_str(
    text: &str,
    source: &str,
    system: &SystemDescription,
) -> Result<Vec<AccessRight>, ConfigError> {
    let doc = roxmltree::Document::parse(text).map_err(|err| {
        let pos = err.pos();
        ConfigError::MalformedDocument {
            source_name: source.to_owned(),
            line: pos.row,
            column: pos.col,
        }
    })?;

    let root = doc.root_element();
    let loader_name = xml::checked_attr(root, source, "loader_pd")?;
    let loader = system.find_pd(loader_name).ok_or_else(|| {
        xml::invalid(
            root,
            source,
            format!(
                "no protection domain with the name '{loader_name}' exists in the system description"
            ),
        )
    })?;

    let mut rights = Vec::new();
    for child in root.children().filter(Node::is_element) {
        let right = match child.tag_name().name() {
            "scheduling" => resolve_scheduling(child, source, loader)?,
            "memory_region" => resolve_memory_region(child, source, loader, system)?,
            "channel" => resolve_channel(child, source, loader, system)?,
            "irq" => resolve_irq(child, source, loader)?,
            other => {
                return Err(xml::invalid(
                    child,
                    source,
                    format!(
                        "invalid access-right element '{other}'; valid elements are 'scheduling', 'memory_region', 'channel', and 'irq'"
                    ),
                ))
            }
        };
        rights.push(right);
    }
    Ok(rights)
}

fn resolve_scheduling(
    node: Node<'_, '_>,
    source: &str,
    loader: &ProtectionDomain,
) -> Result<AccessRight, ConfigError> {
    let priority = xml::int_in_range(
        node,
        source,
        "priority",
        0,
        u64::MAX,
        Some(loader.priority as u64),
    )?;
    if !within_loader_priority(loader, priority) {
        return Err(xml::invalid(
            node,
            source,
            format!(
                "the priority {priority} exceeds the loader's own priority {}",
                loader.priority
            ),
        ));
    }
    let budget = xml::int_in_range(node, source, "budget", 0, u64::MAX, Some(loader.budget))?;
    let period = xml::int_in_range(node, source, "period", 0, u64::MAX, Some(budget))?;
    if !period_covers_budget(budget, period) {
        return Err(xml::invalid(
            node,
            source,
            format!("the period {period} must be at least the budget {budget}"),
        ));
    }
    Ok(AccessRight::Scheduling {
        priority: priority as u8,
        budget,
        period,
    })
}

fn resolve_memory_region(
    node: Node<'_, '_>,
    source: &str,
    loader: &ProtectionDomain,
    system: &SystemDescription,
) -> Result<AccessRight, ConfigError> {
    let name = xml::checked_attr(node, source, "name")?;
    let slot = system
        .page_cap_slot(loader, name)
        .map_err(|reason| xml::invalid(node, source, reason))?
        .ok_or_else(|| {
            xml::invalid(
                node,
                source,
                format!(
                    "the loader protection domain '{}' does not map a memory region named '{name}'",
                    loader.name
                ),
            )
        })?;
    let vaddr = xml::int_in_range(node, source, "vaddr", 0, u64::MAX, None)?;
    let perms_str = xml::checked_attr(node, source, "perms")?;
    let perms = perms_mask(perms_str).map_err(|bad| {
        xml::invalid(
            node,
            source,
            format!("the permission '{bad}' is not valid; valid values are 'r', 'w', and 'x'"),
        )
    })?;
    let cached = xml::bool_or_default(node, source, "cached", true)?;
    Ok(AccessRight::MemoryRegion {
        page_cap_index: slot.index,
        vaddr,
        size: slot.size,
        perms,
        cached,
    })
}

fn resolve_channel(
    node: Node<'_, '_>,
    source: &str,
    loader: &ProtectionDomain,
    system: &SystemDescription,
) -> Result<AccessRight, ConfigError> {
    let target_name = xml::checked_attr(node, source, "target_pd")?;
    // Delegation is restricted to the subtree the loader administers.
    let target = if target_name == loader.name {
        loader
    } else {
        system
            .children_of(loader.pd_id)
            .find(|pd| pd.name == target_name)
            .ok_or_else(|| {
                xml::invalid(
                    node,
                    source,
                    format!(
                        "the protection domain '{target_name}' is not the loader or one of its direct children"
                    ),
                )
            })?
    };
    let target_pd_channel_id =
        xml::int_in_range(node, source, "target_pd_channel_id", 0, u64::MAX, None)?;
    let own_pd_channel_id = xml::int_in_range(node, source, "own_pd_channel_id", 0, u64::MAX, None)?;
    for (attr, value) in [
        ("target_pd_channel_id", target_pd_channel_id),
        ("own_pd_channel_id", own_pd_channel_id),
    ] {
        if !channel_id_in_range(value) {
            return Err(xml::invalid(
                node,
                source,
                format!("the attribute '{attr}' must be in the range [0; {MAX_CHANNEL_ID}]"),
            ));
        }
    }
    Ok(AccessRight::Channel {
        target_pd_id: target.pd_id,
        target_pd_channel_id: target_pd_channel_id as u8,
        own_channel_id: own_pd_channel_id as u8,
    })
}

fn resolve_irq(
    node: Node<'_, '_>,
    source: &str,
    loader: &ProtectionDomain,
) -> Result<AccessRight, ConfigError> {
    let irq_number = xml::int_in_range(node, source, "irq", 0, u64::MAX, None)?;
    let irq = loader
        .irqs
        .iter()
        .find(|irq| irq.irq == irq_number)
        .ok_or_else(|| {
            xml::invalid(
                node,
                source,
                format!(
                    "the loader protection domain '{}' does not declare IRQ number {irq_number}",
                    loader.name
                ),
            )
        })?;
    let own_irq_channel_id = xml::int_in_range(node, source, "channel_id", 0, u64::MAX, None)?;
    if !channel_id_in_range(own_irq_channel_id) {
        return Err(xml::invalid(
            node,
            source,
            format!("the attribute 'channel_id' must be in the range [0; {MAX_CHANNEL_ID}]"),
        ));
    }
    Ok(AccessRight::Irq {
        parent_irq_channel_id: irq.channel_id,
        own_irq_channel_id: own_irq_channel_id as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysparse::parse_system_str;

    const SYSTEM: &str = r#"
        <system>
            <memory_region name="frame" size="4096"/>
            <memory_region name="ring" size="5000"/>
            <memory_region name="flag" size="1"/>
            <protection_domain pd_id="0" name="loader" priority="200" budget="2000" period="4000">
                <map mr="frame" vaddr="0x4000000" perms="rw"/>
                <map mr="ring" vaddr="0x4002000" perms="rw"/>
                <map mr="flag" vaddr="0x4004000" perms="r"/>
                <irq irq="33" id="5"/>
                <protection_domain pd_id="1" name="child" priority="100"/>
            </protection_domain>
            <protection_domain pd_id="2" name="stranger" priority="100"/>
        </system>"#;

    fn system() -> SystemDescription {
        parse_system_str(SYSTEM, "system.xml").expect("parse system")
    }

    fn resolve(request: &str) -> Result<Vec<AccessRight>, ConfigError> {
        resolve_rights_str(request, "rights.xml", &system())
    }

    #[test]
    fn scheduling_defaults_come_from_the_loader() {
        let rights = resolve(r#"<rights loader_pd="loader"><scheduling/></rights>"#)
            .expect("resolve rights");
        assert_eq!(
            rights,
            vec![AccessRight::Scheduling {
                priority: 200,
                budget: 2000,
                period: 2000,
            }]
        );
    }

    #[test]
    fn priority_escalation_is_rejected() {
        let err = resolve(r#"<rights loader_pd="loader"><scheduling priority="201"/></rights>"#)
            .unwrap_err();
        assert!(err.to_string().contains("exceeds the loader's own priority 200"));
    }

    #[test]
    fn period_below_budget_is_rejected() {
        let err = resolve(
            r#"<rights loader_pd="loader"><scheduling budget="1000" period="999"/></rights>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be at least the budget"));
    }

    #[test]
    fn page_cap_indices_follow_map_order() {
        let rights = resolve(
            r#"<rights loader_pd="loader">
                <memory_region name="frame" vaddr="0x5000000" perms="rw"/>
                <memory_region name="ring" vaddr="0x5002000" perms="rw"/>
                <memory_region name="flag" vaddr="0x5004000" perms="r"/>
            </rights>"#,
        )
        .expect("resolve rights");
        let indices: Vec<u64> = rights
            .iter()
            .map(|right| match right {
                AccessRight::MemoryRegion { page_cap_index, .. } => *page_cap_index,
                other => panic!("unexpected record {other:?}"),
            })
            .collect();
        assert_eq!(indices, [0, 1, 3]);
    }

    #[test]
    fn unmapped_region_is_an_unresolved_reference() {
        let err = resolve(
            r#"<rights loader_pd="loader"><memory_region name="absent" vaddr="0" perms="r"/></rights>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not map a memory region named 'absent'"));
    }

    #[test]
    fn channel_target_must_be_loader_or_direct_child() {
        let rights = resolve(
            r#"<rights loader_pd="loader">
                <channel target_pd="child" target_pd_channel_id="4" own_pd_channel_id="6"/>
            </rights>"#,
        )
        .expect("resolve rights");
        assert_eq!(
            rights,
            vec![AccessRight::Channel {
                target_pd_id: 1,
                target_pd_channel_id: 4,
                own_channel_id: 6,
            }]
        );

        let err = resolve(
            r#"<rights loader_pd="loader">
                <channel target_pd="stranger" target_pd_channel_id="4" own_pd_channel_id="6"/>
            </rights>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not the loader or one of its direct children"));
    }

    #[test]
    fn channel_id_62_is_accepted_and_63_rejected() {
        assert!(resolve(
            r#"<rights loader_pd="loader">
                <channel target_pd="loader" target_pd_channel_id="62" own_pd_channel_id="62"/>
            </rights>"#,
        )
        .is_ok());
        let err = resolve(
            r#"<rights loader_pd="loader">
                <channel target_pd="loader" target_pd_channel_id="63" own_pd_channel_id="0"/>
            </rights>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[0; 62]"));
    }

    #[test]
    fn irq_grants_inherit_the_loader_channel() {
        let rights = resolve(
            r#"<rights loader_pd="loader"><irq irq="33" channel_id="7"/></rights>"#,
        )
        .expect("resolve rights");
        assert_eq!(
            rights,
            vec![AccessRight::Irq {
                parent_irq_channel_id: 5,
                own_irq_channel_id: 7,
            }]
        );
    }

    #[test]
    fn undeclared_irq_is_an_unresolved_reference() {
        let err = resolve(r#"<rights loader_pd="loader"><irq irq="99" channel_id="7"/></rights>"#)
            .unwrap_err();
        assert!(err.to_string().contains("does not declare IRQ number 99"));
    }

    #[test]
    fn unknown_loader_fails_the_whole_resolution() {
        let err = resolve(r#"<rights loader_pd="ghost"><scheduling/></rights>"#).unwrap_err();
        assert!(err.to_string().contains("no protection domain with the name 'ghost'"));
    }

    #[test]
    fn unknown_request_element_is_rejected() {
        let err = resolve(r#"<rights loader_pd="loader"><grant/></rights>"#).unwrap_err();
        assert!(err.to_string().contains("invalid access-right element 'grant'"));
    }
}
