// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Gather access rights interactively through bounded prompts.
// Author: Lukas Bower

//! Interactive entry point of the access-right resolver: a small state
//! machine (select the loader domain, collect the scheduling grant, then a
//! menu loop adding channel, memory-region, and irq grants until finished).
//! It is independent of the document-driven resolver and shares only the
//! validation predicates; every prompt restates its valid range and any
//! default, and invalid input re-prompts. Generic over the input and output
//! handles so tests can drive a session without a terminal.

use std::io::{BufRead, Write};

use crate::constants::{MAX_CHANNEL_ID, PERM_EXECUTE, PERM_READ, PERM_WRITE};
use crate::error::ConfigError;
use crate::rights::AccessRight;
use crate::sysdesc::{ProtectionDomain, SystemDescription};
use crate::xml::parse_int;

/// Grant-menu transitions of the interactive state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Channel,
    MemoryRegion,
    Irq,
    Finish,
}

/// Run one interactive session and return the gathered rights: the
/// scheduling record first, then channels, memory regions, and irqs in the
/// order they were added.
pub fn gather_rights<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    system: &SystemDescription,
) -> Result<Vec<AccessRight>, ConfigError> {
    let loader = select_domain(input, output, system)?;

    let scheduling = gather_scheduling(input, output, loader)?;
    let mut channels = Vec::new();
    let mut memory_regions = Vec::new();
    let mut irqs = Vec::new();

    loop {
        emit(output, "")?;
        emit(output, "The following options are available:")?;
        emit(output, " 0) Add a channel access right")?;
        emit(output, " 1) Add a memory region access right")?;
        emit(output, " 2) Add an IRQ access right")?;
        emit(output, " 3) Finish adding access rights")?;
        let choice = match prompt_int(input, output, "option to choose", 0, 3, None)? {
            0 => MenuChoice::Channel,
            1 => MenuChoice::MemoryRegion,
            2 => MenuChoice::Irq,
            _ => MenuChoice::Finish,
        };
        emit(output, "")?;
        match choice {
            MenuChoice::Channel => {
                channels.push(gather_channel(input, output, loader, system)?)
            }
            MenuChoice::MemoryRegion => {
                if let Some(right) = gather_memory_region(input, output, loader, system)? {
                    memory_regions.push(right);
                }
            }
            MenuChoice::Irq => {
                if let Some(right) = gather_irq(input, output, loader)? {
                    irqs.push(right);
                }
            }
            MenuChoice::Finish => break,
        }
    }

    let mut rights = vec![scheduling];
    rights.extend(channels);
    rights.extend(memory_regions);
    rights.extend(irqs);
    Ok(rights)
}

fn select_domain<'a, R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    system: &'a SystemDescription,
) -> Result<&'a ProtectionDomain, ConfigError> {
    if system.protection_domains.is_empty() {
        return Err(ConfigError::Interactive {
            reason: "the system description declares no protection domains".to_owned(),
        });
    }
    emit(
        output,
        "The following protection domains are available to load the program from:",
    )?;
    for (index, pd) in system.protection_domains.iter().enumerate() {
        emit(output, &format!(" {index}) {}", pd.name))?;
    }
    let option = prompt_int(
        input,
        output,
        "protection domain to load the program from",
        0,
        system.protection_domains.len() as u64 - 1,
        None,
    )?;
    Ok(&system.protection_domains[option as usize])
}

fn gather_scheduling<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    loader: &ProtectionDomain,
) -> Result<AccessRight, ConfigError> {
    let priority = prompt_int(
        input,
        output,
        "priority",
        0,
        loader.priority as u64,
        Some(loader.priority as u64),
    )?;
    let budget = prompt_int(input, output, "budget", 0, u64::MAX, Some(loader.budget))?;
    // The lower bound is the budget, so the period invariant holds by
    // construction.
    let period = prompt_int(input, output, "period", budget, u64::MAX, Some(budget))?;
    Ok(AccessRight::Scheduling {
        priority: priority as u8,
        budget,
        period,
    })
}

fn gather_channel<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    loader: &ProtectionDomain,
    system: &SystemDescription,
) -> Result<AccessRight, ConfigError> {
    let mut targets: Vec<&ProtectionDomain> = vec![loader];
    targets.extend(system.children_of(loader.pd_id));
    emit(output, "A channel can be set up to the following protection domains:")?;
    for (index, pd) in targets.iter().enumerate() {
        emit(output, &format!(" {index}) {}", pd.name))?;
    }
    let option = prompt_int(
        input,
        output,
        "channel option",
        0,
        targets.len() as u64 - 1,
        None,
    )?;
    let target = targets[option as usize];
    let target_pd_channel_id = prompt_int(
        input,
        output,
        "id of the channel for the selected protection domain",
        0,
        MAX_CHANNEL_ID,
        None,
    )?;
    let own_channel_id = prompt_int(
        input,
        output,
        "id of the channel for the protection domain of the program to load",
        0,
        MAX_CHANNEL_ID,
        None,
    )?;
    Ok(AccessRight::Channel {
        target_pd_id: target.pd_id,
        target_pd_channel_id: target_pd_channel_id as u8,
        own_channel_id: own_channel_id as u8,
    })
}

fn gather_memory_region<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    loader: &ProtectionDomain,
    system: &SystemDescription,
) -> Result<Option<AccessRight>, ConfigError> {
    if loader.maps.is_empty() {
        emit(output, "The selected protection domain maps no memory regions.")?;
        return Ok(None);
    }
    emit(
        output,
        "The following shared memory regions can be made available to the program to load:",
    )?;
    for (index, map) in loader.maps.iter().enumerate() {
        emit(output, &format!(" {index}) {}", map.mr))?;
    }
    let option = prompt_int(
        input,
        output,
        "memory region option",
        0,
        loader.maps.len() as u64 - 1,
        None,
    )?;
    let target = &loader.maps[option as usize];
    let slot = system
        .page_cap_slot(loader, &target.mr)
        .map_err(|reason| ConfigError::Interactive { reason })?
        .ok_or_else(|| ConfigError::Interactive {
            reason: format!("failed to find a memory region with name '{}'", target.mr),
        })?;

    let vaddr = prompt_int(input, output, "vaddr", 0, u64::MAX, None)?;
    let mut perms = 0u8;
    if prompt_flag(input, output, "readable", true)? {
        perms |= PERM_READ;
    }
    if prompt_flag(input, output, "writable", false)? {
        perms |= PERM_WRITE;
    }
    if prompt_flag(input, output, "executable", false)? {
        perms |= PERM_EXECUTE;
    }
    let cached = prompt_flag(input, output, "cached", true)?;

    Ok(Some(AccessRight::MemoryRegion {
        page_cap_index: slot.index,
        vaddr,
        size: slot.size,
        perms,
        cached,
    }))
}

fn gather_irq<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    loader: &ProtectionDomain,
) -> Result<Option<AccessRight>, ConfigError> {
    if loader.irqs.is_empty() {
        emit(output, "The selected protection domain declares no IRQ lines.")?;
        return Ok(None);
    }
    emit(output, "The following IRQ numbers can be chosen:")?;
    for (index, irq) in loader.irqs.iter().enumerate() {
        emit(output, &format!(" {index}) {}", irq.irq))?;
    }
    let option = prompt_int(
        input,
        output,
        "IRQ option",
        0,
        loader.irqs.len() as u64 - 1,
        None,
    )?;
    let target = &loader.irqs[option as usize];
    let own_irq_channel_id = prompt_int(
        input,
        output,
        "IRQ channel id for the program to load",
        0,
        MAX_CHANNEL_ID,
        None,
    )?;
    Ok(Some(AccessRight::Irq {
        parent_irq_channel_id: target.channel_id,
        own_irq_channel_id: own_irq_channel_id as u8,
    }))
}

/// Prompt for an integer in `[min, max]`, re-prompting until the input is
/// valid. Empty input takes the default when one exists.
fn prompt_int<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    min: u64,
    max: u64,
    default: Option<u64>,
) -> Result<u64, ConfigError> {
    loop {
        let mut text = format!("Input the {label} [{min}; {max}]");
        if let Some(default) = default {
            text.push_str(&format!(" (default value {default})"));
        }
        text.push_str(": ");
        write!(output, "{text}").map_err(write_failed)?;
        output.flush().map_err(write_failed)?;

        let line = read_line(input)?;
        if line.is_empty() {
            match default {
                Some(default) => return Ok(default),
                None => {
                    emit(output, "Please provide a value")?;
                    continue;
                }
            }
        }
        match parse_int(&line) {
            Some(value) if value >= min && value <= max => return Ok(value),
            Some(_) => emit(
                output,
                &format!("The {label} must be in the range [{min}; {max}]"),
            )?,
            None => emit(output, "Invalid value, please try again.")?,
        }
    }
}

fn prompt_flag<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let value = prompt_int(
        input,
        output,
        &format!("flag '{label}' (1 = yes, 0 = no)"),
        0,
        1,
        Some(u64::from(default)),
    )?;
    Ok(value == 1)
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String, ConfigError> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|err| ConfigError::io("failed to read interactive input", err))?;
    if read == 0 {
        return Err(ConfigError::Interactive {
            reason: "input ended before the session finished".to_owned(),
        });
    }
    Ok(line.trim().to_owned())
}

fn emit<W: Write>(output: &mut W, line: &str) -> Result<(), ConfigError> {
    writeln!(output, "{line}").map_err(write_failed)
}

fn write_failed(err: std::io::Error) -> ConfigError {
    ConfigError::io("failed to write interactive prompt", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysparse::parse_system_str;
    use std::io::Cursor;

    const SYSTEM: &str = r#"
        <system>
            <memory_region name="frame" size="4096"/>
            <memory_region name="ring" size="5000"/>
            <protection_domain pd_id="0" name="loader" priority="200" budget="2000">
                <map mr="frame" vaddr="0x4000000" perms="rw"/>
                <map mr="ring" vaddr="0x4002000" perms="rw"/>
                <irq irq="33" id="5"/>
                <protection_domain pd_id="1" name="child" priority="100"/>
            </protection_domain>
        </system>"#;

    fn system() -> SystemDescription {
        parse_system_str(SYSTEM, "system.xml").expect("parse system")
    }

    fn run_session(script: &str) -> Vec<AccessRight> {
        let system = system();
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        gather_rights(&mut input, &mut output, &system).expect("interactive session")
    }

    #[test]
    fn defaults_produce_the_loader_scheduling_record() {
        // Select the loader, accept every scheduling default, finish.
        let rights = run_session("0\n\n\n\n3\n");
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
    fn channel_grant_targets_a_child_domain() {
        // Loader, scheduling defaults, add channel to option 1 (child),
        // target id 62, own id 5, finish.
        let rights = run_session("0\n\n\n\n0\n1\n62\n5\n3\n");
        assert_eq!(
            rights[1],
            AccessRight::Channel {
                target_pd_id: 1,
                target_pd_channel_id: 62,
                own_channel_id: 5,
            }
        );
    }

    #[test]
    fn memory_region_grant_uses_positional_slot() {
        // Loader, scheduling defaults, add memory region 1 (ring), vaddr,
        // readable default, writable yes, executable default, cached
        // default, finish.
        let rights = run_session("0\n\n\n\n1\n1\n0x5000000\n\n1\n\n\n3\n");
        assert_eq!(
            rights[1],
            AccessRight::MemoryRegion {
                page_cap_index: 1,
                vaddr: 0x500_0000,
                size: 5000,
                perms: PERM_READ | PERM_WRITE,
                cached: true,
            }
        );
    }

    #[test]
    fn irq_grant_inherits_the_loader_channel() {
        let rights = run_session("0\n\n\n\n2\n0\n9\n3\n");
        assert_eq!(
            rights[1],
            AccessRight::Irq {
                parent_irq_channel_id: 5,
                own_irq_channel_id: 9,
            }
        );
    }

    #[test]
    fn out_of_range_input_reprompts() {
        let system = system();
        // Channel id 63 is rejected, then 62 is accepted.
        let script = "0\n\n\n\n0\n0\n63\n62\n5\n3\n";
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let rights = gather_rights(&mut input, &mut output, &system).expect("session");
        let transcript = String::from_utf8(output).expect("utf8 transcript");
        assert!(transcript.contains("must be in the range [0; 62]"));
        assert_eq!(
            rights[1],
            AccessRight::Channel {
                target_pd_id: 0,
                target_pd_channel_id: 62,
                own_channel_id: 5,
            }
        );
    }

    #[test]
    fn exhausted_input_fails_the_session() {
        let system = system();
        let mut input = Cursor::new(b"0\n".to_vec());
        let mut output = Vec::new();
        let err = gather_rights(&mut input, &mut output, &system).unwrap_err();
        assert!(err.to_string().contains("input ended"));
    }
}
