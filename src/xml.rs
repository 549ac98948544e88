// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide location-aware XML attribute helpers for the parsers.
// Author: Lukas Bower

//! Attribute lookup and numeric parsing over a `roxmltree` document. Each
//! helper threads the element's (line, column) into the error it raises, so
//! every failure names the offending document position.

use roxmltree::Node;

use crate::error::{ConfigError, Location};

/// Resolve a node's start position to a named source location.
pub fn location(node: Node<'_, '_>, source: &str) -> Location {
    let pos = node.document().text_pos_at(node.range().start);
    Location {
        source: source.to_owned(),
        line: pos.row,
        column: pos.col,
    }
}

/// Build an `InvalidElement` error for the given node.
pub fn invalid(node: Node<'_, '_>, source: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidElement {
        tag: node.tag_name().name().to_owned(),
        location: location(node, source),
        reason: reason.into(),
    }
}

/// Look up a required attribute, raising `MissingAttribute` when absent.
pub fn checked_attr<'a>(
    node: Node<'a, 'a>,
    source: &str,
    attr: &'static str,
) -> Result<&'a str, ConfigError> {
    node.attribute(attr).ok_or_else(|| ConfigError::MissingAttribute {
        attr,
        tag: node.tag_name().name().to_owned(),
        location: location(node, source),
    })
}

/// Parse an integer with automatic base detection: decimal, or hexadecimal
/// when prefixed with `0x`.
pub fn parse_int(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Look up a required integer attribute.
pub fn checked_int(node: Node<'_, '_>, source: &str, attr: &'static str) -> Result<u64, ConfigError> {
    let text = checked_attr(node, source, attr)?;
    parse_int(text)
        .ok_or_else(|| invalid(node, source, format!("the attribute '{attr}' is not an integer")))
}

/// Look up an optional integer attribute, substituting a default when absent.
pub fn int_or_default(
    node: Node<'_, '_>,
    source: &str,
    attr: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match node.attribute(attr) {
        Some(text) => parse_int(text)
            .ok_or_else(|| invalid(node, source, format!("the attribute '{attr}' is not an integer"))),
        None => Ok(default),
    }
}

/// Look up an integer attribute and require it to lie in `[min, max]`.
/// When a default is supplied the attribute may be absent.
pub fn int_in_range(
    node: Node<'_, '_>,
    source: &str,
    attr: &'static str,
    min: u64,
    max: u64,
    default: Option<u64>,
) -> Result<u64, ConfigError> {
    let value = match (node.attribute(attr), default) {
        (Some(text), _) => parse_int(text)
            .ok_or_else(|| invalid(node, source, format!("the attribute '{attr}' is not an integer")))?,
        (None, Some(default)) => return Ok(default),
        (None, None) => {
            return Err(ConfigError::MissingAttribute {
                attr,
                tag: node.tag_name().name().to_owned(),
                location: location(node, source),
            })
        }
    };
    if value < min || value > max {
        return Err(invalid(
            node,
            source,
            format!("the attribute '{attr}' must be in the range [{min}; {max}]"),
        ));
    }
    Ok(value)
}

/// Look up an optional boolean attribute against the strict token set
/// {"true", "false"}. Anything else is a structural error.
pub fn bool_or_default(
    node: Node<'_, '_>,
    source: &str,
    attr: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match node.attribute(attr) {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(invalid(
            node,
            source,
            format!("the attribute '{attr}' value '{other}' is not a boolean; valid values are 'true' and 'false'"),
        )),
        None => Ok(default),
    }
}
