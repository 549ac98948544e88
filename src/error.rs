// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define the error taxonomy shared by the parsers and the patcher.
// Author: Lukas Bower

//! Errors raised while compiling a capability table. Document errors carry
//! enough location context to point a user at the offending element.

use std::fmt;
use std::io;

/// Source position of a document element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Name of the document the element came from.
    pub source: String,
    /// One-based line number.
    pub line: u32,
    /// One-based column number.
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.source, self.line, self.column)
    }
}

/// Failure modes of system parsing, rights resolution, and image patching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not well-formed.
    #[error("malformed document {source_name}: line={line}, column={column}")]
    MalformedDocument {
        /// Name of the offending document.
        source_name: String,
        /// One-based line of the syntax failure.
        line: u32,
        /// One-based column of the syntax failure.
        column: u32,
    },
    /// A required attribute is absent from an element.
    #[error("missing attribute '{attr}' for element '{tag}' at {location}")]
    MissingAttribute {
        /// Name of the absent attribute.
        attr: &'static str,
        /// Tag of the element it was expected on.
        tag: String,
        /// Where the element sits in the document.
        location: Location,
    },
    /// An element is structurally or semantically invalid.
    #[error("invalid element '{tag}' at {location}: {reason}")]
    InvalidElement {
        /// Tag of the offending element.
        tag: String,
        /// Where the element sits in the document.
        location: Location,
        /// Human-readable explanation.
        reason: String,
    },
    /// The target image cannot hold or address a capability table.
    #[error("invalid image {path}: {reason}")]
    Image {
        /// Path of the target image.
        path: String,
        /// Human-readable explanation.
        reason: String,
    },
    /// An interactive session cannot proceed.
    #[error("interactive session: {reason}")]
    Interactive {
        /// Human-readable explanation.
        reason: String,
    },
    /// An underlying read or write failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being read or written.
        context: String,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    /// Wrap an I/O failure with a description of the operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
