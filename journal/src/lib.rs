//! Encoding and decoding of configuration journals.
//!
//! A journal is a line-oriented log of declarative system-configuration
//! steps. Each line carries a command, usually an action performed while the
//! command is applied, and optionally a revert command used to undo it:
//!
//! ```text
//! REM provision the scratch directory
//! MKDIR /var/lib/scratch && NOP && RM /var/lib/scratch
//! EXEC apt install -y coredns && SYSCTL net.ipv4.ip_forward=1
//! ```
//!
//! Clauses are separated by `&&` and the head token of each clause must
//! belong to a closed vocabulary ([`Instruction`] for commands and reverts,
//! [`ActionInstruction`] for actions). Decoding produces structured intent
//! only; nothing in this crate creates directories, copies files, or runs
//! processes.
//!
//! [`Journal::parse`] decodes an in-memory source all at once;
//! [`read_from`] streams entries out of an async reader through a channel,
//! under a cooperative [`CancelToken`].

pub mod decode;
pub mod entry;
pub mod instruction;

use std::fmt;

use serde::Serialize;

pub use crate::decode::{CancelToken, DecodeError, read_from};
pub use crate::entry::{Action, ClauseError, Command, Entry, EntryError};
pub use crate::instruction::{
    ActionInstruction, Instruction, UnknownActionInstruction, UnknownInstruction,
};

/// A fully decoded journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Journal {
    pub entries: Vec<Entry>,
}

impl Journal {
    /// Decode every line of `source`, stopping at the first bad line.
    ///
    /// An empty source yields an empty journal; a blank line inside the
    /// source is an error.
    pub fn parse(source: &str) -> Result<Self, DecodeError> {
        let mut entries = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let entry = line.parse().map_err(|err| DecodeError::Entry {
                line: idx + 1,
                source: err,
            })?;
            entries.push(entry);
        }
        Ok(Journal { entries })
    }
}

impl fmt::Display for Journal {
    /// Canonical rendering: one entry per line. Parsing the rendering yields
    /// an equal journal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
