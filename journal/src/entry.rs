use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::instruction::{
    ActionInstruction, Instruction, UnknownActionInstruction, UnknownInstruction,
};

/// The clause separator. Located by literal substring search: a `&&` inside
/// an argument value is indistinguishable from a clause boundary. This is a
/// documented property of the format, not something to fix with a
/// quote-aware tokenizer.
const SEPARATOR: &str = "&&";

/// A command or revert clause: a typed head plus raw argument tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub instruction: Instruction,
    pub args: Vec<String>,
}

impl FromStr for Command {
    type Err = ClauseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, args) = split_clause(s)?;
        let instruction = head.parse()?;
        Ok(Command { instruction, args })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instruction.as_str())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// An action clause: same shape as [`Command`], over the action vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub instruction: ActionInstruction,
    pub args: Vec<String>,
}

impl FromStr for Action {
    type Err = ClauseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, args) = split_clause(s)?;
        let instruction = head.parse()?;
        Ok(Action { instruction, args })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instruction.as_str())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Split a clause into its head token and owned argument tokens.
///
/// Arguments are copied out of the input span so a caller's line buffer can
/// be reused between reads without corrupting previously parsed clauses.
fn split_clause(clause: &str) -> Result<(&str, Vec<String>), ClauseError> {
    let mut fields = clause.split_whitespace();
    let Some(head) = fields.next() else {
        return Err(ClauseError::Empty);
    };
    let args = fields.map(str::to_owned).collect();
    Ok((head, args))
}

/// One decoded journal line: a command, usually an action performed while
/// applying it, and optionally a revert command that undoes it.
///
/// Invariants, upheld by construction:
/// - a `REM` command never carries an action or a revert;
/// - every other command carries an action;
/// - a revert appears only when the line has two separators, and is itself a
///   full [`Command`] with no action or revert of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub command: Command,
    pub action: Option<Action>,
    pub revert: Option<Command>,
}

impl FromStr for Entry {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() {
            return Err(EntryError::EmptyLine);
        }

        // REM lines are free text: decode the whole line as a single command
        // clause, never splitting on the separator.
        if line.starts_with(Instruction::Rem.as_str()) {
            let command = line.parse().map_err(EntryError::Command)?;
            return Ok(Entry {
                command,
                action: None,
                revert: None,
            });
        }

        let Some(first) = line.find(SEPARATOR) else {
            return Err(EntryError::MissingAction);
        };
        let command = line[..first].parse().map_err(EntryError::Command)?;

        // The last separator starts the revert clause. When it coincides
        // with the first (or merely overlaps it, as in "&&&"), the line has
        // a single separator and no revert.
        let last = line.rfind(SEPARATOR).unwrap_or(first);
        let (action_text, revert_text) = if last < first + SEPARATOR.len() {
            (&line[first + SEPARATOR.len()..], None)
        } else {
            (
                &line[first + SEPARATOR.len()..last],
                Some(&line[last + SEPARATOR.len()..]),
            )
        };

        let action: Action = action_text.parse().map_err(EntryError::Action)?;
        let revert = match revert_text {
            Some(text) => Some(text.parse().map_err(EntryError::Revert)?),
            None => None,
        };

        Ok(Entry {
            command,
            action: Some(action),
            revert,
        })
    }
}

impl fmt::Display for Entry {
    /// Canonical rendering: `command && action [&& revert]`, tokens joined
    /// by single spaces. Decoding the rendering yields an equal entry.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(action) = &self.action {
            write!(f, " {} {}", SEPARATOR, action)?;
        }
        if let Some(revert) = &self.revert {
            write!(f, " {} {}", SEPARATOR, revert)?;
        }
        Ok(())
    }
}

/// Failure to parse a single clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseError {
    /// The clause was blank after trimming.
    Empty,
    /// The head token is not in the command vocabulary.
    UnknownInstruction(String),
    /// The head token is not in the action vocabulary.
    UnknownActionInstruction(String),
}

impl fmt::Display for ClauseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseError::Empty => write!(f, "empty clause"),
            ClauseError::UnknownInstruction(token) => {
                write!(f, "unknown instruction: {:?}", token)
            }
            ClauseError::UnknownActionInstruction(token) => {
                write!(f, "unknown action instruction: {:?}", token)
            }
        }
    }
}

impl std::error::Error for ClauseError {}

impl From<UnknownInstruction> for ClauseError {
    fn from(err: UnknownInstruction) -> Self {
        ClauseError::UnknownInstruction(err.0)
    }
}

impl From<UnknownActionInstruction> for ClauseError {
    fn from(err: UnknownActionInstruction) -> Self {
        ClauseError::UnknownActionInstruction(err.0)
    }
}

/// Failure to decode one journal line into an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// The line was blank after trimming. The format has no blank-line skip
    /// rule; a REM line is the way to embed a remark.
    EmptyLine,
    /// A non-REM line had no `&&` separator.
    MissingAction,
    /// The command clause failed to parse.
    Command(ClauseError),
    /// The action clause failed to parse.
    Action(ClauseError),
    /// The revert clause failed to parse.
    Revert(ClauseError),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryError::EmptyLine => write!(f, "empty line"),
            EntryError::MissingAction => write!(f, "missing action"),
            EntryError::Command(err) => write!(f, "parse command: {}", err),
            EntryError::Action(err) => write!(f, "parse action: {}", err),
            EntryError::Revert(err) => write!(f, "parse revert command: {}", err),
        }
    }
}

impl std::error::Error for EntryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EntryError::Command(err) | EntryError::Action(err) | EntryError::Revert(err) => {
                Some(err)
            }
            EntryError::EmptyLine | EntryError::MissingAction => None,
        }
    }
}
