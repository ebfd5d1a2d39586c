use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A primary operation the configuration system can perform.
///
/// Instructions head command and revert clauses. The wire form is the
/// canonical uppercase name, matched case-sensitively; anything else fails
/// with [`UnknownInstruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instruction {
    /// Remark: the rest of the line is free text and is never clause-split.
    Rem,
    Mkdir,
    Copy,
    Chmod,
    Chown,
    Chgrp,
    Rm,
    Exec,
}

impl Instruction {
    /// The canonical uppercase name of the instruction.
    pub fn as_str(self) -> &'static str {
        match self {
            Instruction::Rem => "REM",
            Instruction::Mkdir => "MKDIR",
            Instruction::Copy => "COPY",
            Instruction::Chmod => "CHMOD",
            Instruction::Chown => "CHOWN",
            Instruction::Chgrp => "CHGRP",
            Instruction::Rm => "RM",
            Instruction::Exec => "EXEC",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instruction {
    type Err = UnknownInstruction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REM" => Ok(Instruction::Rem),
            "MKDIR" => Ok(Instruction::Mkdir),
            "COPY" => Ok(Instruction::Copy),
            "CHMOD" => Ok(Instruction::Chmod),
            "CHOWN" => Ok(Instruction::Chown),
            "CHGRP" => Ok(Instruction::Chgrp),
            "RM" => Ok(Instruction::Rm),
            "EXEC" => Ok(Instruction::Exec),
            _ => Err(UnknownInstruction(s.to_string())),
        }
    }
}

/// The side effect performed while applying a command.
///
/// Actions have their own vocabulary, disjoint from [`Instruction`]: a
/// command instruction is never a valid action head and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionInstruction {
    Nop,
    Sysctl,
}

impl ActionInstruction {
    /// The canonical uppercase name of the action instruction.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionInstruction::Nop => "NOP",
            ActionInstruction::Sysctl => "SYSCTL",
        }
    }
}

impl fmt::Display for ActionInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionInstruction {
    type Err = UnknownActionInstruction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOP" => Ok(ActionInstruction::Nop),
            "SYSCTL" => Ok(ActionInstruction::Sysctl),
            _ => Err(UnknownActionInstruction(s.to_string())),
        }
    }
}

/// A token that is not a member of the command vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownInstruction(pub String);

impl fmt::Display for UnknownInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown instruction: {:?}", self.0)
    }
}

impl std::error::Error for UnknownInstruction {}

/// A token that is not a member of the action vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionInstruction(pub String);

impl fmt::Display for UnknownActionInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action instruction: {:?}", self.0)
    }
}

impl std::error::Error for UnknownActionInstruction {}
