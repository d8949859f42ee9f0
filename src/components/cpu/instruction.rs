use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SimError;
use crate::types::Word;

/// Arithmetic the calculator front-end asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Operation {
    #[default]
    Add,
    Subtract,
}

impl Operation {
    /// Apply the operation to an operand pair with fixed-width wraparound
    pub fn apply(&self, a: Word, b: Word) -> Word {
        match self {
            Operation::Add => a.wrapping_add(b),
            Operation::Subtract => a.wrapping_sub(b),
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
        }
    }
}

/// Operand register of the symbolic programs (R1, R2, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegisterId(pub u8);

impl RegisterId {
    /// Index of the operand pair this register reads from (0-based)
    pub fn pair_index(&self) -> usize {
        (self.0.saturating_sub(1) / 2) as usize
    }

    /// True for the first element of its pair (R1, R3, ...)
    pub fn is_first_of_pair(&self) -> bool {
        self.0 % 2 == 1
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl FromStr for RegisterId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let digits = text
            .strip_prefix('R')
            .or_else(|| text.strip_prefix('r'))
            .ok_or_else(|| SimError::UnknownMnemonic(s.to_string()))?;
        match digits.parse::<u8>() {
            Ok(n) if n > 0 => Ok(RegisterId(n)),
            _ => Err(SimError::UnknownMnemonic(s.to_string())),
        }
    }
}

/// Mnemonic instruction set of the symbolic demo programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolicInstruction {
    /// LOAD-A / LOAD-B: copy an operand register into the accumulator
    Load(RegisterId),
    Add(RegisterId, RegisterId),
    Subtract(RegisterId, RegisterId),
    /// Write the accumulator into the matching result cell
    Store,
    Halt,
}

impl fmt::Display for SymbolicInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicInstruction::Load(r) => write!(f, "LOAD {}", r),
            SymbolicInstruction::Add(a, b) => write!(f, "ADD {}, {}", a, b),
            SymbolicInstruction::Subtract(a, b) => write!(f, "SUB {}, {}", a, b),
            SymbolicInstruction::Store => write!(f, "STORE ACC"),
            SymbolicInstruction::Halt => write!(f, "HALT"),
        }
    }
}

impl FromStr for SymbolicInstruction {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || SimError::UnknownMnemonic(s.to_string());
        let text = s.trim();
        let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
            Some((m, r)) => (m, r.trim()),
            None => (text, ""),
        };

        let register_pair = |rest: &str| -> Result<(RegisterId, RegisterId), SimError> {
            let (a, b) = rest.split_once(',').ok_or_else(unknown)?;
            Ok((a.parse()?, b.parse()?))
        };

        match mnemonic.to_ascii_uppercase().as_str() {
            "LOAD" => Ok(SymbolicInstruction::Load(rest.parse()?)),
            "ADD" => {
                let (a, b) = register_pair(rest)?;
                Ok(SymbolicInstruction::Add(a, b))
            }
            "SUB" | "SUBTRACT" => {
                let (a, b) = register_pair(rest)?;
                Ok(SymbolicInstruction::Subtract(a, b))
            }
            "STORE" if rest.is_empty() || rest.eq_ignore_ascii_case("ACC") => {
                Ok(SymbolicInstruction::Store)
            }
            "HALT" if rest.is_empty() => Ok(SymbolicInstruction::Halt),
            _ => Err(unknown()),
        }
    }
}

/// An instruction as fetched from memory
/// A program uses one variant throughout; `Unrecognized` marks a cell whose
/// content is not an instruction (for example a result written by STORE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Instruction {
    Symbolic(SymbolicInstruction),
    /// Packed 8-bit word: high nibble opcode, low nibble operand
    Binary(Word),
    Unrecognized(String),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Symbolic(instruction) => write!(f, "{}", instruction),
            Instruction::Binary(word) => write!(f, "{}", word),
            Instruction::Unrecognized(text) => write!(f, "{}", text),
        }
    }
}
