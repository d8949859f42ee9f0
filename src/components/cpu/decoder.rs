//! # Instruction Decoder
//!
//! Splits packed 8-bit instruction words into opcode and operand nibbles and
//! resolves opcodes against a fixed [`OpcodeTable`].
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! [ opcode        ][ operand      ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::alu::AluOp;
use crate::error::{SimError, SimResult};
use crate::types::{Word, ADDRESS_WIDTH, DATA_WIDTH};

pub const OP_ADD: u8 = 0b0000;
pub const OP_SUBTRACT: u8 = 0b0001;
pub const OP_MULTIPLY: u8 = 0b0010;
pub const OP_POWER: u8 = 0b0011;
pub const OP_AND: u8 = 0b0100;
pub const OP_OR: u8 = 0b0101;
pub const OP_STORE: u8 = 0b0110;
pub const OP_HALT: u8 = 0b0111;

/// Language of operation names shown to the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    English,
    Spanish,
}

/// What the Execute stage does for an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpcodeKind {
    Accumulate(AluOp),
    /// Store the accumulator at the operand address
    Store,
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpcodeEntry {
    pub name: String,
    pub kind: OpcodeKind,
}

/// Instruction word split into its two fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedWord {
    pub opcode: Word,
    pub operand: Word,
}

/// Split an 8-bit word: high nibble opcode, low nibble operand
pub fn decode(word: Word) -> DecodedWord {
    let word = word.resize(DATA_WIDTH);
    DecodedWord {
        opcode: Word::wrapping(u32::from(word.value() >> 4), ADDRESS_WIDTH),
        operand: Word::wrapping(u32::from(word.value() & 0x0F), ADDRESS_WIDTH),
    }
}

/// Pack an opcode and an operand nibble into one instruction word
pub fn encode(opcode: Word, operand: Word) -> SimResult<Word> {
    let opcode = Word::from_unsigned(u32::from(opcode.value()), ADDRESS_WIDTH)?;
    let operand = Word::from_unsigned(u32::from(operand.value()), ADDRESS_WIDTH)?;
    Ok(Word::byte((opcode.value() << 4) | operand.value()))
}

/// Mapping from 4-bit opcode to operation name and behaviour
/// Fixed at construction, read-only afterwards.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    entries: BTreeMap<u8, OpcodeEntry>,
    unknown_name: String,
}

impl OpcodeTable {
    /// The calculator's eight-entry table with names in the given language
    pub fn new(locale: Locale) -> Self {
        let names: [(u8, &str, &str, OpcodeKind); 8] = [
            (OP_ADD, "Add", "Sumar", OpcodeKind::Accumulate(AluOp::Add)),
            (OP_SUBTRACT, "Subtract", "Restar", OpcodeKind::Accumulate(AluOp::Subtract)),
            (OP_MULTIPLY, "Multiply", "Multiplicar", OpcodeKind::Accumulate(AluOp::Multiply)),
            (OP_POWER, "Power", "Elevar", OpcodeKind::Accumulate(AluOp::Power)),
            (OP_AND, "AND", "AND", OpcodeKind::Accumulate(AluOp::And)),
            (OP_OR, "OR", "OR", OpcodeKind::Accumulate(AluOp::Or)),
            (OP_STORE, "Store to memory", "Guardar en memoria", OpcodeKind::Store),
            (OP_HALT, "Halt", "Finalizar", OpcodeKind::Halt),
        ];

        let entries = names
            .iter()
            .map(|(opcode, english, spanish, kind)| {
                let name = match locale {
                    Locale::English => english,
                    Locale::Spanish => spanish,
                };
                (
                    *opcode,
                    OpcodeEntry {
                        name: name.to_string(),
                        kind: *kind,
                    },
                )
            })
            .collect();

        let unknown_name = match locale {
            Locale::English => "Unknown",
            Locale::Spanish => "Desconocido",
        }
        .to_string();

        OpcodeTable {
            entries,
            unknown_name,
        }
    }

    /// Look up an opcode
    /// Returns: the table entry, or Err(SimError::UnknownOpcode)
    pub fn resolve(&self, opcode: Word) -> SimResult<&OpcodeEntry> {
        self.entries
            .get(&opcode.value())
            .ok_or(SimError::UnknownOpcode {
                opcode: opcode.value(),
            })
    }

    /// Display name for an opcode, falling back to the unknown label
    pub fn name_of(&self, opcode: Word) -> &str {
        self.resolve(opcode)
            .map(|entry| entry.name.as_str())
            .unwrap_or(self.unknown_name.as_str())
    }

    pub fn unknown_name(&self) -> &str {
        &self.unknown_name
    }

    /// Opcode whose entry has the given behaviour
    pub fn opcode_for(&self, kind: OpcodeKind) -> Option<Word> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.kind == kind)
            .map(|(opcode, _)| Word::wrapping(u32::from(*opcode), ADDRESS_WIDTH))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}
