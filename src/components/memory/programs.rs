//! Fixed demo programs and user-supplied program images.

use crate::components::cpu::decoder::{self, OpcodeKind, OpcodeTable};
use crate::components::cpu::alu::AluOp;
use crate::components::cpu::instruction::{Operation, RegisterId, SymbolicInstruction};
use crate::components::memory::program_memory::{Cell, ProgramMemory};
use crate::error::{SimError, SimResult};
use crate::types::{Word, ADDRESS_WIDTH};

/// Operands baked into the binary demo before the user enters any
pub const DEFAULT_BINARY_OPERANDS: (u8, u8) = (4, 5);
/// Cell that receives the binary demo's result
pub const BINARY_RESULT_ADDRESS: u8 = 0b0110;
/// Cell that receives the accumulator when a binary program halts
pub const BINARY_SPARE_ADDRESS: u8 = 0b0111;

/// Largest program the 4-bit program counter can address
pub const MAX_PROGRAM_CELLS: usize = 1 << ADDRESS_WIDTH;

/// The calculator program for `pairs` operand pairs
/// Per pair: LOAD R(2k+1), LOAD R(2k+2), ADD/SUB, STORE ACC; then HALT.
pub fn symbolic_demo(pairs: usize, operation: Operation) -> ProgramMemory {
    let mut cells = Vec::with_capacity(pairs * 4 + 1);
    for pair in 0..pairs {
        let first = RegisterId((pair * 2 + 1) as u8);
        let second = RegisterId((pair * 2 + 2) as u8);
        cells.push(SymbolicInstruction::Load(first).into());
        cells.push(SymbolicInstruction::Load(second).into());
        cells.push(
            match operation {
                Operation::Add => SymbolicInstruction::Add(first, second),
                Operation::Subtract => SymbolicInstruction::Subtract(first, second),
            }
            .into(),
        );
        cells.push(SymbolicInstruction::Store.into());
    }
    cells.push(SymbolicInstruction::Halt.into());
    ProgramMemory::symbolic(cells)
}

/// The binary calculator: accumulate a, accumulate b, store at 0110, halt
pub fn binary_demo(
    a: Word,
    b: Word,
    operation: Operation,
    opcodes: &OpcodeTable,
) -> SimResult<ProgramMemory> {
    let opcode = |kind: OpcodeKind| {
        opcodes
            .opcode_for(kind)
            .ok_or_else(|| SimError::Config(format!("opcode table has no {:?} entry", kind)))
    };
    let second_op = match operation {
        Operation::Add => AluOp::Add,
        Operation::Subtract => AluOp::Subtract,
    };
    let result_address = Word::nibble(BINARY_RESULT_ADDRESS)?;

    let words = [
        decoder::encode(opcode(OpcodeKind::Accumulate(AluOp::Add))?, a)?,
        decoder::encode(opcode(OpcodeKind::Accumulate(second_op))?, b)?,
        decoder::encode(opcode(OpcodeKind::Store)?, result_address)?,
        decoder::encode(opcode(OpcodeKind::Halt)?, Word::zero(ADDRESS_WIDTH))?,
    ];

    let mut memory = ProgramMemory::binary();
    for (address, word) in words.iter().enumerate() {
        memory.write(address, Cell::Word(*word))?;
    }
    memory.write(usize::from(BINARY_RESULT_ADDRESS), Cell::Word(Word::byte(0)))?;
    memory.write(usize::from(BINARY_SPARE_ADDRESS), Cell::Word(Word::byte(0)))?;
    Ok(memory)
}

/// Addresses of STORE cells, in program order
/// The k-th STORE writes the result of the k-th operand pair over itself.
pub fn store_slots(memory: &ProgramMemory) -> Vec<usize> {
    (0..memory.capacity())
        .filter(|address| {
            matches!(
                memory.peek(*address),
                Some(Cell::Text(text)) if text.parse::<SymbolicInstruction>() == Ok(SymbolicInstruction::Store)
            )
        })
        .collect()
}

/// A program supplied by the caller instead of the built-in demo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramImage {
    /// (address, content) bit strings, e.g. ("0010", "01100110")
    Binary(Vec<(String, String)>),
    /// Mnemonics in address order, e.g. "LOAD R1"
    Symbolic(Vec<String>),
}

impl ProgramImage {
    pub fn binary(entries: &[(&str, &str)]) -> Self {
        ProgramImage::Binary(
            entries
                .iter()
                .map(|(address, content)| (address.to_string(), content.to_string()))
                .collect(),
        )
    }

    pub fn symbolic(lines: &[&str]) -> Self {
        ProgramImage::Symbolic(lines.iter().map(|line| line.to_string()).collect())
    }

    /// Build the memory table, validating addresses and word widths
    pub fn into_memory(self) -> SimResult<ProgramMemory> {
        match self {
            ProgramImage::Binary(entries) => {
                let mut memory = ProgramMemory::binary();
                for (address, content) in entries {
                    let address_word = Word::parse_binary(&address)?;
                    if address_word.width() > ADDRESS_WIDTH {
                        return Err(SimError::input_format(
                            &address,
                            format!("addresses are {} bits wide", ADDRESS_WIDTH),
                        ));
                    }
                    let content_word = Word::parse_binary(&content)?;
                    memory.write(
                        usize::from(address_word.value()),
                        Cell::Word(Word::byte(content_word.value())),
                    )?;
                }
                Ok(memory)
            }
            ProgramImage::Symbolic(lines) => {
                if lines.is_empty() || lines.len() > MAX_PROGRAM_CELLS {
                    return Err(SimError::Config(format!(
                        "symbolic programs hold 1 to {} cells, got {}",
                        MAX_PROGRAM_CELLS,
                        lines.len()
                    )));
                }
                Ok(ProgramMemory::symbolic(
                    lines.into_iter().map(Cell::Text).collect(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pair_demo() {
        let memory = symbolic_demo(1, Operation::Add);
        let listing: Vec<String> = memory.table().into_iter().map(|row| row.content).collect();
        assert_eq!(
            listing,
            vec!["LOAD R1", "LOAD R2", "ADD R1, R2", "STORE ACC", "HALT"]
        );
        assert_eq!(store_slots(&memory), vec![3]);
    }

    #[test]
    fn test_two_pair_demo() {
        let memory = symbolic_demo(2, Operation::Subtract);
        assert_eq!(memory.len(), 9);
        assert_eq!(memory.table()[6].content, "SUB R3, R4");
        assert_eq!(store_slots(&memory), vec![3, 7]);
    }

    #[test]
    fn test_binary_demo_layout() {
        let table = OpcodeTable::default();
        let memory = binary_demo(
            Word::nibble(4).unwrap(),
            Word::nibble(5).unwrap(),
            Operation::Add,
            &table,
        )
        .unwrap();
        let rows: Vec<(String, String)> = memory
            .table()
            .into_iter()
            .map(|row| (row.address, row.content))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("0000".to_string(), "00000100".to_string()),
                ("0001".to_string(), "00000101".to_string()),
                ("0010".to_string(), "01100110".to_string()),
                ("0011".to_string(), "01110000".to_string()),
                ("0110".to_string(), "00000000".to_string()),
                ("0111".to_string(), "00000000".to_string()),
            ]
        );
    }

    #[test]
    fn test_binary_demo_subtraction_opcode() {
        let memory = binary_demo(
            Word::nibble(9).unwrap(),
            Word::nibble(2).unwrap(),
            Operation::Subtract,
            &OpcodeTable::default(),
        )
        .unwrap();
        assert_eq!(memory.read(1).unwrap(), &Cell::Word(Word::byte(0b0001_0010)));
    }

    #[test]
    fn test_program_image_validation() {
        assert!(ProgramImage::binary(&[("10000", "00000000")]).into_memory().is_err());
        assert!(ProgramImage::binary(&[("0001", "2")]).into_memory().is_err());
        assert!(ProgramImage::symbolic(&[]).into_memory().is_err());

        let memory = ProgramImage::binary(&[("0011", "01110000")]).into_memory().unwrap();
        assert!(memory.is_mapped(3));
    }
}
