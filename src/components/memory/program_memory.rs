use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::components::cpu::instruction::{Instruction, SymbolicInstruction};
use crate::error::{SimError, SimResult};
use crate::types::{Word, ADDRESS_WIDTH};

/// Content of one memory cell
/// Code and data share the same table, so a STORE may overwrite an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Cell {
    /// Binary-encoded instruction or data word
    Word(Word),
    /// Mnemonic text, decoded to an instruction on fetch
    Text(String),
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Cell::Text(text.into())
    }

    pub fn as_word(&self) -> Option<Word> {
        match self {
            Cell::Word(word) => Some(*word),
            Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Word(word) => write!(f, "{}", word),
            Cell::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<SymbolicInstruction> for Cell {
    fn from(instruction: SymbolicInstruction) -> Self {
        Cell::Text(instruction.to_string())
    }
}

/// How addresses are laid out and printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddressFormat {
    /// Dense 0-based index, printed in decimal
    Index,
    /// Sparse 4-bit key, printed as a binary string
    Binary,
}

/// One row of the memory table as shown to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRow {
    pub address: String,
    pub content: String,
}

/// Address-indexed store shared by code and data
/// Symbolic programs are dense tables of mnemonic text; binary programs are
/// sparse maps keyed by 4-bit address. Writes are the only mutation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMemory {
    cells: BTreeMap<usize, Cell>,
    capacity: usize,
    format: AddressFormat,
}

impl ProgramMemory {
    /// Dense memory holding one cell per entry, starting at address 0
    pub fn symbolic(cells: Vec<Cell>) -> Self {
        let capacity = cells.len();
        ProgramMemory {
            cells: cells.into_iter().enumerate().collect(),
            capacity,
            format: AddressFormat::Index,
        }
    }

    /// Empty sparse memory covering the whole 4-bit address space
    pub fn binary() -> Self {
        ProgramMemory {
            cells: BTreeMap::new(),
            capacity: 1 << ADDRESS_WIDTH,
            format: AddressFormat::Binary,
        }
    }

    /// Sparse memory preloaded with (address, word) pairs
    pub fn binary_from(entries: &[(u8, u8)]) -> SimResult<Self> {
        let mut memory = Self::binary();
        for (address, content) in entries {
            memory.write(usize::from(*address), Cell::Word(Word::byte(*content)))?;
        }
        Ok(memory)
    }

    /// Read a cell
    /// Returns: Err(AddressOutOfRange) beyond capacity, Err(UnmappedAddress) for holes
    pub fn read(&self, address: usize) -> SimResult<&Cell> {
        self.check_range(address)?;
        self.cells
            .get(&address)
            .ok_or(SimError::UnmappedAddress { address })
    }

    /// Read without failing on holes (used before a store overwrites a cell)
    pub fn peek(&self, address: usize) -> Option<&Cell> {
        self.cells.get(&address)
    }

    /// Overwrite or map a cell; always allowed inside the address range
    pub fn write(&mut self, address: usize, cell: Cell) -> SimResult<()> {
        self.check_range(address)?;
        self.cells.insert(address, cell);
        Ok(())
    }

    /// Read a cell and interpret it as an instruction
    /// Mnemonic text that does not parse yields `Instruction::Unrecognized`.
    pub fn fetch(&self, address: usize) -> SimResult<Instruction> {
        Ok(match self.read(address)? {
            Cell::Word(word) => Instruction::Binary(*word),
            Cell::Text(text) => match text.parse::<SymbolicInstruction>() {
                Ok(instruction) => Instruction::Symbolic(instruction),
                Err(_) => Instruction::Unrecognized(text.clone()),
            },
        })
    }

    pub fn is_mapped(&self, address: usize) -> bool {
        self.cells.contains_key(&address)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn format(&self) -> AddressFormat {
        self.format
    }

    /// Printable address in this memory's notation
    pub fn format_address(&self, address: usize) -> String {
        match self.format {
            AddressFormat::Index => address.to_string(),
            AddressFormat::Binary => Word::wrapping(address as u32, ADDRESS_WIDTH).to_binary_string(),
        }
    }

    /// Full table in address order
    pub fn table(&self) -> Vec<MemoryRow> {
        self.cells
            .iter()
            .map(|(address, cell)| MemoryRow {
                address: self.format_address(*address),
                content: cell.to_string(),
            })
            .collect()
    }

    fn check_range(&self, address: usize) -> SimResult<()> {
        if address >= self.capacity {
            return Err(SimError::AddressOutOfRange {
                address,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::cpu::instruction::RegisterId;

    #[test]
    fn test_symbolic_memory_is_dense() {
        let memory = ProgramMemory::symbolic(vec![
            SymbolicInstruction::Load(RegisterId(1)).into(),
            SymbolicInstruction::Halt.into(),
        ]);
        assert_eq!(memory.capacity(), 2);
        assert_eq!(
            memory.fetch(1).unwrap(),
            Instruction::Symbolic(SymbolicInstruction::Halt)
        );
        assert_eq!(
            memory.read(2),
            Err(SimError::AddressOutOfRange {
                address: 2,
                capacity: 2
            })
        );
    }

    #[test]
    fn test_binary_memory_is_sparse() {
        let memory = ProgramMemory::binary_from(&[(0b0000, 0b0000_0100), (0b0110, 0)]).unwrap();
        assert_eq!(memory.capacity(), 16);
        assert!(memory.read(0b0110).is_ok());
        assert_eq!(
            memory.read(0b0001),
            Err(SimError::UnmappedAddress { address: 1 })
        );
        assert!(memory.read(16).is_err());
        assert_eq!(memory.peek(0b0001), None);
    }

    #[test]
    fn test_write_over_instruction_takes_effect_on_next_fetch() {
        let mut memory = ProgramMemory::symbolic(vec![SymbolicInstruction::Store.into()]);
        memory.write(0, Cell::text("RESULT = 7")).unwrap();
        assert_eq!(
            memory.fetch(0).unwrap(),
            Instruction::Unrecognized("RESULT = 7".to_string())
        );
    }

    #[test]
    fn test_write_maps_new_binary_cell() {
        let mut memory = ProgramMemory::binary();
        memory.write(0b0111, Cell::Word(Word::byte(9))).unwrap();
        assert!(memory.is_mapped(0b0111));
        assert!(memory.write(16, Cell::Word(Word::byte(1))).is_err());
    }

    #[test]
    fn test_table_formats_addresses() {
        let memory = ProgramMemory::binary_from(&[(0b0011, 0b0111_0000)]).unwrap();
        assert_eq!(
            memory.table(),
            vec![MemoryRow {
                address: "0011".to_string(),
                content: "01110000".to_string()
            }]
        );

        let memory = ProgramMemory::symbolic(vec![Cell::text("?")]);
        assert_eq!(memory.table()[0].address, "0");
    }
}
