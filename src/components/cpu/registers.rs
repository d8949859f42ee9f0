use serde::Serialize;

use crate::types::{Word, ADDRESS_WIDTH, DATA_WIDTH};

/// Named register file of the Von Neumann machine
/// All slots are zero-initialized on reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registers {
    /// Running result (data width)
    pub accumulator: Word,
    /// Address of the next instruction (address width)
    pub program_counter: Word,
    /// Address latched for the current memory access
    pub address: Word,
    /// Instruction being decoded
    pub instruction: Word,
    /// Word last read from or about to be written to memory
    pub data: Word,
    /// Operand field handed to the ALU
    pub input: Word,
}

impl Registers {
    /// Create a zeroed register file
    /// Parameters: data_width - accumulator width in bits
    pub fn new(data_width: u8) -> Self {
        Registers {
            accumulator: Word::zero(data_width),
            program_counter: Word::zero(ADDRESS_WIDTH),
            address: Word::zero(ADDRESS_WIDTH),
            instruction: Word::zero(DATA_WIDTH),
            data: Word::zero(DATA_WIDTH),
            input: Word::zero(ADDRESS_WIDTH),
        }
    }

    pub fn reset(&mut self) {
        *self = Registers::new(self.accumulator.width());
    }

    pub fn pc(&self) -> usize {
        usize::from(self.program_counter.value())
    }

    /// Move the program counter forward
    /// Returns: false when the counter wrapped past the end of the address space
    pub fn advance_pc(&mut self) -> bool {
        self.program_counter.inc()
    }

    /// (name, binary string) pairs in display order
    pub fn named(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Program Counter", self.program_counter.to_binary_string()),
            ("Address Register", self.address.to_binary_string()),
            ("Instruction Register", self.instruction.to_binary_string()),
            ("Data Register", self.data.to_binary_string()),
            ("Input Register", self.input.to_binary_string()),
            ("Accumulator", self.accumulator.to_binary_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_widths() {
        let registers = Registers::new(8);
        assert_eq!(registers.program_counter.to_binary_string(), "0000");
        assert_eq!(registers.instruction.to_binary_string(), "00000000");
        assert_eq!(registers.input.width(), 4);
        assert_eq!(registers.accumulator.width(), 8);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut registers = Registers::new(6);
        registers.accumulator = Word::wrapping(42, 6);
        registers.advance_pc();
        registers.data = Word::byte(7);
        registers.reset();
        assert_eq!(registers, Registers::new(6));
        assert_eq!(registers.pc(), 0);
    }

    #[test]
    fn test_named_order() {
        let names: Vec<&str> = Registers::new(8).named().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names[0], "Program Counter");
        assert_eq!(names[5], "Accumulator");
    }
}
