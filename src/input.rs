//! Calculator keypad buffer feeding operand text to the engine.

use crate::components::cpu::instruction::Operation;
use crate::error::{SimError, SimResult};

/// Characters typed on the calculator keypad
/// Only digits and the `+`/`-` operators are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculatorInput {
    buffer: String,
}

impl CalculatorInput {
    pub fn new() -> Self {
        CalculatorInput::default()
    }

    /// Append a key to the buffer
    /// Returns: false if the key is not part of the keypad
    pub fn push(&mut self, key: char) -> bool {
        if key.is_ascii_digit() || key == '+' || key == '-' {
            self.buffer.push(key);
            true
        } else {
            false
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Split the buffer into two operand texts and an operation
    /// The buffer is cleared only when the split succeeds.
    pub fn submit(&mut self) -> SimResult<(String, String, Operation)> {
        let parts = parse_expression(&self.buffer)?;
        self.buffer.clear();
        Ok(parts)
    }
}

/// Split "a+b" or "a-b" into ("a", "b", operation)
/// Returns: Err(InputFormat) unless there is exactly one operator with text on both sides
pub fn parse_expression(text: &str) -> SimResult<(String, String, Operation)> {
    let trimmed = text.trim();
    let operators: Vec<(usize, char)> = trimmed
        .char_indices()
        .filter(|(_, c)| *c == '+' || *c == '-')
        .collect();

    let (index, symbol) = match operators.as_slice() {
        [single] => *single,
        _ => {
            return Err(SimError::input_format(
                text,
                "expected two operands joined by + or -",
            ))
        }
    };

    let left = trimmed[..index].trim();
    let right = trimmed[index + 1..].trim();
    if left.is_empty() || right.is_empty() {
        return Err(SimError::input_format(text, "missing operand"));
    }

    let operation = if symbol == '+' {
        Operation::Add
    } else {
        Operation::Subtract
    };
    Ok((left.to_string(), right.to_string(), operation))
}
