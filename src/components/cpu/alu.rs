//! Accumulator ALU: pure fixed-width arithmetic with wraparound and no flags.

use serde::Serialize;

use crate::types::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AluOp {
    Add,
    Subtract,
    Multiply,
    Power,
    And,
    Or,
}

/// Combine the accumulator with an operand and return the new accumulator
/// The operand is zero-extended to the accumulator width first. Never fails.
pub fn accumulate(op: AluOp, acc: Word, operand: Word) -> Word {
    let operand = operand.resize(acc.width());
    match op {
        AluOp::Add => acc.wrapping_add(operand),
        AluOp::Subtract => acc.wrapping_sub(operand),
        AluOp::Multiply => acc.wrapping_mul(operand),
        AluOp::Power => acc.wrapping_pow(operand),
        AluOp::And => acc.bitwise_and(operand),
        AluOp::Or => acc.bitwise_or(operand),
    }
}
