//! # Simulator Errors
//!
//! Every fallible operation in the crate returns [`SimResult`]. Errors are
//! local to the call that raised them: the engine turns them into status
//! messages at the step boundary instead of propagating them further.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A value does not fit in the declared bit width.
    #[error("value {value} does not fit in {width} bits")]
    Range { value: u64, width: u8 },

    /// Operand text from the calculator could not be used.
    #[error("invalid operand '{text}': {reason}")]
    InputFormat { text: String, reason: String },

    /// Memory access beyond the declared address range.
    #[error("address {address} is outside memory of {capacity} cells")]
    AddressOutOfRange { address: usize, capacity: usize },

    /// Read of an address inside the range that holds no cell.
    #[error("address {address} is not mapped")]
    UnmappedAddress { address: usize },

    #[error("unknown opcode {opcode:04b}")]
    UnknownOpcode { opcode: u8 },

    #[error("unrecognised instruction '{0}'")]
    UnknownMnemonic(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Loading into an engine that finished its run; only reset leaves Halted.
    #[error("engine is halted, reset before loading")]
    Halted,
}

impl SimError {
    pub fn input_format(text: &str, reason: impl Into<String>) -> Self {
        SimError::InputFormat {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SimResult<T = ()> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::UnknownOpcode { opcode: 0b1010 };
        assert_eq!(err.to_string(), "unknown opcode 1010");

        let err = SimError::input_format("abc", "not a decimal number");
        assert_eq!(
            err.to_string(),
            "invalid operand 'abc': not a decimal number"
        );
        assert_eq!(
            SimError::Halted.to_string(),
            "engine is halted, reset before loading"
        );
    }
}
