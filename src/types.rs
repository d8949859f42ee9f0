use serde::Serialize;
use std::fmt;

use crate::error::{SimError, SimResult};

/// Width of addresses, the program counter and instruction fields
pub const ADDRESS_WIDTH: u8 = 4;
/// Width of data words, the accumulator and whole instructions
pub const DATA_WIDTH: u8 = 8;
/// Widest word the simulator can hold
pub const MAX_WIDTH: u8 = 8;

/// Fixed-width unsigned bit pattern (1 to 8 bits)
/// The value always stays within [0, 2^width - 1]; arithmetic wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Word {
    value: u8,
    width: u8,
}

impl Word {
    /// Create a word, failing if the value does not fit in `width` bits
    /// Parameters: value - unsigned integer, width - bit width (1-8)
    /// Returns: Ok(Word) or Err(SimError::Range)
    pub fn from_unsigned(value: u32, width: u8) -> SimResult<Self> {
        let width = Self::check_width(width)?;
        if u64::from(value) > Self::mask_for(width) {
            return Err(SimError::Range {
                value: u64::from(value),
                width,
            });
        }
        Ok(Word {
            value: value as u8,
            width,
        })
    }

    /// Create a word by truncating the value to `width` bits
    pub fn wrapping(value: u32, width: u8) -> Self {
        let width = width.clamp(1, MAX_WIDTH);
        Word {
            value: (u64::from(value) & Self::mask_for(width)) as u8,
            width,
        }
    }

    pub fn zero(width: u8) -> Self {
        Self::wrapping(0, width)
    }

    /// 4-bit address / operand word
    pub fn nibble(value: u8) -> SimResult<Self> {
        Self::from_unsigned(u32::from(value), ADDRESS_WIDTH)
    }

    /// 8-bit data word
    pub fn byte(value: u8) -> Self {
        Word {
            value,
            width: DATA_WIDTH,
        }
    }

    /// Parse a binary string such as "0110" into a word of the string's length
    pub fn parse_binary(text: &str) -> SimResult<Self> {
        let digits = text.trim();
        if digits.is_empty() || digits.len() > MAX_WIDTH as usize {
            return Err(SimError::input_format(
                text,
                format!("expected 1 to {} binary digits", MAX_WIDTH),
            ));
        }
        let value = u8::from_str_radix(digits, 2)
            .map_err(|_| SimError::input_format(text, "not a binary number"))?;
        Self::from_unsigned(u32::from(value), digits.len() as u8)
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Interpret the bit pattern as a two's-complement signed number
    pub fn to_signed(&self) -> i16 {
        let sign_bit = 1u16 << (self.width - 1);
        let value = u16::from(self.value);
        if value & sign_bit != 0 {
            value as i16 - (1i16 << self.width)
        } else {
            value as i16
        }
    }

    /// Left-zero-padded binary string of the declared width
    pub fn to_binary_string(&self) -> String {
        format!("{:0width$b}", self.value, width = self.width as usize)
    }

    /// Same value re-expressed at another width (zero-extended or truncated)
    pub fn resize(&self, width: u8) -> Self {
        Self::wrapping(u32::from(self.value), width)
    }

    pub fn wrapping_add(&self, other: Word) -> Self {
        Self::wrapping(u32::from(self.value) + u32::from(other.value), self.width)
    }

    pub fn wrapping_sub(&self, other: Word) -> Self {
        let modulus = Self::mask_for(self.width) as u32 + 1;
        let other = u32::from(other.value) % modulus;
        Self::wrapping(u32::from(self.value) + modulus - other, self.width)
    }

    pub fn wrapping_mul(&self, other: Word) -> Self {
        Self::wrapping(u32::from(self.value) * u32::from(other.value), self.width)
    }

    /// Repeated multiplication modulo 2^width; x^0 = 1
    pub fn wrapping_pow(&self, exponent: Word) -> Self {
        let mut result = Self::wrapping(1, self.width);
        for _ in 0..exponent.value {
            result = result.wrapping_mul(*self);
        }
        result
    }

    pub fn bitwise_and(&self, other: Word) -> Self {
        Self::wrapping(u32::from(self.value & other.value), self.width)
    }

    pub fn bitwise_or(&self, other: Word) -> Self {
        Self::wrapping(u32::from(self.value | other.value), self.width)
    }

    /// Increment in place; returns false when the word wrapped to zero
    pub fn inc(&mut self) -> bool {
        *self = self.wrapping_add(Self::wrapping(1, self.width));
        self.value != 0
    }

    fn check_width(width: u8) -> SimResult<u8> {
        if width == 0 || width > MAX_WIDTH {
            return Err(SimError::Config(format!(
                "word width must be between 1 and {} bits, got {}",
                MAX_WIDTH, width
            )));
        }
        Ok(width)
    }

    fn mask_for(width: u8) -> u64 {
        (1u64 << width) - 1
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binary_string())
    }
}

impl From<Word> for u8 {
    fn from(word: Word) -> Self {
        word.value()
    }
}

pub fn add(a: Word, b: Word) -> Word {
    a.wrapping_add(b)
}

pub fn subtract(a: Word, b: Word) -> Word {
    a.wrapping_sub(b)
}
