// Memory components module
pub mod program_memory;
pub mod programs;

pub use program_memory::{Cell, ProgramMemory};
pub use programs::ProgramImage;
