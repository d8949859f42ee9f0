// CPU components module
pub mod alu;
pub mod decoder;
pub mod engine;
pub mod instruction;
pub mod registers;
pub mod stage;

// Re-export the CPU types
pub use engine::{Engine, EngineState, StepOutcome};
pub use registers::Registers;
