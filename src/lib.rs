//! # Rusty Neumann Library
//!
//! A stepping simulator of a stored-program (Von Neumann) calculator.
//!
//! This library provides:
//! - Fixed-width words, a shared code/data memory and an 8-entry opcode table
//! - One execution engine with Simple, Staged and Pipelined scheduling over
//!   symbolic or binary-encoded programs
//! - Read-only snapshots and step observers for renderers
//! - JSON-configurable engines and a terminal console

pub mod components;
pub mod console;
pub mod error;
pub mod input;
pub mod observer;
pub mod snapshot;
pub mod system_config;
pub mod types;

// Re-export commonly used items for easier importing
pub use components::cpu::engine::{Engine, EngineState, StepOutcome};
pub use components::cpu::instruction::Operation;
pub use components::memory::programs::ProgramImage;
pub use error::{SimError, SimResult};
pub use observer::{EngineObserver, Simulation};
pub use snapshot::EngineView;
pub use system_config::{EngineConfig, EngineFactory, ExecutionMode, ProgramKind};
pub use types::Word;
