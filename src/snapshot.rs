//! Read-only views of the engine handed to renderers and observers.

use serde::Serialize;

use crate::components::cpu::engine::EngineState;
use crate::components::cpu::stage::{DataPath, MicroStep, Stage};
use crate::components::memory::program_memory::MemoryRow;
use crate::error::{SimError, SimResult};
use crate::system_config::{ExecutionMode, ProgramKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterView {
    pub name: String,
    pub value: String,
}

/// Stage of one in-flight instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub stage: Stage,
    /// Stage performed by the last step (Simple/Staged runs)
    pub previous: Option<Stage>,
    pub instruction: Option<String>,
}

/// Immutable projection of the engine after a step
/// Register and accumulator values are binary strings of their declared width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineView {
    pub mode: ExecutionMode,
    pub program: ProgramKind,
    pub state: EngineState,
    pub cycle: u64,
    pub program_counter: String,
    pub accumulator: String,
    pub accumulator_value: u8,
    pub registers: Vec<RegisterView>,
    pub memory: Vec<MemoryRow>,
    pub slots: Vec<SlotView>,
    /// Next register-transfer step of binary Simple/Staged runs
    pub micro_step: Option<MicroStep>,
    pub decoded_operation: Option<String>,
    pub signals: Vec<DataPath>,
    pub message: String,
}

impl EngineView {
    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SimError::Config(format!("Failed to serialize snapshot: {}", e)))
    }

    /// Value of a named register, e.g. "Data Register"
    pub fn register(&self, name: &str) -> Option<&str> {
        self.registers
            .iter()
            .find(|register| register.name == name)
            .map(|register| register.value.as_str())
    }

    /// Content of the memory row printed with this address
    pub fn memory_at(&self, address: &str) -> Option<&str> {
        self.memory
            .iter()
            .find(|row| row.address == address)
            .map(|row| row.content.as_str())
    }

    /// One-line summary for batch output
    pub fn summary(&self) -> String {
        format!(
            "[{:>3}] {:?} PC={} ACC={} ({}) | {}",
            self.cycle,
            self.state,
            self.program_counter,
            self.accumulator,
            self.accumulator_value,
            self.message
        )
    }
}
