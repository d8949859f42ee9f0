//! # Execution Engine
//!
//! Drives instructions through Fetch → Decode → Execute under one of three
//! scheduling modes:
//!
//! - **Simple**: one whole instruction per [`Engine::step`]
//! - **Staged**: one stage per step; binary programs use the register-transfer
//!   micro-steps (AR ← PC, DR ← M[AR], IR ← DR, decode, IN ← operand, execute,
//!   write back, PC ← PC + 1)
//! - **Pipelined**: a fixed-depth shift register of overlapping instructions
//!
//! The engine only advances when `step()` is called. Everything it exposes to
//! renderers goes through [`Engine::snapshot`].

use log::{debug, error, info, warn};
use serde::Serialize;

use super::alu;
use super::decoder::{self, OpcodeKind, OpcodeTable};
use super::instruction::{Instruction, Operation, RegisterId, SymbolicInstruction};
use super::registers::Registers;
use super::stage::{DataPath, MicroStep, PipelineSlot, Stage};
use crate::components::memory::program_memory::{AddressFormat, Cell, ProgramMemory};
use crate::components::memory::programs::{
    self, ProgramImage, BINARY_SPARE_ADDRESS, DEFAULT_BINARY_OPERANDS,
};
use crate::error::{SimError, SimResult};
use crate::input;
use crate::snapshot::{EngineView, RegisterView, SlotView};
use crate::system_config::{EngineConfig, ExecutionMode, ProgramKind};
use crate::types::{Word, ADDRESS_WIDTH, DATA_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EngineState {
    /// No operands loaded yet
    Idle,
    Running,
    /// Terminal until reset
    Halted,
}

/// Result of one `step()` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Whether the engine did any work
    pub advanced: bool,
    /// Whether this step moved the engine into Halted
    pub halted_now: bool,
    pub message: String,
}

impl StepOutcome {
    fn progress(message: impl Into<String>) -> Self {
        StepOutcome {
            advanced: true,
            halted_now: false,
            message: message.into(),
        }
    }

    fn idle(message: impl Into<String>) -> Self {
        StepOutcome {
            advanced: false,
            halted_now: false,
            message: message.into(),
        }
    }
}

/// What executing one instruction did
struct Effect {
    message: String,
    signals: Vec<DataPath>,
    halt: bool,
}

impl Effect {
    fn new(message: String, signals: Vec<DataPath>) -> Self {
        Effect {
            message,
            signals,
            halt: false,
        }
    }

    fn skip(message: String) -> Self {
        Self::new(message, Vec::new())
    }

    fn halt(message: String) -> Self {
        Effect {
            message,
            signals: vec![DataPath::Halt],
            halt: true,
        }
    }

    fn fault(err: SimError) -> Self {
        error!("Memory fault: {}", err);
        Effect {
            message: format!("Memory fault: {}", err),
            signals: Vec::new(),
            halt: true,
        }
    }
}

/// Stage cursor of Simple/Staged symbolic runs
#[derive(Debug, Clone)]
struct StagedCursor {
    stage: Stage,
    previous: Option<Stage>,
    current: Option<Instruction>,
}

impl Default for StagedCursor {
    fn default() -> Self {
        StagedCursor {
            stage: Stage::Fetch,
            previous: None,
            current: None,
        }
    }
}

/// Micro-step cursor of Simple/Staged binary runs
#[derive(Debug, Clone)]
struct MicroCursor {
    step: MicroStep,
    previous: Option<MicroStep>,
}

impl Default for MicroCursor {
    fn default() -> Self {
        MicroCursor {
            step: MicroStep::LoadAddress,
            previous: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    opcodes: OpcodeTable,
    state: EngineState,
    /// Program restored by reset()
    initial_memory: ProgramMemory,
    memory: ProgramMemory,
    registers: Registers,
    operands: Vec<(Word, Word)>,
    operation: Operation,
    /// Addresses of the STORE cells, one per operand pair
    result_slots: Vec<usize>,
    staged: StagedCursor,
    micro: MicroCursor,
    slots: Vec<PipelineSlot>,
    /// Set once the program counter wrapped past the last address
    fetch_exhausted: bool,
    pending_input: Option<(String, String, Operation)>,
    decoded_operation: Option<String>,
    signals: Vec<DataPath>,
    cycle: u64,
    last_message: String,
}

impl Engine {
    /// Create an Idle engine holding the canonical demo program
    /// Returns: Err(SimError::Config) if the configuration is invalid
    pub fn new(config: EngineConfig) -> SimResult<Self> {
        config.validate()?;
        let opcodes = OpcodeTable::new(config.locale);
        let initial_memory = match config.program {
            ProgramKind::Symbolic => programs::symbolic_demo(config.operand_pairs, Operation::Add),
            ProgramKind::Binary => {
                let (a, b) = DEFAULT_BINARY_OPERANDS;
                programs::binary_demo(Word::nibble(a)?, Word::nibble(b)?, Operation::Add, &opcodes)?
            }
        };
        let accumulator_width = Self::accumulator_width_for(&config);

        let mut engine = Engine {
            slots: vec![PipelineSlot::empty(); config.pipeline_depth],
            config,
            opcodes,
            state: EngineState::Idle,
            memory: initial_memory.clone(),
            initial_memory,
            registers: Registers::new(accumulator_width),
            operands: Vec::new(),
            operation: Operation::default(),
            result_slots: Vec::new(),
            staged: StagedCursor::default(),
            micro: MicroCursor::default(),
            fetch_exhausted: false,
            pending_input: None,
            decoded_operation: None,
            signals: Vec::new(),
            cycle: 0,
            last_message: String::new(),
        };
        engine.reset();
        Ok(engine)
    }

    /// Default engine for one mode/program combination
    pub fn with_mode(mode: ExecutionMode, program: ProgramKind) -> SimResult<Self> {
        Self::new(EngineConfig::new(mode, program))
    }

    /// Return to Idle with zeroed registers and the canonical program reloaded
    pub fn reset(&mut self) {
        self.memory = self.initial_memory.clone();
        self.clear_run_state();
        self.state = EngineState::Idle;
        self.operands.clear();
        self.operation = Operation::default();
        self.pending_input = None;
        self.last_message = "Enter two operands".to_string();
        info!("Engine reset ({:?}, {:?})", self.config.mode, self.config.program);
    }

    /// Parse two decimal operands and start the demo program with addition
    pub fn load_operands(&mut self, first: &str, second: &str) -> SimResult<()> {
        self.load_operands_with(first, second, Operation::Add)
    }

    /// Parse "a+b" or "a-b" and start the demo program
    pub fn load_expression(&mut self, expression: &str) -> SimResult<()> {
        let (first, second, operation) = input::parse_expression(expression).map_err(|e| {
            warn!("Rejected expression: {}", e);
            e
        })?;
        self.load_operands_with(&first, &second, operation)
    }

    /// Parse two decimal operands and start a fresh run of the demo program
    /// On failure nothing about the engine changes.
    /// Parameters: first, second - operand text, operation - ADD or SUB program
    /// Returns: Err(SimError::InputFormat) for non-numeric or too-wide operands
    pub fn load_operands_with(
        &mut self,
        first: &str,
        second: &str,
        operation: Operation,
    ) -> SimResult<()> {
        self.ensure_not_halted()?;
        let width = self.operand_width();
        let a = parse_operand(first, width).map_err(|e| {
            warn!("Rejected operand: {}", e);
            e
        })?;
        let b = parse_operand(second, width).map_err(|e| {
            warn!("Rejected operand: {}", e);
            e
        })?;

        let (memory, pairs) = match self.config.program {
            ProgramKind::Symbolic => {
                let pairs = (0..self.config.operand_pairs)
                    .map(|k| {
                        (
                            Word::wrapping(u32::from(a.value()) + k as u32, width),
                            Word::wrapping(u32::from(b.value()) + k as u32, width),
                        )
                    })
                    .collect();
                (
                    programs::symbolic_demo(self.config.operand_pairs, operation),
                    pairs,
                )
            }
            ProgramKind::Binary => (
                programs::binary_demo(a, b, operation, &self.opcodes)?,
                vec![(a, b)],
            ),
        };

        self.memory = memory;
        self.clear_run_state();
        self.operands = pairs;
        self.operation = operation;
        self.pending_input = None;
        self.state = EngineState::Running;
        self.last_message = format!(
            "Operands loaded: {} {} {}",
            a.value(),
            operation.symbol(),
            b.value()
        );
        info!("{}", self.last_message);
        Ok(())
    }

    /// Keep operand text for the next Step taken while Idle
    pub fn stage_operands(&mut self, first: &str, second: &str, operation: Operation) {
        debug!("Staged operands '{}' {} '{}'", first, operation.symbol(), second);
        self.pending_input = Some((first.to_string(), second.to_string(), operation));
    }

    /// Replace the demo with an explicit program image and start running it
    /// Symbolic images read whatever operands were loaded before.
    /// Returns: Err if the image is malformed or of the wrong program kind
    pub fn load_program(&mut self, image: ProgramImage) -> SimResult<()> {
        self.ensure_not_halted()?;
        let memory = image.into_memory()?;
        let matches_kind = matches!(
            (self.config.program, memory.format()),
            (ProgramKind::Symbolic, AddressFormat::Index)
                | (ProgramKind::Binary, AddressFormat::Binary)
        );
        if !matches_kind {
            return Err(SimError::Config(format!(
                "program image does not match the configured {:?} program kind",
                self.config.program
            )));
        }

        self.memory = memory;
        self.clear_run_state();
        self.pending_input = None;
        self.state = EngineState::Running;
        self.last_message = format!("Program loaded: {} cells", self.memory.len());
        info!("{}", self.last_message);
        Ok(())
    }

    /// Advance the engine by one unit of the configured mode
    /// A step while Halted does nothing; a step while Idle loads staged operands.
    pub fn step(&mut self) -> StepOutcome {
        let outcome = match self.state {
            EngineState::Halted => {
                return StepOutcome::idle("Program finished. Reset to run again.");
            }
            EngineState::Idle => self.load_pending_input(),
            EngineState::Running => {
                let outcome = match self.config.mode {
                    ExecutionMode::Simple => self.step_instruction(),
                    ExecutionMode::Staged => match self.config.program {
                        ProgramKind::Symbolic => self.step_symbolic_stage(),
                        ProgramKind::Binary => self.step_micro(),
                    },
                    ExecutionMode::Pipelined => self.step_pipeline(),
                };
                if outcome.advanced {
                    self.cycle += 1;
                }
                outcome
            }
        };

        debug!("cycle {}: {}", self.cycle, outcome.message);
        self.last_message = outcome.message.clone();
        outcome
    }

    /// Halted is left only through reset()
    fn ensure_not_halted(&self) -> SimResult<()> {
        if self.state == EngineState::Halted {
            warn!("Rejected load: engine is halted");
            return Err(SimError::Halted);
        }
        Ok(())
    }

    /// Step until Halted, at most `max_steps` times
    /// Returns: the snapshot taken after every step that did work
    pub fn run_to_halt(&mut self, max_steps: usize) -> Vec<EngineView> {
        let mut views = Vec::new();
        for _ in 0..max_steps {
            if self.state == EngineState::Halted {
                break;
            }
            if !self.step().advanced {
                break;
            }
            views.push(self.snapshot());
        }
        views
    }

    /// Read-only projection of the current state
    pub fn snapshot(&self) -> EngineView {
        let (slots, micro_step) = match (self.config.mode, self.config.program) {
            (ExecutionMode::Pipelined, _) => (
                self.slots
                    .iter()
                    .map(|slot| SlotView {
                        stage: slot.stage,
                        previous: slot.previous,
                        instruction: slot.instruction.as_ref().map(ToString::to_string),
                    })
                    .collect(),
                None,
            ),
            (_, ProgramKind::Symbolic) => (
                vec![SlotView {
                    stage: self.staged.stage,
                    previous: self.staged.previous,
                    instruction: self.staged.current.as_ref().map(ToString::to_string),
                }],
                None,
            ),
            (_, ProgramKind::Binary) => (
                vec![SlotView {
                    stage: self.micro.step.stage(),
                    previous: self.micro.previous.map(MicroStep::stage),
                    instruction: Some(self.registers.instruction.to_binary_string()),
                }],
                Some(self.micro.step),
            ),
        };

        EngineView {
            mode: self.config.mode,
            program: self.config.program,
            state: self.state,
            cycle: self.cycle,
            program_counter: self.registers.program_counter.to_binary_string(),
            accumulator: self.registers.accumulator.to_binary_string(),
            accumulator_value: self.registers.accumulator.value(),
            registers: self
                .registers
                .named()
                .into_iter()
                .map(|(name, value)| RegisterView {
                    name: name.to_string(),
                    value,
                })
                .collect(),
            memory: self.memory.table(),
            slots,
            micro_step,
            decoded_operation: self.decoded_operation.clone(),
            signals: self.signals.clone(),
            message: self.last_message.clone(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == EngineState::Halted
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn memory(&self) -> &ProgramMemory {
        &self.memory
    }

    pub fn opcodes(&self) -> &OpcodeTable {
        &self.opcodes
    }

    pub fn operands(&self) -> &[(Word, Word)] {
        &self.operands
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    fn accumulator_width_for(config: &EngineConfig) -> u8 {
        match config.program {
            ProgramKind::Symbolic => config.data_width,
            ProgramKind::Binary => DATA_WIDTH,
        }
    }

    fn operand_width(&self) -> u8 {
        match self.config.program {
            ProgramKind::Symbolic => self.config.data_width,
            ProgramKind::Binary => ADDRESS_WIDTH,
        }
    }

    /// Zero registers and cursors for a new run over the current memory
    fn clear_run_state(&mut self) {
        self.result_slots = programs::store_slots(&self.memory);
        self.registers.reset();
        self.staged = StagedCursor::default();
        self.micro = MicroCursor::default();
        self.slots = vec![PipelineSlot::empty(); self.config.pipeline_depth];
        self.fetch_exhausted = false;
        self.decoded_operation = None;
        self.signals.clear();
        self.cycle = 0;
    }

    fn load_pending_input(&mut self) -> StepOutcome {
        match self.pending_input.take() {
            Some((first, second, operation)) => {
                match self.load_operands_with(&first, &second, operation) {
                    Ok(()) => StepOutcome::progress(self.last_message.clone()),
                    Err(e) => StepOutcome::idle(e.to_string()),
                }
            }
            None => StepOutcome::idle("Enter two operands before stepping"),
        }
    }

    fn halt(&mut self, message: String) -> StepOutcome {
        self.state = EngineState::Halted;
        info!("Engine halted after {} cycles: {}", self.cycle + 1, message);
        StepOutcome {
            advanced: true,
            halted_now: true,
            message,
        }
    }

    fn fault(&mut self, err: SimError) -> StepOutcome {
        let effect = Effect::fault(err);
        self.signals.clear();
        self.halt(effect.message)
    }

    fn store_signals(&self) -> Vec<DataPath> {
        if self.config.store_signal {
            vec![DataPath::Store]
        } else {
            vec![DataPath::Load, DataPath::Add]
        }
    }

    /// One whole instruction: run the stage cursor back around to Fetch
    fn step_instruction(&mut self) -> StepOutcome {
        match self.config.program {
            ProgramKind::Symbolic => loop {
                let outcome = self.step_symbolic_stage();
                if self.state == EngineState::Halted || self.staged.stage == Stage::Fetch {
                    return outcome;
                }
            },
            ProgramKind::Binary => {
                let mut executed: Option<(String, Vec<DataPath>)> = None;
                loop {
                    let performed = self.micro.step;
                    let outcome = self.step_micro();
                    if performed == MicroStep::Execute {
                        executed = Some((outcome.message.clone(), self.signals.clone()));
                    }
                    if self.state == EngineState::Halted {
                        return outcome;
                    }
                    if self.micro.step == MicroStep::LoadAddress {
                        return match executed {
                            Some((message, signals)) => {
                                self.signals = signals;
                                StepOutcome::progress(message)
                            }
                            None => outcome,
                        };
                    }
                }
            }
        }
    }

    /// One stage of a symbolic instruction
    fn step_symbolic_stage(&mut self) -> StepOutcome {
        let stage = self.staged.stage;
        let pc = self.registers.pc();

        let (message, signals) = match stage {
            Stage::Fetch => {
                if self.fetch_exhausted || !self.memory.is_mapped(pc) {
                    self.signals.clear();
                    return self.halt("End of program reached".to_string());
                }
                let instruction = match self.memory.fetch(pc) {
                    Ok(instruction) => instruction,
                    Err(e) => return self.fault(e),
                };
                self.registers.address = self.registers.program_counter;
                let message = format!(
                    "FETCH {} from address {}",
                    instruction,
                    self.memory.format_address(pc)
                );
                self.staged.current = Some(instruction);
                (message, vec![DataPath::Fetch])
            }
            Stage::Decode => {
                let text = self
                    .staged
                    .current
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                (format!("DECODE ({})", text), vec![DataPath::Decode])
            }
            Stage::Done => {
                // the staged cursor wraps Execute -> Fetch and never rests on Done
                self.staged.stage = Stage::Fetch;
                return self.step_symbolic_stage();
            }
            Stage::Execute => {
                let instruction = self
                    .staged
                    .current
                    .clone()
                    .unwrap_or_else(|| Instruction::Unrecognized(String::new()));
                let effect = self.execute(&instruction);
                self.staged.previous = Some(stage);
                if effect.halt {
                    self.signals = effect.signals;
                    return self.halt(effect.message);
                }
                if !self.registers.advance_pc() {
                    self.fetch_exhausted = true;
                }
                (effect.message, effect.signals)
            }
        };

        self.staged.previous = Some(stage);
        self.staged.stage = stage.cycle();
        self.signals = signals;
        StepOutcome::progress(message)
    }

    /// One register-transfer step of a binary instruction
    fn step_micro(&mut self) -> StepOutcome {
        let step = self.micro.step;
        let number = step.number();
        let mut store_pending = false;

        let (message, signals) = match step {
            MicroStep::LoadAddress => {
                if self.fetch_exhausted {
                    self.signals.clear();
                    return self.halt("End of memory reached".to_string());
                }
                self.registers.address = self.registers.program_counter;
                (
                    format!(
                        "Step {}: address register <- program counter ({})",
                        number, self.registers.address
                    ),
                    vec![DataPath::Fetch],
                )
            }
            MicroStep::ReadMemory => {
                let address = usize::from(self.registers.address.value());
                let word = match self.memory.read(address) {
                    Ok(cell) => cell.as_word().unwrap_or_else(|| Word::zero(DATA_WIDTH)),
                    Err(e) => return self.fault(e),
                };
                self.registers.data = word;
                (
                    format!(
                        "Step {}: data register <- memory[{}] ({})",
                        number, self.registers.address, word
                    ),
                    vec![DataPath::Fetch],
                )
            }
            MicroStep::LoadInstruction => {
                self.registers.instruction = self.registers.data;
                (
                    format!(
                        "Step {}: instruction register <- {}",
                        number, self.registers.instruction
                    ),
                    vec![DataPath::Fetch],
                )
            }
            MicroStep::Decode => {
                let decoded = decoder::decode(self.registers.instruction);
                let name = self.opcodes.name_of(decoded.opcode).to_string();
                let message = format!(
                    "Step {}: operation {} ({}), value {}",
                    number, name, decoded.opcode, decoded.operand
                );
                self.decoded_operation = Some(name);
                (message, vec![DataPath::Decode])
            }
            MicroStep::LoadInput => {
                self.registers.input = decoder::decode(self.registers.instruction).operand;
                (
                    format!("Step {}: input register <- {}", number, self.registers.input),
                    vec![DataPath::Decode],
                )
            }
            MicroStep::Execute => {
                let decoded = decoder::decode(self.registers.instruction);
                let resolved = self
                    .opcodes
                    .resolve(decoded.opcode)
                    .map(|entry| (entry.kind, entry.name.clone()));
                match resolved {
                    Ok((OpcodeKind::Accumulate(op), name)) => {
                        let acc =
                            alu::accumulate(op, self.registers.accumulator, self.registers.input);
                        self.registers.accumulator = acc;
                        (
                            format!(
                                "Step {}: {} {} -> accumulator {} ({})",
                                number,
                                name,
                                self.registers.input.value(),
                                acc,
                                acc.value()
                            ),
                            vec![DataPath::Load, DataPath::Add],
                        )
                    }
                    Ok((OpcodeKind::Store, name)) => {
                        let target = self.registers.input;
                        self.registers.address = target;
                        self.registers.data = self
                            .memory
                            .peek(usize::from(target.value()))
                            .and_then(Cell::as_word)
                            .unwrap_or_else(|| Word::zero(DATA_WIDTH));
                        store_pending = true;
                        (
                            format!(
                                "Step {}: {}: address register <- {}, currently holding {}",
                                number, name, target, self.registers.data
                            ),
                            self.store_signals(),
                        )
                    }
                    Ok((OpcodeKind::Halt, name)) => {
                        self.micro.previous = Some(step);
                        let value = match self.save_final_accumulator() {
                            Ok(value) => value,
                            Err(e) => return self.fault(e),
                        };
                        self.signals = vec![DataPath::Halt];
                        return self.halt(format!(
                            "Step {}: {}, accumulator {} saved to {}, program finished",
                            number,
                            name,
                            value,
                            self.memory.format_address(usize::from(BINARY_SPARE_ADDRESS))
                        ));
                    }
                    Err(e) => {
                        warn!("{} at address {}", e, self.registers.program_counter);
                        (
                            format!(
                                "Step {}: {} opcode {}, nothing executed",
                                number,
                                self.opcodes.unknown_name(),
                                decoded.opcode
                            ),
                            Vec::new(),
                        )
                    }
                }
            }
            MicroStep::WriteBack => {
                let value = self.registers.accumulator.resize(DATA_WIDTH);
                let address = usize::from(self.registers.address.value());
                if let Err(e) = self.memory.write(address, Cell::Word(value)) {
                    return self.fault(e);
                }
                self.registers.data = value;
                (
                    format!(
                        "Step {}: memory[{}] <- accumulator ({})",
                        number, self.registers.address, value
                    ),
                    self.store_signals(),
                )
            }
            MicroStep::IncrementPc => {
                if !self.registers.advance_pc() {
                    self.fetch_exhausted = true;
                }
                (
                    format!(
                        "Step {}: program counter <- {}",
                        number, self.registers.program_counter
                    ),
                    vec![DataPath::Fetch],
                )
            }
        };

        debug!("{}", message);
        self.micro.previous = Some(step);
        self.micro.step = step.next(store_pending);
        self.signals = signals;
        StepOutcome::progress(message)
    }

    /// Advance every in-flight slot, then admit the next fetch at the tail
    fn step_pipeline(&mut self) -> StepOutcome {
        let mut slots = std::mem::take(&mut self.slots);
        let mut notes = Vec::new();
        let mut signals = Vec::new();
        let mut halted = false;

        // Oldest first; slots behind a HALT still move but have no effect.
        for slot in slots.iter_mut() {
            if !slot.is_in_flight() {
                continue;
            }
            slot.previous = Some(slot.stage);
            slot.stage = slot.stage.advance();
            if halted {
                continue;
            }
            let instruction = match &slot.instruction {
                Some(instruction) => instruction.clone(),
                None => continue,
            };
            match slot.stage {
                Stage::Decode => {
                    if let Instruction::Binary(word) = &instruction {
                        self.registers.instruction = *word;
                        let opcode = decoder::decode(*word).opcode;
                        self.decoded_operation = Some(self.opcodes.name_of(opcode).to_string());
                    }
                    notes.push(format!("DECODE {}", instruction));
                    signals.push(DataPath::Decode);
                }
                Stage::Execute => {
                    let effect = self.execute(&instruction);
                    notes.push(effect.message);
                    signals.extend(effect.signals);
                    if effect.halt {
                        slot.stage = Stage::Done;
                        halted = true;
                    }
                }
                Stage::Fetch | Stage::Done => {}
            }
        }

        if !halted {
            let pc = self.registers.pc();
            if !self.fetch_exhausted && self.memory.is_mapped(pc) {
                match self.memory.fetch(pc) {
                    Ok(instruction) => {
                        notes.push(format!(
                            "FETCH {} from address {}",
                            instruction,
                            self.memory.format_address(pc)
                        ));
                        slots.remove(0);
                        slots.push(PipelineSlot::fetched(instruction));
                        self.registers.address = self.registers.program_counter;
                        if !self.registers.advance_pc() {
                            self.fetch_exhausted = true;
                        }
                        signals.push(DataPath::Fetch);
                    }
                    Err(e) => {
                        notes.push(Effect::fault(e).message);
                        halted = true;
                    }
                }
            } else if !slots.iter().any(PipelineSlot::is_in_flight) {
                notes.push("pipeline drained".to_string());
                halted = true;
            }
        }

        self.slots = slots;
        signals.sort();
        signals.dedup();
        self.signals = signals;

        let message = if notes.is_empty() {
            "pipeline idle".to_string()
        } else {
            notes.join("; ")
        };
        if halted {
            self.halt(message)
        } else {
            StepOutcome::progress(message)
        }
    }

    fn execute(&mut self, instruction: &Instruction) -> Effect {
        match instruction {
            Instruction::Symbolic(instruction) => self.execute_symbolic(*instruction),
            Instruction::Binary(word) => self.execute_word(*word),
            Instruction::Unrecognized(text) => {
                warn!("Skipping unrecognised cell '{}'", text);
                Effect::skip(format!(
                    "EXECUTE {}: {}, skipped",
                    text,
                    self.opcodes.unknown_name()
                ))
            }
        }
    }

    fn operand(&self, register: RegisterId) -> Option<Word> {
        self.operands
            .get(register.pair_index())
            .map(|(a, b)| if register.is_first_of_pair() { *a } else { *b })
    }

    /// Decimal rendering of a result; subtraction results read as signed
    fn result_text(&self, value: Word) -> String {
        match self.operation {
            Operation::Add => value.value().to_string(),
            Operation::Subtract => value.to_signed().to_string(),
        }
    }

    fn execute_symbolic(&mut self, instruction: SymbolicInstruction) -> Effect {
        match instruction {
            SymbolicInstruction::Load(register) => match self.operand(register) {
                Some(value) => {
                    self.registers.accumulator = value;
                    Effect::new(
                        format!("EXECUTE {}: accumulator = {}", instruction, value.value()),
                        vec![DataPath::Fetch, DataPath::Load, DataPath::Add],
                    )
                }
                None => {
                    warn!("{} has no operand loaded", register);
                    Effect::skip(format!("EXECUTE {}: no operand in {}, skipped", instruction, register))
                }
            },
            SymbolicInstruction::Add(a, b) | SymbolicInstruction::Subtract(a, b) => {
                let operation = match instruction {
                    SymbolicInstruction::Subtract(..) => Operation::Subtract,
                    _ => Operation::Add,
                };
                match (self.operand(a), self.operand(b)) {
                    (Some(x), Some(y)) => {
                        let result = operation.apply(x, y);
                        self.registers.accumulator = result;
                        Effect::new(
                            format!(
                                "EXECUTE {}: accumulator = {}",
                                instruction,
                                self.result_text(result)
                            ),
                            vec![DataPath::Load, DataPath::Add],
                        )
                    }
                    _ => {
                        warn!("{} reads a register with no operand loaded", instruction);
                        Effect::skip(format!("EXECUTE {}: missing operand, skipped", instruction))
                    }
                }
            }
            SymbolicInstruction::Store => self.store_result(),
            SymbolicInstruction::Halt => Effect::halt("EXECUTE HALT: program finished".to_string()),
        }
    }

    /// Write the accumulator into the result cell of the first pair it matches
    fn store_result(&mut self) -> Effect {
        let acc = self.registers.accumulator;
        let operation = self.operation;
        let target = self
            .operands
            .iter()
            .position(|(a, b)| operation.apply(*a, *b) == acc)
            .and_then(|k| self.result_slots.get(k).map(|address| (k, *address)));

        let (pair, address) = match target {
            Some(target) => target,
            None => {
                warn!("No operand pair produces accumulator value {}", acc.value());
                return Effect::skip(format!(
                    "EXECUTE STORE ACC: no result cell for {}, skipped",
                    self.result_text(acc)
                ));
            }
        };

        let label = if self.operands.len() == 1 {
            format!("{} = {}", self.config.result_label, self.result_text(acc))
        } else {
            format!(
                "{}{} = {}",
                self.config.result_label,
                pair + 1,
                self.result_text(acc)
            )
        };
        if let Err(e) = self.memory.write(address, Cell::Text(label.clone())) {
            return Effect::fault(e);
        }
        Effect::new(
            format!(
                "EXECUTE STORE ACC: {} written to address {}",
                label,
                self.memory.format_address(address)
            ),
            self.store_signals(),
        )
    }

    /// Decode and execute a whole binary word at once (pipelined binary runs)
    fn execute_word(&mut self, word: Word) -> Effect {
        let decoded = decoder::decode(word);
        self.registers.instruction = word;
        self.registers.input = decoded.operand;
        let name = self.opcodes.name_of(decoded.opcode).to_string();
        self.decoded_operation = Some(name.clone());

        let kind = match self.opcodes.resolve(decoded.opcode) {
            Ok(entry) => entry.kind,
            Err(e) => {
                warn!("{} in word {}", e, word);
                return Effect::skip(format!("EXECUTE {}: {}, skipped", word, name));
            }
        };

        match kind {
            OpcodeKind::Accumulate(op) => {
                let acc = alu::accumulate(op, self.registers.accumulator, decoded.operand);
                self.registers.accumulator = acc;
                Effect::new(
                    format!(
                        "EXECUTE {} {}: accumulator = {} ({})",
                        name,
                        decoded.operand.value(),
                        acc,
                        acc.value()
                    ),
                    vec![DataPath::Load, DataPath::Add],
                )
            }
            OpcodeKind::Store => {
                let value = self.registers.accumulator.resize(DATA_WIDTH);
                self.registers.address = decoded.operand;
                self.registers.data = value;
                if let Err(e) = self
                    .memory
                    .write(usize::from(decoded.operand.value()), Cell::Word(value))
                {
                    return Effect::fault(e);
                }
                Effect::new(
                    format!(
                        "EXECUTE {}: {} written to address {}",
                        name, value, decoded.operand
                    ),
                    self.store_signals(),
                )
            }
            OpcodeKind::Halt => match self.save_final_accumulator() {
                Ok(value) => Effect::halt(format!(
                    "EXECUTE {}: accumulator {} saved to {}, program finished",
                    name,
                    value,
                    self.memory.format_address(usize::from(BINARY_SPARE_ADDRESS))
                )),
                Err(e) => Effect::fault(e),
            },
        }
    }

    /// A finishing binary program leaves its accumulator in the spare cell
    fn save_final_accumulator(&mut self) -> SimResult<Word> {
        let value = self.registers.accumulator.resize(DATA_WIDTH);
        self.memory
            .write(usize::from(BINARY_SPARE_ADDRESS), Cell::Word(value))?;
        Ok(value)
    }
}

/// Parse decimal operand text into a word of the given width
fn parse_operand(text: &str, width: u8) -> SimResult<Word> {
    let value: u32 = text
        .trim()
        .parse()
        .map_err(|_| SimError::input_format(text, "not a decimal number"))?;
    Word::from_unsigned(value, width)
        .map_err(|_| SimError::input_format(text, format!("does not fit in {} bits", width)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::cpu::decoder::Locale;

    fn new_engine(mode: ExecutionMode, program: ProgramKind) -> Engine {
        Engine::with_mode(mode, program).unwrap()
    }

    #[test]
    fn test_new_engine_is_idle_with_demo_program() {
        let engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.memory().len(), 5);
        assert_eq!(engine.registers().pc(), 0);
    }

    #[test]
    fn test_idle_step_without_input() {
        let mut engine = new_engine(ExecutionMode::Staged, ProgramKind::Symbolic);
        let outcome = engine.step();
        assert!(!outcome.advanced);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.cycle(), 0);
    }

    #[test]
    fn test_idle_step_loads_staged_operands() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        engine.stage_operands("2", "5", Operation::Add);
        let outcome = engine.step();
        assert!(outcome.advanced);
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.registers().pc(), 0);
        assert_eq!(engine.cycle(), 0);
    }

    #[test]
    fn test_idle_step_with_bad_staged_operands() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        engine.stage_operands("x", "5", Operation::Add);
        let outcome = engine.step();
        assert!(!outcome.advanced);
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(outcome.message.contains("not a decimal number"));
    }

    #[test]
    fn test_operand_width_checks() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        assert!(engine.load_operands("255", "0").is_ok());
        assert!(matches!(
            engine.load_operands("256", "0"),
            Err(SimError::InputFormat { .. })
        ));

        let mut binary = new_engine(ExecutionMode::Simple, ProgramKind::Binary);
        assert!(binary.load_operands("15", "1").is_ok());
        assert!(binary.load_operands("16", "1").is_err());
        assert!(binary.load_operands("-1", "1").is_err());
    }

    #[test]
    fn test_subtraction_result_reads_signed() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        engine.load_expression("3-4").unwrap();
        engine.run_to_halt(10);
        assert_eq!(engine.registers().accumulator.value(), 255);
        assert_eq!(engine.memory().table()[3].content, "RESULT = -1");
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Binary);
        engine
            .load_program(ProgramImage::binary(&[
                ("0000", "11110011"),
                ("0001", "00000010"),
                ("0010", "01110000"),
            ]))
            .unwrap();
        let outcome = engine.step();
        assert!(outcome.message.contains("Unknown"));
        assert_eq!(engine.state(), EngineState::Running);
        engine.step();
        assert_eq!(engine.registers().accumulator.value(), 2);
        assert!(engine.step().halted_now);
    }

    #[test]
    fn test_spanish_opcode_names() {
        let mut config = EngineConfig::new(ExecutionMode::Staged, ProgramKind::Binary);
        config.locale = Locale::Spanish;
        let mut engine = Engine::new(config).unwrap();
        engine.load_operands("1", "2").unwrap();
        for _ in 0..4 {
            engine.step();
        }
        assert_eq!(engine.snapshot().decoded_operation.as_deref(), Some("Sumar"));
    }

    #[test]
    fn test_store_signal_flag() {
        let mut config = EngineConfig::new(ExecutionMode::Simple, ProgramKind::Symbolic);
        config.store_signal = false;
        let mut engine = Engine::new(config).unwrap();
        engine.load_operands("1", "1").unwrap();
        for _ in 0..4 {
            engine.step();
        }
        assert_eq!(engine.snapshot().signals, vec![DataPath::Load, DataPath::Add]);

        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        engine.load_operands("1", "1").unwrap();
        for _ in 0..4 {
            engine.step();
        }
        assert_eq!(engine.snapshot().signals, vec![DataPath::Store]);
    }

    #[test]
    fn test_wrong_program_kind_rejected() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Symbolic);
        let err = engine
            .load_program(ProgramImage::binary(&[("0000", "01110000")]))
            .unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_program_without_halt_ends() {
        let mut engine = new_engine(ExecutionMode::Staged, ProgramKind::Symbolic);
        engine.load_operands("1", "2").unwrap();
        engine
            .load_program(ProgramImage::symbolic(&["LOAD R1", "LOAD R2"]))
            .unwrap();
        let views = engine.run_to_halt(20);
        assert_eq!(views.len(), 7);
        assert_eq!(engine.state(), EngineState::Halted);
        assert_eq!(engine.registers().accumulator.value(), 2);
    }

    #[test]
    fn test_staged_cursor_leaves_done_through_fetch() {
        let mut engine = new_engine(ExecutionMode::Staged, ProgramKind::Symbolic);
        engine.load_operands("3", "4").unwrap();
        engine.staged.stage = Stage::Done;
        let outcome = engine.step();
        assert!(outcome.message.starts_with("FETCH LOAD R1"));
        assert_eq!(engine.staged.stage, Stage::Decode);
        assert_eq!(engine.staged.previous, Some(Stage::Fetch));
    }

    #[test]
    fn test_binary_fault_halts() {
        let mut engine = new_engine(ExecutionMode::Simple, ProgramKind::Binary);
        engine
            .load_program(ProgramImage::binary(&[("0000", "00000001")]))
            .unwrap();
        engine.step();
        let outcome = engine.step();
        assert!(outcome.halted_now);
        assert!(outcome.message.contains("not mapped"));
        assert!(engine.is_halted());
    }
}
