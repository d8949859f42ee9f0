//! Stage types of the fetch/decode/execute state machine and their explicit
//! transition functions. Nothing here relies on enum declaration order.

use serde::Serialize;

use super::instruction::Instruction;

/// Coarse phase of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Fetch,
    Decode,
    Execute,
    Done,
}

impl Stage {
    /// Successor inside a pipeline slot; Done is terminal
    pub fn advance(self) -> Stage {
        match self {
            Stage::Fetch => Stage::Decode,
            Stage::Decode => Stage::Execute,
            Stage::Execute => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }

    /// Successor for the staged cursor, which starts a new instruction after Execute
    pub fn cycle(self) -> Stage {
        match self {
            Stage::Fetch => Stage::Decode,
            Stage::Decode => Stage::Execute,
            Stage::Execute | Stage::Done => Stage::Fetch,
        }
    }

    pub fn is_in_flight(self) -> bool {
        self != Stage::Done
    }
}

/// Register-transfer step of the binary machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MicroStep {
    /// AR <- PC
    LoadAddress,
    /// DR <- M[AR]
    ReadMemory,
    /// IR <- DR
    LoadInstruction,
    /// Split IR into opcode and operand
    Decode,
    /// IN <- operand
    LoadInput,
    /// ACC <- ALU(ACC, IN), or latch the store target
    Execute,
    /// M[AR] <- ACC, second half of a store
    WriteBack,
    /// PC <- PC + 1
    IncrementPc,
}

impl MicroStep {
    /// Coarse stage this micro-step belongs to
    pub fn stage(self) -> Stage {
        match self {
            MicroStep::LoadAddress | MicroStep::ReadMemory | MicroStep::LoadInstruction => {
                Stage::Fetch
            }
            MicroStep::Decode | MicroStep::LoadInput => Stage::Decode,
            MicroStep::Execute | MicroStep::WriteBack | MicroStep::IncrementPc => Stage::Execute,
        }
    }

    /// Next micro-step; `store_pending` routes Execute through WriteBack
    pub fn next(self, store_pending: bool) -> MicroStep {
        match self {
            MicroStep::LoadAddress => MicroStep::ReadMemory,
            MicroStep::ReadMemory => MicroStep::LoadInstruction,
            MicroStep::LoadInstruction => MicroStep::Decode,
            MicroStep::Decode => MicroStep::LoadInput,
            MicroStep::LoadInput => MicroStep::Execute,
            MicroStep::Execute if store_pending => MicroStep::WriteBack,
            MicroStep::Execute | MicroStep::WriteBack => MicroStep::IncrementPc,
            MicroStep::IncrementPc => MicroStep::LoadAddress,
        }
    }

    /// 1-based position used in status messages
    pub fn number(self) -> u8 {
        match self {
            MicroStep::LoadAddress => 1,
            MicroStep::ReadMemory => 2,
            MicroStep::LoadInstruction => 3,
            MicroStep::Decode => 4,
            MicroStep::LoadInput => 5,
            MicroStep::Execute => 6,
            MicroStep::WriteBack => 7,
            MicroStep::IncrementPc => 8,
        }
    }
}

/// One entry of the pipeline shift register
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSlot {
    pub stage: Stage,
    /// Stage held before the last advance
    pub previous: Option<Stage>,
    pub instruction: Option<Instruction>,
}

impl PipelineSlot {
    pub fn empty() -> Self {
        PipelineSlot {
            stage: Stage::Done,
            previous: None,
            instruction: None,
        }
    }

    pub fn fetched(instruction: Instruction) -> Self {
        PipelineSlot {
            stage: Stage::Fetch,
            previous: None,
            instruction: Some(instruction),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.instruction.is_some() && self.stage.is_in_flight()
    }
}

/// Data path an observer may highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DataPath {
    Fetch,
    Decode,
    Load,
    Add,
    Store,
    Halt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_stage_transitions() {
        assert_eq!(Stage::Fetch.advance(), Stage::Decode);
        assert_eq!(Stage::Decode.advance(), Stage::Execute);
        assert_eq!(Stage::Execute.advance(), Stage::Done);
        assert_eq!(Stage::Done.advance(), Stage::Done);
    }

    #[test]
    fn test_staged_cursor_wraps() {
        assert_eq!(Stage::Execute.cycle(), Stage::Fetch);
        assert_eq!(Stage::Fetch.cycle(), Stage::Decode);
    }

    #[test]
    fn test_micro_step_sequence() {
        let mut step = MicroStep::LoadAddress;
        let mut visited = vec![step];
        for _ in 0..6 {
            step = step.next(false);
            visited.push(step);
        }
        assert_eq!(visited.last(), Some(&MicroStep::IncrementPc));
        assert!(!visited.contains(&MicroStep::WriteBack));
        assert_eq!(MicroStep::Execute.next(true), MicroStep::WriteBack);
        assert_eq!(MicroStep::IncrementPc.next(false), MicroStep::LoadAddress);
    }

    #[test]
    fn test_micro_steps_map_to_stages() {
        assert_eq!(MicroStep::ReadMemory.stage(), Stage::Fetch);
        assert_eq!(MicroStep::LoadInput.stage(), Stage::Decode);
        assert_eq!(MicroStep::WriteBack.stage(), Stage::Execute);
    }

    #[test]
    fn test_empty_slot_is_not_in_flight() {
        assert!(!PipelineSlot::empty().is_in_flight());
        assert!(PipelineSlot::fetched(Instruction::Unrecognized("?".to_string())).is_in_flight());
    }
}
