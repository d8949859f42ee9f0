//! # Step Observers
//!
//! Renderers never read engine fields directly. A [`Simulation`] owns the
//! engine, steps it on request and hands every observer the outcome together
//! with a fresh [`EngineView`].

use log::{debug, info};
use std::sync::{Arc, Mutex};

use crate::components::cpu::engine::{Engine, StepOutcome};
use crate::error::SimResult;
use crate::input::CalculatorInput;
use crate::snapshot::EngineView;

/// Receives a snapshot after every engine transition
pub trait EngineObserver {
    fn on_step(&mut self, outcome: &StepOutcome, view: &EngineView);

    /// Called after reset and after new operands or programs are loaded
    fn on_reload(&mut self, _view: &EngineView) {}
}

/// Engine plus the observers that watch it
pub struct Simulation {
    engine: Engine,
    observers: Vec<Box<dyn EngineObserver>>,
}

impl Simulation {
    pub fn new(engine: Engine) -> Self {
        Simulation {
            engine,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn EngineObserver>) {
        self.observers.push(observer);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn snapshot(&self) -> EngineView {
        self.engine.snapshot()
    }

    pub fn step(&mut self) -> StepOutcome {
        let outcome = self.engine.step();
        let view = self.engine.snapshot();
        for observer in self.observers.iter_mut() {
            observer.on_step(&outcome, &view);
        }
        outcome
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.notify_reload();
    }

    /// Load "a+b" / "a-b" and start running immediately
    pub fn load_expression(&mut self, expression: &str) -> SimResult<()> {
        self.engine.load_expression(expression)?;
        self.notify_reload();
        Ok(())
    }

    /// Take the calculator buffer as the next run's operands
    /// The engine is reset and picks the operands up on its next step.
    pub fn submit(&mut self, input: &mut CalculatorInput) -> SimResult<()> {
        let (first, second, operation) = input.submit()?;
        self.engine.reset();
        self.engine.stage_operands(&first, &second, operation);
        self.notify_reload();
        Ok(())
    }

    /// Step until the engine halts or stops making progress
    /// Returns: the number of steps that did work
    pub fn run_to_halt(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && !self.engine.is_halted() {
            if !self.step().advanced {
                break;
            }
            steps += 1;
        }
        steps
    }

    fn notify_reload(&mut self) {
        let view = self.engine.snapshot();
        for observer in self.observers.iter_mut() {
            observer.on_reload(&view);
        }
    }
}

/// Writes every step to the `log` facade
#[derive(Debug, Default)]
pub struct LogObserver;

impl EngineObserver for LogObserver {
    fn on_step(&mut self, outcome: &StepOutcome, view: &EngineView) {
        info!("{}", view.summary());
        debug!("signals {:?}, slots {:?}", view.signals, view.slots);
        if outcome.halted_now {
            info!("Program halted after {} cycles", view.cycle);
        }
    }

    fn on_reload(&mut self, view: &EngineView) {
        info!("Reloaded: {}", view.message);
    }
}

/// Keeps every snapshot it sees; clones share the same recording
#[derive(Debug, Clone, Default)]
pub struct SnapshotRecorder {
    views: Arc<Mutex<Vec<EngineView>>>,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        SnapshotRecorder::default()
    }

    pub fn recorded(&self) -> Vec<EngineView> {
        self.views
            .lock()
            .map(|views| views.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.views.lock().map(|views| views.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EngineObserver for SnapshotRecorder {
    fn on_step(&mut self, _outcome: &StepOutcome, view: &EngineView) {
        if let Ok(mut views) = self.views.lock() {
            views.push(view.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::cpu::engine::EngineState;
    use crate::system_config::{ExecutionMode, ProgramKind};

    fn simulation() -> Simulation {
        Simulation::new(Engine::with_mode(ExecutionMode::Simple, ProgramKind::Symbolic).unwrap())
    }

    #[test]
    fn test_recorder_sees_every_step() {
        let recorder = SnapshotRecorder::new();
        let mut sim = simulation();
        sim.add_observer(Box::new(recorder.clone()));
        sim.load_expression("3+4").unwrap();
        assert_eq!(sim.run_to_halt(50), 5);
        assert_eq!(recorder.len(), 5);
        assert_eq!(
            recorder.recorded().last().map(|view| view.state),
            Some(EngineState::Halted)
        );
    }

    #[test]
    fn test_submit_stages_operands_for_next_step() {
        let mut sim = simulation();
        let mut input = CalculatorInput::new();
        for key in "2+2".chars() {
            input.push(key);
        }
        sim.submit(&mut input).unwrap();
        assert_eq!(sim.engine().state(), EngineState::Idle);
        assert!(sim.step().advanced);
        assert_eq!(sim.engine().state(), EngineState::Running);
        assert!(input.is_empty());
    }

    #[test]
    fn test_run_to_halt_stops_when_idle() {
        let mut sim = simulation();
        assert_eq!(sim.run_to_halt(10), 0);
    }
}
