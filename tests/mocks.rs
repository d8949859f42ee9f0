//! Mock observers for testing the simulation driver
//!
//! The mocks record every notification so tests can check what a renderer
//! would have been shown, and in which order.

#![allow(dead_code)]

use rusty_neumann::snapshot::EngineView;
use rusty_neumann::{EngineObserver, StepOutcome};
use std::sync::{Arc, Mutex};

/// One notification received by a mock observer
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Step {
        advanced: bool,
        halted_now: bool,
        cycle: u64,
        message: String,
    },
    Reload {
        message: String,
    },
}

/// Observer that logs notifications into a shared list
#[derive(Debug, Clone, Default)]
pub struct MockObserver {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn step_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, MockEvent::Step { .. }))
            .count()
    }

    pub fn reload_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, MockEvent::Reload { .. }))
            .count()
    }

    pub fn halt_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, MockEvent::Step { halted_now: true, .. }))
            .count()
    }
}

impl EngineObserver for MockObserver {
    fn on_step(&mut self, outcome: &StepOutcome, view: &EngineView) {
        self.events.lock().unwrap().push(MockEvent::Step {
            advanced: outcome.advanced,
            halted_now: outcome.halted_now,
            cycle: view.cycle,
            message: view.message.clone(),
        });
    }

    fn on_reload(&mut self, view: &EngineView) {
        self.events.lock().unwrap().push(MockEvent::Reload {
            message: view.message.clone(),
        });
    }
}

/// Observer that checks snapshot invariants on every step
#[derive(Debug, Clone, Default)]
pub struct InvariantChecker {
    violations: Arc<Mutex<Vec<String>>>,
    last_cycle: Arc<Mutex<Option<u64>>>,
}

impl InvariantChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> Vec<String> {
        self.violations.lock().unwrap().clone()
    }
}

impl EngineObserver for InvariantChecker {
    fn on_step(&mut self, outcome: &StepOutcome, view: &EngineView) {
        let mut violations = self.violations.lock().unwrap();
        if outcome.message != view.message {
            violations.push(format!("message mismatch at cycle {}", view.cycle));
        }
        if view.program_counter.len() != 4 {
            violations.push(format!("program counter '{}' is not 4 bits", view.program_counter));
        }
        for register in &view.registers {
            if !register.value.chars().all(|c| c == '0' || c == '1') {
                violations.push(format!("{} is not binary", register.name));
            }
        }
        let mut last_cycle = self.last_cycle.lock().unwrap();
        if let Some(previous) = *last_cycle {
            if view.cycle < previous {
                violations.push(format!("cycle went backwards: {} -> {}", previous, view.cycle));
            }
        }
        *last_cycle = Some(view.cycle);
    }

    fn on_reload(&mut self, _view: &EngineView) {
        *self.last_cycle.lock().unwrap() = None;
    }
}
