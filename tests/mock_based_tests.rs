//! Mock-based tests for the simulation driver and its observers
//!
//! These tests attach mock observers to a `Simulation` and verify what they
//! are told while the engine runs.

mod mocks;

use mocks::*;
use rusty_neumann::input::CalculatorInput;
use rusty_neumann::observer::SnapshotRecorder;
use rusty_neumann::system_config::{ExecutionMode, ProgramKind};
use rusty_neumann::{Engine, Simulation};

fn simulation(mode: ExecutionMode, program: ProgramKind) -> Simulation {
    Simulation::new(Engine::with_mode(mode, program).unwrap())
}

#[cfg(test)]
mod notification_tests {
    use super::*;

    #[test]
    fn test_observer_sees_load_steps_and_halt() {
        let observer = MockObserver::new();
        let mut sim = simulation(ExecutionMode::Simple, ProgramKind::Symbolic);
        sim.add_observer(Box::new(observer.clone()));

        sim.load_expression("3+4").unwrap();
        let steps = sim.run_to_halt(50);

        assert_eq!(steps, 5);
        assert_eq!(observer.reload_count(), 1);
        assert_eq!(observer.step_count(), 5);
        assert_eq!(observer.halt_count(), 1);
        match observer.events().last() {
            Some(MockEvent::Step { cycle, halted_now, .. }) => {
                assert_eq!(*cycle, 5);
                assert!(*halted_now);
            }
            other => panic!("unexpected last event {:?}", other),
        }
    }

    #[test]
    fn test_steps_after_halt_are_reported_as_idle() {
        let observer = MockObserver::new();
        let mut sim = simulation(ExecutionMode::Staged, ProgramKind::Binary);
        sim.add_observer(Box::new(observer.clone()));
        sim.load_expression("1+1").unwrap();
        sim.run_to_halt(100);

        sim.step();
        match observer.events().last() {
            Some(MockEvent::Step { advanced, halted_now, .. }) => {
                assert!(!advanced);
                assert!(!halted_now);
            }
            other => panic!("unexpected last event {:?}", other),
        }
    }

    #[test]
    fn test_reset_notifies_observers() {
        let observer = MockObserver::new();
        let mut sim = simulation(ExecutionMode::Pipelined, ProgramKind::Symbolic);
        sim.add_observer(Box::new(observer.clone()));
        sim.reset();
        assert_eq!(
            observer.events(),
            vec![MockEvent::Reload {
                message: "Enter two operands".to_string()
            }]
        );
    }

    #[test]
    fn test_calculator_submit_flow() {
        let observer = MockObserver::new();
        let mut sim = simulation(ExecutionMode::Simple, ProgramKind::Binary);
        sim.add_observer(Box::new(observer.clone()));

        let mut input = CalculatorInput::new();
        for key in "6+7".chars() {
            input.push(key);
        }
        sim.submit(&mut input).unwrap();
        let steps = sim.run_to_halt(20);

        // one step loads the operands, four execute the binary program
        assert_eq!(steps, 5);
        assert_eq!(sim.engine().registers().accumulator.value(), 13);
        assert_eq!(observer.halt_count(), 1);
    }
}

#[cfg(test)]
mod invariant_tests {
    use super::*;

    #[test]
    fn test_snapshot_invariants_hold_in_every_mode() {
        for mode in [
            ExecutionMode::Simple,
            ExecutionMode::Staged,
            ExecutionMode::Pipelined,
        ] {
            for program in [ProgramKind::Symbolic, ProgramKind::Binary] {
                let checker = InvariantChecker::new();
                let mut sim = simulation(mode, program);
                sim.add_observer(Box::new(checker.clone()));
                sim.load_expression("5+9").unwrap();
                sim.run_to_halt(200);
                assert!(
                    checker.violations().is_empty(),
                    "{:?}/{:?}: {:?}",
                    mode,
                    program,
                    checker.violations()
                );
            }
        }
    }

    #[test]
    fn test_recorder_and_mock_agree() {
        let observer = MockObserver::new();
        let recorder = SnapshotRecorder::new();
        let mut sim = simulation(ExecutionMode::Staged, ProgramKind::Symbolic);
        sim.add_observer(Box::new(observer.clone()));
        sim.add_observer(Box::new(recorder.clone()));
        sim.load_expression("2+2").unwrap();
        sim.run_to_halt(100);

        let cycles: Vec<u64> = recorder.recorded().iter().map(|view| view.cycle).collect();
        let observed: Vec<u64> = observer
            .events()
            .iter()
            .filter_map(|event| match event {
                MockEvent::Step { cycle, .. } => Some(*cycle),
                MockEvent::Reload { .. } => None,
            })
            .collect();
        assert_eq!(cycles, observed);
        assert_eq!(cycles, (1..=15).collect::<Vec<u64>>());
    }
}
