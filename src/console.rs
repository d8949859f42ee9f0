//! # Console Interface Module
//!
//! Terminal front-end for the stepping engine. The console only reads
//! [`EngineView`] snapshots; every state change goes through the
//! [`Simulation`] driver.
//!
//! ## Keys
//! - digits, `+`, `-`: calculator buffer
//! - Enter: submit the buffer as the next operands
//! - Space: step
//! - `r`: reset, `h`: help, `q`/Esc: quit

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, Instant};

use crate::components::cpu::stage::Stage;
use crate::input::CalculatorInput;
use crate::observer::Simulation;
use crate::snapshot::EngineView;
use crate::system_config::ProgramKind;

/// Refresh rate and panel toggles of the terminal front-end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub refresh_rate_ms: u64,
    pub show_memory: bool,
    pub show_registers: bool,
    pub show_signals: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 100,
            show_memory: true,
            show_registers: true,
            show_signals: true,
        }
    }
}

/// Terminal front-end: calculator buffer plus the simulation it drives
pub struct ConsoleApp {
    simulation: Simulation,
    config: ConsoleConfig,
    input: CalculatorInput,
    running: bool,
    show_help: bool,
    /// Feedback for rejected keypad input
    notice: Option<String>,
}

impl ConsoleApp {
    pub fn new(simulation: Simulation, config: ConsoleConfig) -> Self {
        Self {
            simulation,
            config,
            input: CalculatorInput::new(),
            running: false,
            show_help: false,
            notice: None,
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        enable_raw_mode().map_err(|e| format!("Failed to enable raw mode: {}", e))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)
            .map_err(|e| format!("Failed to enter alternate screen: {}", e))?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.running = true;
        let mut last_draw: Option<Instant> = None;
        let refresh = Duration::from_millis(self.config.refresh_rate_ms);

        while self.running {
            if event::poll(Duration::from_millis(10))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key.code);
                    last_draw = None;
                }
            }

            let due = last_draw.map_or(true, |at| at.elapsed() >= refresh);
            if due {
                let view = self.simulation.snapshot();
                terminal.draw(|f| self.draw_ui(f, &view))?;
                last_draw = Some(Instant::now());
            }
        }

        disable_raw_mode().map_err(|e| format!("Failed to disable raw mode: {}", e))?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| format!("Failed to leave alternate screen: {}", e))?;
        terminal
            .show_cursor()
            .map_err(|e| format!("Failed to show cursor: {}", e))?;

        Ok(())
    }

    pub fn handle_key_event(&mut self, key: KeyCode) {
        if self.show_help {
            self.show_help = false;
            return;
        }
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                log::debug!("Quit key pressed");
                self.running = false;
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                self.show_help = true;
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.input.clear();
                self.notice = None;
                self.simulation.reset();
            }
            KeyCode::Char(' ') => {
                self.notice = None;
                self.simulation.step();
            }
            KeyCode::Enter => match self.simulation.submit(&mut self.input) {
                Ok(()) => self.notice = None,
                Err(e) => self.notice = Some(e.to_string()),
            },
            KeyCode::Backspace => {
                self.input.backspace();
            }
            KeyCode::Char(c) => {
                if !self.input.push(c) {
                    log::debug!("Ignored key '{}'", c);
                }
            }
            _ => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn buffer(&self) -> &str {
        self.input.buffer()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    fn draw_ui(&self, f: &mut Frame, view: &EngineView) {
        let size = f.size();

        if self.show_help {
            self.draw_help_screen(f);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Title bar
                Constraint::Min(8),    // Main content
                Constraint::Length(4), // Calculator and message
            ])
            .split(size);

        let title_text = vec![
            Line::from(vec![Span::styled(
                format!(
                    "{} ({:?} / {:?})",
                    self.simulation.engine().config().name,
                    view.mode,
                    view.program
                ),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(vec![
                Span::styled("Space", Style::default().fg(Color::Yellow)),
                Span::raw("=step, "),
                Span::styled("Enter", Style::default().fg(Color::Yellow)),
                Span::raw("=submit, "),
                Span::styled("r", Style::default().fg(Color::Yellow)),
                Span::raw("=reset, "),
                Span::styled("h", Style::default().fg(Color::Yellow)),
                Span::raw("=help, "),
                Span::styled("q", Style::default().fg(Color::Yellow)),
                Span::raw("=quit"),
            ]),
        ];
        let title = Paragraph::new(title_text)
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .wrap(Wrap { trim: true });
        f.render_widget(title, chunks[0]);

        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        self.draw_cpu(f, content_chunks[0], view);
        if self.config.show_memory {
            self.draw_memory(f, content_chunks[1], view);
        }

        let mut bottom = vec![Line::from(vec![
            Span::raw("Input: "),
            Span::styled(
                self.input.buffer().to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ])];
        let message = match &self.notice {
            Some(notice) => Span::styled(notice.clone(), Style::default().fg(Color::Red)),
            None => Span::raw(view.message.clone()),
        };
        bottom.push(Line::from(vec![message]));
        let calculator = Paragraph::new(bottom)
            .block(Block::default().borders(Borders::ALL).title("Calculator"))
            .wrap(Wrap { trim: true });
        f.render_widget(calculator, chunks[2]);
    }

    fn draw_help_screen(&self, f: &mut Frame) {
        let size = f.size();
        let key = |name: &'static str, text: &'static str| {
            Line::from(vec![
                Span::styled(name, Style::default().fg(Color::Yellow)),
                Span::raw(text),
            ])
        };
        let help_text = vec![
            Line::from(vec![Span::styled(
                "Von Neumann Calculator Help",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            key("  0-9 + -", " - Type an expression such as 3+4"),
            key("  Enter", " - Use the expression as the next operands"),
            key("  Space", " - Advance the engine by one step"),
            key("  r", " - Reset to the demo program"),
            key("  Backspace", " - Delete character"),
            key("  q, Esc", " - Exit"),
            Line::from(""),
            Line::from(vec![Span::raw("Press any key to return to main view...")]),
        ];

        let help = Paragraph::new(help_text)
            .style(Style::default().fg(Color::White))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Help"));
        f.render_widget(help, size);
    }

    fn draw_cpu(&self, f: &mut Frame, area: Rect, view: &EngineView) {
        let mut lines = vec![Line::from(vec![Span::raw(format!(
            "State: {:?}   Cycle: {}",
            view.state, view.cycle
        ))])];

        if self.config.show_registers {
            for register in &view.registers {
                lines.push(Line::from(vec![
                    Span::raw(format!("{:<22}", register.name)),
                    Span::styled(register.value.clone(), Style::default().fg(Color::Green)),
                ]));
            }
        }
        if let Some(name) = &view.decoded_operation {
            lines.push(Line::from(vec![Span::raw(format!("Decoded: {}", name))]));
        }
        if let Some(step) = view.micro_step {
            lines.push(Line::from(vec![Span::raw(format!("Next step: {:?}", step))]));
        }

        lines.push(Line::from(""));
        for (index, slot) in view.slots.iter().enumerate() {
            let color = match slot.stage {
                Stage::Fetch => Color::Blue,
                Stage::Decode => Color::Magenta,
                Stage::Execute => Color::Yellow,
                Stage::Done => Color::DarkGray,
            };
            lines.push(Line::from(vec![
                Span::raw(format!("Slot {}: ", index)),
                Span::styled(format!("{:?}", slot.stage), Style::default().fg(color)),
                Span::raw(format!(
                    "  {}",
                    slot.instruction.as_deref().unwrap_or("-")
                )),
            ]));
        }

        if self.config.show_signals && !view.signals.is_empty() {
            let active: Vec<String> = view.signals.iter().map(|s| format!("{:?}", s)).collect();
            lines.push(Line::from(vec![Span::styled(
                format!("Active paths: {}", active.join(", ")),
                Style::default().fg(Color::Cyan),
            )]));
        }

        let widget = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("CPU"))
            .wrap(Wrap { trim: true });
        f.render_widget(widget, area);
    }

    fn draw_memory(&self, f: &mut Frame, area: Rect, view: &EngineView) {
        let pc_row = match view.program {
            ProgramKind::Binary => view.program_counter.clone(),
            ProgramKind::Symbolic => usize::from_str_radix(&view.program_counter, 2)
                .map(|pc| pc.to_string())
                .unwrap_or_default(),
        };
        let lines: Vec<Line> = view
            .memory
            .iter()
            .map(|row| {
                let style = if row.address == pc_row {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                Line::from(vec![Span::styled(
                    format!("{:>5}  {}", row.address, row.content),
                    style,
                )])
            })
            .collect();

        let widget = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Memory"))
            .wrap(Wrap { trim: true });
        f.render_widget(widget, area);
    }
}

/// Run the terminal front-end until the user quits
pub fn run_console(
    simulation: Simulation,
    config: ConsoleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = ConsoleApp::new(simulation, config);
    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::cpu::engine::{Engine, EngineState};
    use crate::system_config::ExecutionMode;

    fn app() -> ConsoleApp {
        let engine = Engine::with_mode(ExecutionMode::Simple, ProgramKind::Symbolic).unwrap();
        ConsoleApp::new(Simulation::new(engine), ConsoleConfig::default())
    }

    fn type_keys(app: &mut ConsoleApp, keys: &str) {
        for c in keys.chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_keypad_then_step() {
        let mut app = app();
        type_keys(&mut app, "3+4");
        assert_eq!(app.buffer(), "3+4");
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(app.buffer(), "");
        for _ in 0..6 {
            app.handle_key_event(KeyCode::Char(' '));
        }
        let view = app.simulation().snapshot();
        assert_eq!(view.state, EngineState::Halted);
        assert_eq!(view.accumulator_value, 7);
    }

    #[test]
    fn test_bad_submit_sets_notice() {
        let mut app = app();
        type_keys(&mut app, "12");
        app.handle_key_event(KeyCode::Enter);
        assert!(app.notice().is_some());
        assert_eq!(app.buffer(), "12");
    }

    #[test]
    fn test_quit_and_help() {
        let mut app = app();
        app.running = true;
        app.handle_key_event(KeyCode::Char('h'));
        app.handle_key_event(KeyCode::Char('q'));
        assert!(app.is_running());
        app.handle_key_event(KeyCode::Char('q'));
        assert!(!app.is_running());
    }
}
