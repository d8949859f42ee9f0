//! # JSON Configuration System
//!
//! Engine configurations are stored as JSON files and turned into ready
//! [`Engine`] instances by the [`EngineFactory`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rusty_neumann::system_config::EngineFactory;
//!
//! let factory = EngineFactory::new();
//! let engine = factory.create_from_json("configs/pipelined.json").expect("Could not create engine!");
//! println!("Created engine: {}", engine.config().name);
//! ```
//!
//! ## Configuration File Format
//!
//! Every field is optional and falls back to [`EngineConfig::default`].
//!
//! ```json
//! {
//!   "name": "Pipelined calculator",
//!   "description": "Two operand pairs through a 3-deep pipeline",
//!   "mode": "pipelined",
//!   "program": "symbolic",
//!   "pipeline_depth": 3,
//!   "data_width": 8,
//!   "operand_pairs": 2,
//!   "result_label": "RESULT",
//!   "store_signal": false,
//!   "locale": "english",
//!   "console": { "refresh_rate_ms": 100 }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::components::cpu::decoder::Locale;
use crate::components::cpu::engine::Engine;
use crate::components::memory::programs::MAX_PROGRAM_CELLS;
use crate::console::ConsoleConfig;
use crate::error::{SimError, SimResult};
use crate::types::MAX_WIDTH;

/// How many stages a single `step()` call covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One whole instruction per step
    #[default]
    Simple,
    /// One stage (or register-transfer step) per step
    Staged,
    /// A shift register of overlapping instructions
    Pipelined,
}

/// Representation of the loaded program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    /// Mnemonic text cells addressed from 0
    #[default]
    Symbolic,
    /// Packed 8-bit words at 4-bit addresses
    Binary,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub description: String,
    pub mode: ExecutionMode,
    pub program: ProgramKind,
    /// Number of pipeline slots, at least one per stage
    pub pipeline_depth: usize,
    /// Accumulator and operand width of symbolic programs
    pub data_width: u8,
    /// Operand pairs the symbolic demo program processes
    pub operand_pairs: usize,
    /// Prefix written into memory by STORE
    pub result_label: String,
    /// Whether STORE lights its own data path or reuses Load/Add
    pub store_signal: bool,
    pub locale: Locale,
    pub console: ConsoleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            name: "Von Neumann calculator".to_string(),
            description: String::new(),
            mode: ExecutionMode::default(),
            program: ProgramKind::default(),
            pipeline_depth: 3,
            data_width: 8,
            operand_pairs: 1,
            result_label: "RESULT".to_string(),
            store_signal: true,
            locale: Locale::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration for one mode/program combination
    pub fn new(mode: ExecutionMode, program: ProgramKind) -> Self {
        EngineConfig {
            mode,
            program,
            ..EngineConfig::default()
        }
    }

    /// Parse a configuration from JSON text and validate it
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| SimError::Config(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric limits the engine relies on
    /// Returns: Err(SimError::Config) naming the first offending field
    pub fn validate(&self) -> SimResult<()> {
        if self.pipeline_depth < 3 {
            return Err(SimError::Config(format!(
                "pipeline_depth must be at least 3, got {}",
                self.pipeline_depth
            )));
        }
        if self.data_width == 0 || self.data_width > MAX_WIDTH {
            return Err(SimError::Config(format!(
                "data_width must be between 1 and {}, got {}",
                MAX_WIDTH, self.data_width
            )));
        }
        if self.operand_pairs == 0 {
            return Err(SimError::Config("operand_pairs must be at least 1".to_string()));
        }
        let cells = self.operand_pairs * 4 + 1;
        if self.program == ProgramKind::Symbolic && cells > MAX_PROGRAM_CELLS {
            return Err(SimError::Config(format!(
                "{} operand pairs need {} cells, memory holds {}",
                self.operand_pairs, cells, MAX_PROGRAM_CELLS
            )));
        }
        Ok(())
    }
}

/// Builds engines from configuration files
pub struct EngineFactory;

impl EngineFactory {
    pub fn new() -> Self {
        EngineFactory
    }

    /// Load a JSON configuration file and build the engine it describes
    /// Parameters: json_path - path to the configuration file
    /// Returns: the engine in its Idle state, or a Config error
    pub fn create_from_json(&self, json_path: &str) -> SimResult<Engine> {
        let config = self.load_json_config(json_path)?;
        self.create_from_config(config)
    }

    pub fn create_from_config(&self, config: EngineConfig) -> SimResult<Engine> {
        log::info!(
            "Creating engine '{}' ({:?}, {:?})",
            config.name,
            config.mode,
            config.program
        );
        Engine::new(config)
    }

    pub fn load_json_config(&self, path: &str) -> SimResult<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("Failed to read config file '{}': {}", path, e)))?;

        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
            SimError::Config(format!("Failed to parse JSON config '{}': {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, ExecutionMode::Simple);
        assert_eq!(config.program, ProgramKind::Symbolic);
        assert_eq!(config.pipeline_depth, 3);
        assert_eq!(config.data_width, 8);
        assert!(config.store_signal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"mode": "staged", "program": "binary"}"#).unwrap();
        assert_eq!(config.mode, ExecutionMode::Staged);
        assert_eq!(config.program, ProgramKind::Binary);
        assert_eq!(config.result_label, "RESULT");
    }

    #[test]
    fn test_validation_limits() {
        let mut config = EngineConfig::default();
        config.pipeline_depth = 2;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));

        let mut config = EngineConfig::default();
        config.data_width = 9;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.operand_pairs = 4;
        assert!(config.validate().is_err());
        config.program = ProgramKind::Binary;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(SimError::Config(_))
        ));
        assert!(EngineConfig::from_json_str(r#"{"mode": "warp"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let factory = EngineFactory::new();
        assert!(factory.create_from_json("does/not/exist.json").is_err());
    }
}
