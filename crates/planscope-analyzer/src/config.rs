//! Analyzer configuration
//!
//! Settings are read from a TOML file. Every field is optional; missing
//! fields take their default values.
//!
//! ```toml
//! enabled = true
//! mode = "summary"
//! log_to_file = true
//! plan_table = "APP.PLAN_TABLE"
//!
//! [thresholds]
//! cost_high = 50000.0
//! ```

use crate::assessment::AssessmentThresholds;
use crate::explain::{DEFAULT_PLAN_TABLE, PlanTableReader};
use planscope_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which analysis an inspection runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Full multi-step plan
    #[default]
    Detailed,
    /// Parent node estimate only
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Master switch; nothing is analyzed when false
    pub enabled: bool,
    pub mode: AnalysisMode,
    /// Print reports to standard output
    pub log_to_console: bool,
    /// Emit reports on the `planscope::report` log target
    pub log_to_file: bool,
    pub include_stack_trace: bool,
    /// Keep the SQL text on summaries
    pub include_query_text: bool,
    /// Frames kept when capturing the call stack
    pub max_stack_frames: usize,
    pub plan_table: String,
    pub thresholds: AssessmentThresholds,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: AnalysisMode::Detailed,
            log_to_console: true,
            log_to_file: false,
            include_stack_trace: true,
            include_query_text: true,
            max_stack_frames: 10,
            plan_table: DEFAULT_PLAN_TABLE.to_string(),
            thresholds: AssessmentThresholds::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Creates a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no analyzer config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Returns the per-user config location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("planscope").join("analyzer.toml"))
    }

    /// Checks the plan table name and thresholds
    pub fn validate(&self) -> Result<()> {
        self.plan_table_reader()?;
        self.thresholds.validate()
    }

    /// Builds a plan storage reader for the configured table
    pub fn plan_table_reader(&self) -> Result<PlanTableReader> {
        PlanTableReader::new().with_table(self.plan_table.clone())
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_log_to_console(mut self, enabled: bool) -> Self {
        self.log_to_console = enabled;
        self
    }

    pub fn with_log_to_file(mut self, enabled: bool) -> Self {
        self.log_to_file = enabled;
        self
    }

    pub fn with_include_stack_trace(mut self, include: bool) -> Self {
        self.include_stack_trace = include;
        self
    }

    pub fn with_include_query_text(mut self, include: bool) -> Self {
        self.include_query_text = include;
        self
    }

    pub fn with_plan_table(mut self, table: impl Into<String>) -> Self {
        self.plan_table = table.into();
        self
    }

    pub fn with_thresholds(mut self, thresholds: AssessmentThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}
