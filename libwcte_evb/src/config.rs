use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{
    CHANNELS_PER_DIGITIZER, DEFAULT_IDLE_THRESHOLD_SECONDS, DEFAULT_REPORT_INTERVAL,
    DEFAULT_UNMATCHED_PREVIEW_LENGTH, NUMBER_OF_DIGITIZERS, NUMBER_OF_MODULES,
};
use super::error::ConfigError;
use super::event_builder::BuilderConfig;
use super::module::ModuleMask;

/// Structure representing the application configuration. Contains pathing, run and event building information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub trace_path: PathBuf,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
    /// D300, D301, D302, D303, TRB0
    pub enabled_modules: [bool; NUMBER_OF_MODULES],
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u32,
    #[serde(default = "default_preview_length")]
    pub unmatched_preview_length: usize,
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
    /// Which channels of each digitizer are stored, D300 to D303
    #[serde(default = "default_channel_readout")]
    pub channel_readout: [[bool; CHANNELS_PER_DIGITIZER]; NUMBER_OF_DIGITIZERS],
}

fn default_idle_threshold() -> u32 {
    DEFAULT_IDLE_THRESHOLD_SECONDS
}

fn default_preview_length() -> usize {
    DEFAULT_UNMATCHED_PREVIEW_LENGTH
}

fn default_report_interval() -> u64 {
    DEFAULT_REPORT_INTERVAL
}

fn default_channel_readout() -> [[bool; CHANNELS_PER_DIGITIZER]; NUMBER_OF_DIGITIZERS] {
    [[true; CHANNELS_PER_DIGITIZER]; NUMBER_OF_DIGITIZERS]
}

impl Default for Config {
    /// Generate a new Config object. Paths will be invalid; the digitizers are enabled and the TDC is not
    fn default() -> Self {
        Self {
            trace_path: PathBuf::from("None"),
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
            enabled_modules: [true, true, true, true, false],
            idle_threshold_seconds: DEFAULT_IDLE_THRESHOLD_SECONDS,
            unmatched_preview_length: DEFAULT_UNMATCHED_PREVIEW_LENGTH,
            report_interval: DEFAULT_REPORT_INTERVAL,
            channel_readout: default_channel_readout(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check that the configuration can actually be used to build events
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        if !self.any_module_enabled() {
            return Err(ConfigError::NoModulesEnabled);
        }
        Ok(())
    }

    /// Check if a specific run exists by evaluating the existance of its trace file
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.trace_path.join(self.get_run_file_str(run_number)).exists()
    }

    /// Get the path to the trace file of a run
    pub fn get_trace_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let trace_file_path = self.trace_path.join(self.get_run_file_str(run_number));
        if trace_file_path.exists() {
            Ok(trace_file_path)
        } else {
            Err(ConfigError::BadFilePath(trace_file_path))
        }
    }

    /// Construct the run file name using the WCTE run format
    fn get_run_file_str(&self, run_number: i32) -> String {
        format!("run_{run_number:0>4}.yaml")
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn any_module_enabled(&self) -> bool {
        self.enabled_modules.iter().any(|e| *e)
    }

    /// The settings handed to each EventBuilder
    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            enabled: ModuleMask::from_flags(&self.enabled_modules),
            idle_threshold_seconds: self.idle_threshold_seconds,
            unmatched_preview_length: self.unmatched_preview_length,
            report_interval: self.report_interval,
            channel_readout: self.channel_readout,
        }
    }
}
