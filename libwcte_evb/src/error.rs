use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    #[error("Invalid module index {0} found; expected a value less than {max}", max=NUMBER_OF_MODULES)]
    BadModuleIndex(usize),
    #[error("Module {0} is not a digitizer; digitizer banks must come from modules 0 to {last}", last=NUMBER_OF_DIGITIZERS - 1)]
    NotADigitizer(usize),
}

#[derive(Debug, Clone, Error)]
pub enum FragmentError {
    #[error("Invalid channel {0} found in digitizer record; expected a value less than {max}", max=CHANNELS_PER_DIGITIZER)]
    BadChannel(u8),
    #[error("Fragment failed due to module error: {0}")]
    ModuleError(#[from] ModuleError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid number of threads {0}; must be at least 1")]
    BadThreadCount(i32),
    #[error("Config does not enable any modules; at least one module must be enabled")]
    NoModulesEnabled,
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Could not open trace file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Trace file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Trace file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Trace file contained an invalid delivery at position {0}: {1}")]
    BadDelivery(usize, FragmentError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Trace error: {0}")]
    TraceError(#[from] TraceError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}
