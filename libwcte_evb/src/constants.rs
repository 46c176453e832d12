// Module layout of the WCTE readout
pub const NUMBER_OF_MODULES: usize = 5;
pub const NUMBER_OF_DIGITIZERS: usize = 4;
pub const TDC_MODULE_INDEX: usize = 4;

/// MIDAS bank names, indexed by module
pub const BANK_NAMES: [&str; NUMBER_OF_MODULES] = ["D300", "D301", "D302", "D303", "TRB0"];

// DT5730 digitizers have 8 input channels
pub const CHANNELS_PER_DIGITIZER: usize = 8;

// Channel used to check the hardware event sequence
pub const SEQUENCE_CHECK_CHANNEL: u8 = 0;

// Spill bookkeeping defaults
pub const DEFAULT_IDLE_THRESHOLD_SECONDS: u32 = 3;
pub const DEFAULT_UNMATCHED_PREVIEW_LENGTH: usize = 5;
pub const DEFAULT_REPORT_INTERVAL: u64 = 1_000_000;
