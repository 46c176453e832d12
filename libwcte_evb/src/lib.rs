//! # wcte_evb
//!
//! wcte_evb is the WCTE online event builder, written in Rust. It takes the digitizer
//! (DT5730, banks `D300` to `D303`) and TDC (TRB3, bank `TRB0`) readout delivered with each
//! MIDAS event and combines the fragments of every enabled module into complete events,
//! spill by spill.
//!
//! ## Event building
//!
//! Each module delivers its data independently, and a single digitizer bank can hold several
//! triggers. The builder therefore never trusts the hardware event counters for matching: every
//! fragment gets a local event number from a per-module counter, and fragments are matched on that
//! number. The hardware counters are still checked, and skipped triggers are logged as warnings.
//!
//! After new fragments are added, all fragments up to the smallest of the newest event numbers
//! of the enabled modules are matched. An event is complete when every enabled module contributed
//! exactly one fragment to it. Incomplete events are dropped and never retried.
//!
//! ## Spills
//!
//! There is no explicit marker for the end of a spill. A spill is over when more than the idle
//! threshold (3 seconds by default) passes without data from any enabled module. At the end of a
//! spill a report is logged containing, for each enabled module, the mean, standard deviation,
//! minimum and maximum number of fragments per bank, and the number (and first few event numbers)
//! of fragments which were never matched. If any fragment was left unmatched, the spill is bad and
//! its events are not added to the total of good events. The events of a bad spill are still
//! handed back to the caller.
//!
//! ## Replay
//!
//! The `process` module replays recorded runs. A run is a YAML trace file named `run_####.yaml`
//! in the trace directory, containing a list of deliveries:
//!
//! ```yml
//! - timestamp: 1718000000
//!   digitizer_banks:
//!     - module: 0
//!       records:
//!         - channel: 0
//!           samples: [2048.0, 2047.0, 1920.0]
//!           hardware_event_number: 12
//!           trigger_time: 400112
//!   tdc_bank:
//!     trigger_number: 12
//!     measurements: []
//! ```
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! trace_path: None
//! first_run_number: 0
//! last_run_number: 0
//! n_threads: 1
//! enabled_modules: [true, true, true, true, false]
//! idle_threshold_seconds: 3
//! unmatched_preview_length: 5
//! report_interval: 1000000
//! channel_readout:
//!   - [true, true, true, true, true, true, true, true]
//!   - [true, true, true, true, true, true, true, true]
//!   - [true, true, true, true, true, true, true, true]
//!   - [true, true, true, true, true, true, true, true]
//! ```
//!
//! `enabled_modules` lists D300, D301, D302, D303 and TRB0 in that order. `channel_readout` lists
//! the stored channels of D300 to D303; samples from other channels are dropped. The last four
//! fields are optional.
pub mod config;
pub mod constants;
pub mod correlator;
pub mod delivery;
pub mod error;
pub mod event;
pub mod event_builder;
pub mod fragment;
pub mod fragment_store;
pub mod module;
pub mod process;
pub mod sequence;
pub mod spill_monitor;
pub mod statistics;
pub mod trace_file;
pub mod worker_status;
