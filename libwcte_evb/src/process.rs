use std::fmt::Display;
use std::sync::mpsc::Sender;

use super::config::Config;
use super::error::ProcessorError;
use super::event_builder::EventBuilder;
use super::statistics::SpillSummary;
use super::trace_file::TraceFile;
use super::worker_status::WorkerStatus;

/// What happened over an entire run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_number: i32,
    pub spills: u32,
    pub bad_spills: u32,
    pub total_good_events: u64,
    /// Events handed downstream, including those from bad spills
    pub delivered_events: u64,
    pub sequence_anomalies: u64,
}

impl RunSummary {
    fn new(run_number: i32) -> Self {
        Self {
            run_number,
            ..Default::default()
        }
    }

    fn add_spill(&mut self, summary: &SpillSummary) {
        self.spills += 1;
        if !summary.report.is_good() {
            self.bad_spills += 1;
        }
        self.delivered_events += summary.events.len() as u64;
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run {}: {} spills ({} bad), {} good events, {} events delivered, {} sequence anomalies",
            self.run_number,
            self.spills,
            self.bad_spills,
            self.total_good_events,
            self.delivered_events,
            self.sequence_anomalies
        )
    }
}

/// The trace may stop in the middle of a spill; close it so its statistics are reported
fn flush_final_spill(evb: &mut EventBuilder, last_timestamp: u32, run_summary: &mut RunSummary) {
    let has_leftovers = evb.missed_fragments() != 0
        || !evb.completed_events().is_empty()
        || evb.spill_completed_events() != 0;
    if has_leftovers {
        spdlog::warn!(
            "Trace ended in the middle of a spill, closing spill {}",
            evb.spill_number()
        );
        let summary = evb.finish_spill(last_timestamp);
        run_summary.add_spill(&summary);
    }
}

/// The main loop of the event builder replay.
///
/// Every delivery of the run's trace is passed through a fresh EventBuilder; spill reports are
/// logged as spills end.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<RunSummary, ProcessorError> {
    let trace_path = config.get_trace_file_name(run_number)?;
    let mut trace = TraceFile::new(&trace_path)?;
    let mut evb = EventBuilder::new(&config.builder_config());
    let mut run_summary = RunSummary::new(run_number);

    let total_deliveries = trace.total_deliveries();
    spdlog::info!(
        "Replaying {} deliveries from {}",
        total_deliveries,
        trace.file_path().to_string_lossy()
    );
    spdlog::info!("Enabled modules: {}", evb.enabled_modules());

    let flush_frac: f32 = 0.01;
    let flush_val = ((total_deliveries as f32 * flush_frac) as usize).max(1);
    let mut count = 0;
    let mut progress: f32 = 0.0;
    let mut last_timestamp: u32 = 0;

    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, 0, 0))?;
    while let Some(delivery) = trace.get_next_delivery() {
        count += 1;
        if count >= flush_val {
            count = 0;
            progress += flush_frac;
            tx.send(WorkerStatus::new(
                progress,
                run_number,
                *worker_id,
                evb.spill_number(),
                evb.bad_spills(),
            ))?;
        }

        last_timestamp = delivery.timestamp;
        if let Some(summary) = evb.process_delivery(&delivery) {
            run_summary.add_spill(&summary);
        }
    }

    flush_final_spill(&mut evb, last_timestamp, &mut run_summary);
    run_summary.total_good_events = evb.total_completed_events();
    run_summary.sequence_anomalies = evb.sequence_anomalies();

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        evb.spill_number(),
        evb.bad_spills(),
    ))?;
    spdlog::info!("{}", run_summary);
    Ok(run_summary)
}

/// Process every run in the configured range.
///
/// Allows multiple runs to be processed on a single thread
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<Vec<RunSummary>, ProcessorError> {
    let runs: Vec<i32> = (config.first_run_number..(config.last_run_number + 1)).collect();
    process_subset(config, tx, worker_id, runs)
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<Vec<RunSummary>, ProcessorError> {
    config.validate()?;
    let mut summaries = Vec::new();
    for run in subset {
        if config.does_run_exist(run) {
            spdlog::info!("Processing run {}...", run);
            summaries.push(process_run(&config, run, &tx, &worker_id)?);
            spdlog::info!("Finished processing run {}.", run);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(summaries)
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let n_subsets = config.n_threads.max(1) as usize;
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); n_subsets];

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}
