//! # wcte_evb_cli
//!
//! Part of the wcte_evb crate family.
//!
//! Replays recorded WCTE runs through the event builder from the command line.
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! wcte_evb_cli -p config.yaml new
//! ```
//!
//! Fill it out, then replay the configured runs with
//!
//! ```bash
//! wcte_evb_cli -p config.yaml
//! ```
//!
//! Spill reports are written to the terminal and to `wcte_evb.log`.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use libwcte_evb::config::Config;
use libwcte_evb::error::ProcessorError;
use libwcte_evb::process::{create_subsets, process_subset, RunSummary};
use libwcte_evb::worker_status::WorkerStatus;

type Worker = JoinHandle<Result<Vec<RunSummary>, ProcessorError>>;

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

/// Log to the terminal as usual, and also to a log file
fn init_logging() -> spdlog::Result<()> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./wcte_evb.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .sinks(spdlog::default_logger().sinks().iter().cloned())
            .sink(file_sink)
            .flush_level_filter(spdlog::LevelFilter::All)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn main() {
    // Create a cli
    let matches = Command::new("wcte_evb_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    if let Err(e) = init_logging() {
        spdlog::warn!("Could not create the log file, logging to the terminal only: {e}");
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        spdlog::error!("A configuration path is required");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => spdlog::info!("Done."),
            Err(e) => spdlog::error!("Failed to write template config: {e}"),
        }
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Trace Path: {}", config.trace_path.to_string_lossy());
    spdlog::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    spdlog::info!("Enabled modules: {}", config.builder_config().enabled);
    spdlog::info!("Spill idle threshold: {} s", config.idle_threshold_seconds);

    // Spawn the workers, one progress bar each
    let pb_manager = MultiProgress::new();
    let style = ProgressStyle::with_template("[worker {prefix}] {bar:40.cyan/blue} {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers: Vec<Worker> = Vec::new();
    let mut bars: Vec<ProgressBar> = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(style.clone());
        bar.set_prefix(idx.to_string());
        bars.push(bar);
        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    drop(tx);

    // Without a UI, poll the workers for progress until the channel closes
    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                if let Some(bar) = bars
                    .iter()
                    .find(|b| b.prefix() == status.worker_id.to_string())
                {
                    bar.set_position((status.progress * 100.0) as u64);
                    bar.set_message(format!(
                        "run {} spill {} ({} bad)",
                        status.run_number, status.spill_number, status.bad_spills
                    ));
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    for bar in bars.iter() {
        bar.finish();
    }

    let mut failed = false;
    for worker in workers {
        match worker.join() {
            Ok(Ok(summaries)) => {
                for summary in summaries {
                    spdlog::info!("{summary}");
                }
            }
            Ok(Err(e)) => {
                failed = true;
                spdlog::error!("Event building failed with error: {e}");
            }
            Err(_) => {
                failed = true;
                spdlog::error!("Failed to join event building worker!");
            }
        }
    }

    if failed {
        spdlog::warn!("Some runs failed; check wcte_evb.log for details.");
    } else {
        spdlog::info!("Successfully replayed all runs!");
    }
    spdlog::info!("Done.");
}
