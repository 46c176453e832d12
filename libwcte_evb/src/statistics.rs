use std::fmt::Display;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::constants::NUMBER_OF_MODULES;
use super::event::Event;
use super::module::{ModuleId, ModuleMask};

const REPORT_RULE: &str =
    "***************************************************************************";

/// Summary of the number of fragments each bank of a module carried over a spill.
///
/// Population formulas; the standard deviation is sqrt(<x^2> - <x>^2), which is fine for the
/// small integer counts seen here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FragmentCountStats {
    pub n_samples: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: u32,
    pub max: u32,
}

impl FragmentCountStats {
    pub fn from_samples(samples: &[u32]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|s| *s as f64).sum();
        let sq_sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        let mean = sum / n;
        let variance = (sq_sum / n - mean * mean).max(0.0);
        Self {
            n_samples: samples.len(),
            mean,
            std_dev: variance.sqrt(),
            min: samples.iter().copied().min().unwrap_or(0),
            max: samples.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Per-spill accumulators, reset every time a spill ends
#[derive(Debug, Clone, Default)]
pub struct SpillStatistics {
    fragment_counts: [Vec<u32>; NUMBER_OF_MODULES],
    discarded: [u64; NUMBER_OF_MODULES],
    completed_events: u64,
}

impl SpillStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how many fragments a single bank from a module contained
    pub fn add_fragment_count(&mut self, module: ModuleId, count: u32) {
        self.fragment_counts[module.index()].push(count);
    }

    pub fn add_discarded(&mut self, module: ModuleId, count: usize) {
        self.discarded[module.index()] += count as u64;
    }

    pub fn add_completed_events(&mut self, count: usize) {
        self.completed_events += count as u64;
    }

    pub fn completed_events(&self) -> u64 {
        self.completed_events
    }

    pub fn discarded(&self, module: ModuleId) -> u64 {
        self.discarded[module.index()]
    }

    pub fn fragment_counts(&self, module: ModuleId) -> &[u32] {
        &self.fragment_counts[module.index()]
    }

    pub fn fragment_count_stats(&self, module: ModuleId) -> FragmentCountStats {
        FragmentCountStats::from_samples(self.fragment_counts(module))
    }

    pub fn reset_fragment_counts(&mut self) {
        for samples in self.fragment_counts.iter_mut() {
            samples.clear();
        }
    }

    pub fn reset_completed_events(&mut self) {
        self.completed_events = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether a spill can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpillVerdict {
    Good,
    /// Fragments were left unmatched at the end of the spill
    Bad,
}

/// The audit of one enabled module at the end of a spill
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleReport {
    pub module: ModuleId,
    pub fragment_counts: FragmentCountStats,
    pub discarded: u64,
    pub unmatched: usize,
    /// Event numbers of the oldest unmatched fragments
    pub unmatched_preview: Vec<u32>,
}

/// The end of spill report
#[derive(Debug, Clone, PartialEq)]
pub struct SpillReport {
    pub spill_number: u32,
    pub enabled: ModuleMask,
    pub ended_at: u32,
    pub total_completed_before: u64,
    pub spill_completed_events: u64,
    pub modules: Vec<ModuleReport>,
    pub verdict: SpillVerdict,
    pub good_spills: u32,
    pub total_spills: u32,
    pub total_completed_after: u64,
}

impl SpillReport {
    pub fn unmatched_fragments(&self) -> usize {
        self.modules.iter().map(|m| m.unmatched).sum()
    }

    pub fn is_good(&self) -> bool {
        self.verdict == SpillVerdict::Good
    }

    /// The one-line result of event building for this spill
    pub fn outcome_message(&self) -> String {
        match self.verdict {
            SpillVerdict::Good => format!(
                "Event building succeeded for spill {}; [{}/{} good spills, {} total good events]; {} complete events",
                self.spill_number,
                self.good_spills,
                self.total_spills,
                self.total_completed_after,
                self.spill_completed_events
            ),
            SpillVerdict::Bad => {
                let missing: Vec<String> = ModuleId::all()
                    .map(|m| {
                        self.modules
                            .iter()
                            .find(|r| r.module == m)
                            .map_or(0, |r| r.unmatched)
                            .to_string()
                    })
                    .collect();
                format!(
                    "Event building failed for spill {}; [{}/{} good spills, {} total good events]; {} complete events, but missing event fragments [{}]",
                    self.spill_number,
                    self.good_spills,
                    self.total_spills,
                    self.total_completed_after,
                    self.spill_completed_events,
                    missing.join(",")
                )
            }
        }
    }

    fn format_time(&self) -> String {
        OffsetDateTime::from_unix_timestamp(self.ended_at as i64)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.ended_at.to_string())
    }
}

impl Display for SpillReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{REPORT_RULE}")?;
        writeln!(f, "SPILL {} SUMMARY (ended {})", self.spill_number, self.format_time())?;
        writeln!(f, "{REPORT_RULE}")?;
        writeln!(f, "Enabled modules: {}", self.enabled)?;
        writeln!(
            f,
            "Total number of completed events before this spill: {}",
            self.total_completed_before
        )?;
        writeln!(
            f,
            "Number of completed events in this spill: {}",
            self.spill_completed_events
        )?;
        for report in self.modules.iter() {
            let stats = &report.fragment_counts;
            writeln!(f, "Module {} ({})", report.module, report.module.bank_name())?;
            writeln!(f, "--> Mean number of events per bank: {:.3}", stats.mean)?;
            writeln!(f, "--> Std dev of events per bank: {:.3}", stats.std_dev)?;
            writeln!(f, "--> Min events per bank: {}", stats.min)?;
            writeln!(f, "--> Max events per bank: {}", stats.max)?;
            writeln!(f, "--> Discarded fragments: {}", report.discarded)?;
        }
        for report in self.modules.iter() {
            let numbers: Vec<String> = report
                .unmatched_preview
                .iter()
                .map(|n| n.to_string())
                .collect();
            let ellipsis = if report.unmatched > report.unmatched_preview.len() {
                ", ..."
            } else {
                ""
            };
            writeln!(
                f,
                "Unmatched fragments for module {}: {} [{}{}]",
                report.module,
                report.unmatched,
                numbers.join(", "),
                ellipsis
            )?;
        }
        write!(f, "{REPORT_RULE}")
    }
}

/// Everything handed back when a spill ends: the audit and the spill's completed events.
///
/// Events are handed back even when the spill is bad; only the cumulative good-event total
/// excludes them.
#[derive(Debug, Clone)]
pub struct SpillSummary {
    pub report: SpillReport,
    pub events: Vec<Event>,
}
