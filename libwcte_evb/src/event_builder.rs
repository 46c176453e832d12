use super::constants::{
    CHANNELS_PER_DIGITIZER, DEFAULT_IDLE_THRESHOLD_SECONDS, DEFAULT_REPORT_INTERVAL,
    DEFAULT_UNMATCHED_PREVIEW_LENGTH, NUMBER_OF_DIGITIZERS, SEQUENCE_CHECK_CHANNEL,
};
use super::correlator::{correlate, CorrelationLedger};
use super::delivery::{DigitizerBank, TdcBank, TriggerDelivery};
use super::event::Event;
use super::fragment::{Fragment, FragmentPayload, WaveformPayload};
use super::fragment_store::FragmentStore;
use super::module::{ModuleId, ModuleKind, ModuleMask};
use super::sequence::SequenceMonitor;
use super::spill_monitor::SpillMonitor;
use super::statistics::{ModuleReport, SpillReport, SpillStatistics, SpillSummary, SpillVerdict};

/// The settings of a single EventBuilder
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    pub enabled: ModuleMask,
    pub idle_threshold_seconds: u32,
    pub unmatched_preview_length: usize,
    /// Log a correlation summary each time this many more good events have been built. 0 disables it.
    pub report_interval: u64,
    /// Stored channels of each digitizer
    pub channel_readout: [[bool; CHANNELS_PER_DIGITIZER]; NUMBER_OF_DIGITIZERS],
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            enabled: ModuleMask::from_flags(&[true, true, true, true, false]),
            idle_threshold_seconds: DEFAULT_IDLE_THRESHOLD_SECONDS,
            unmatched_preview_length: DEFAULT_UNMATCHED_PREVIEW_LENGTH,
            report_interval: DEFAULT_REPORT_INTERVAL,
            channel_readout: [[true; CHANNELS_PER_DIGITIZER]; NUMBER_OF_DIGITIZERS],
        }
    }
}

/// The result of asking the EventBuilder to match fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    /// An enabled module has no fragments queued; nothing can be decided yet
    NotReady,
    /// Every fragment that left the store was matched into an Event
    AllMatched,
    /// Some fragments left the store without a match
    FragmentsDiscarded,
}

/// EventBuilder takes the banks of each trigger and composes them into Events.
///
/// For every MIDAS event the builder should be given the delivered banks (`add_fragments`), asked to
/// build any complete events (`check_complete_events`) and asked if the spill is over
/// (`check_end_of_spill`). When the spill is over, `finish_spill` audits the spill, hands back the
/// completed events and resets for the next spill. `process_delivery` does all of this in order.
///
/// A builder is meant for a single run and is driven from one thread at a time.
#[derive(Debug)]
pub struct EventBuilder {
    enabled: ModuleMask,
    store: FragmentStore,
    spill_monitor: SpillMonitor,
    sequence: SequenceMonitor,
    spill_stats: SpillStatistics,
    completed_events: Vec<Event>,
    total_completed_events: u64,
    spill_number: u32,
    bad_spills: u32,
    unmatched_preview_length: usize,
    report_interval: u64,
    next_report: u64,
    channel_readout: [[bool; CHANNELS_PER_DIGITIZER]; NUMBER_OF_DIGITIZERS],
}

impl EventBuilder {
    /// Create a new EventBuilder.
    pub fn new(config: &BuilderConfig) -> Self {
        Self {
            enabled: config.enabled.clone(),
            store: FragmentStore::new(),
            spill_monitor: SpillMonitor::new(config.idle_threshold_seconds),
            sequence: SequenceMonitor::new(),
            spill_stats: SpillStatistics::new(),
            completed_events: Vec::new(),
            total_completed_events: 0,
            spill_number: 0,
            bad_spills: 0,
            unmatched_preview_length: config.unmatched_preview_length,
            report_interval: config.report_interval,
            next_report: config.report_interval,
            channel_readout: config.channel_readout,
        }
    }

    /// Enable or disable a module.
    ///
    /// The module set cannot change while fragments are waiting to be matched; returns false if
    /// the change was refused.
    pub fn set_enabled(&mut self, module: ModuleId, enabled: bool) -> bool {
        if self.enabled.contains(module) == enabled {
            return true;
        }
        let pending = ModuleId::all().map(|m| self.store.len(m)).sum::<usize>();
        if pending != 0 {
            spdlog::warn!(
                "Refusing to change module {} while {} fragment(s) are pending",
                module,
                pending
            );
            return false;
        }
        self.enabled.set(module, enabled);
        true
    }

    pub fn is_enabled(&self, module: ModuleId) -> bool {
        self.enabled.contains(module)
    }

    pub fn enabled_modules(&self) -> &ModuleMask {
        &self.enabled
    }

    /// Add the fragments of the enabled modules from a trigger delivery to the store.
    ///
    /// A digitizer bank can hold several triggers; consecutive records with the same hardware
    /// event number form one fragment. Each TDC bank is one fragment. Returns the number of
    /// fragments added.
    pub fn add_fragments(&mut self, delivery: &TriggerDelivery) -> usize {
        let mut added = 0;
        let modules: Vec<ModuleId> = self.enabled.iter().collect();
        for module in modules {
            match module.kind() {
                ModuleKind::Digitizer => {
                    if let Some(bank) = delivery.digitizer_bank(module) {
                        added += self.add_digitizer_bank(bank, delivery.timestamp);
                    }
                }
                ModuleKind::Tdc => {
                    if let Some(bank) = &delivery.tdc_bank {
                        added += self.add_tdc_bank(bank, delivery.timestamp);
                    }
                }
            }
        }
        added
    }

    fn add_digitizer_bank(&mut self, bank: &DigitizerBank, timestamp: u32) -> usize {
        let module = bank.module;
        let mut n_fragments: usize = 0;
        let mut current_event: Option<u32> = None;
        let mut fragment: Option<Fragment> = None;

        for record in bank.records.iter() {
            if current_event != Some(record.hardware_event_number) {
                if let Some(done) = fragment.take() {
                    self.store.ingest(done);
                    n_fragments += 1;
                }
                let payload = self.waveform_payload(module);
                fragment = Some(Fragment::new(
                    module,
                    self.store.assign_event_number(module),
                    timestamp,
                    record.trigger_time,
                    FragmentPayload::Waveform(payload),
                ));
                current_event = Some(record.hardware_event_number);
            }

            if record.channel == SEQUENCE_CHECK_CHANNEL {
                self.sequence.observe(module, record.hardware_event_number);
            }

            if let Some(Fragment {
                payload: FragmentPayload::Waveform(waves),
                ..
            }) = fragment.as_mut()
            {
                if let Err(e) = waves.set_waveform(record.channel, record.samples.clone()) {
                    spdlog::warn!("Bank {} had a bad record: {e}", module.bank_name());
                }
            }
        }

        if let Some(done) = fragment.take() {
            self.store.ingest(done);
            n_fragments += 1;
        }
        self.spill_stats.add_fragment_count(module, n_fragments as u32);
        n_fragments
    }

    /// An empty waveform payload with the configured channel readout of a digitizer
    fn waveform_payload(&self, module: ModuleId) -> WaveformPayload {
        let mut payload = WaveformPayload::new();
        if let Some(readout) = self.channel_readout.get(module.index()) {
            for (channel, enabled) in (0u8..).zip(readout.iter()) {
                if let Err(e) = payload.set_readout(channel, *enabled) {
                    spdlog::warn!("Bad readout setting for bank {}: {e}", module.bank_name());
                }
            }
        }
        payload
    }

    fn add_tdc_bank(&mut self, bank: &TdcBank, timestamp: u32) -> usize {
        let module = ModuleId::TDC;
        self.sequence.observe(module, bank.trigger_number);
        let fragment = Fragment::new(
            module,
            self.store.assign_event_number(module),
            timestamp,
            0,
            FragmentPayload::Tdc(bank.measurements.clone()),
        );
        self.store.ingest(fragment);
        self.spill_stats.add_fragment_count(module, 1);
        1
    }

    /// Add a fragment which already carries its local event number.
    ///
    /// For sources which number their own fragments. Fragments from disabled modules, or numbered
    /// below the newest fragment already queued for the module, are refused.
    pub fn ingest_fragment(&mut self, fragment: Fragment) -> bool {
        if !self.enabled.contains(fragment.module) {
            return false;
        }
        let module = fragment.module;
        let number = fragment.event_number;
        if self.store.ingest(fragment) {
            self.spill_stats.add_fragment_count(module, 1);
            true
        } else {
            spdlog::warn!(
                "Refused fragment {} from module {} as it is older than the queued fragments",
                number,
                module
            );
            false
        }
    }

    /// Match all fragments that can be decided into Events.
    pub fn check_complete_events(&mut self) -> CorrelationOutcome {
        let Some(pass) = correlate(&mut self.store, &self.enabled, self.spill_number) else {
            spdlog::debug!(
                "At least one enabled fragment queue is empty: waiting for more fragments..."
            );
            return CorrelationOutcome::NotReady;
        };

        for module in self.enabled.iter() {
            self.spill_stats
                .add_discarded(module, pass.ledger.unmatched(module));
        }
        let n_events = pass.events.len();
        self.spill_stats.add_completed_events(n_events);
        self.completed_events.extend(pass.events);
        if self.report_progress(&pass.ledger, n_events) {
            spdlog::debug!("Next correlation summary at {} good events", self.next_report);
        }

        if pass.ledger.is_clean(&self.enabled) {
            CorrelationOutcome::AllMatched
        } else {
            CorrelationOutcome::FragmentsDiscarded
        }
    }

    /// Log a correlation summary each time another `report_interval` good events have been built.
    /// Returns true if the summary was logged.
    fn report_progress(&mut self, ledger: &CorrelationLedger, n_events: usize) -> bool {
        if self.report_interval == 0 || self.total_completed_events < self.next_report {
            return false;
        }
        self.next_report = self.total_completed_events + self.report_interval;
        spdlog::info!(
            "Enabled modules: {} -- Total completed events before this spill: {} -- Completed events in this pass: {} -- Completed events in this spill: {}",
            self.enabled,
            self.total_completed_events,
            n_events,
            self.spill_stats.completed_events()
        );
        for module in self.enabled.iter() {
            spdlog::info!(
                "Module {}: total discarded {}, erased {}, matched {}, remaining {}",
                module,
                self.spill_stats.discarded(module),
                ledger.erased[module.index()],
                ledger.matched[module.index()],
                self.store.len(module)
            );
        }
        true
    }

    /// Check whether it has been too long since any enabled module delivered data.
    ///
    /// Returns true once, for the trigger which ends the spill.
    pub fn check_end_of_spill(&mut self, delivery: &TriggerDelivery) -> bool {
        let has_data = delivery.has_data_for(&self.enabled);
        let ended = self.spill_monitor.update(delivery.timestamp, has_data);
        if ended {
            spdlog::info!(
                "No data for more than {} s at {}: spill {} is over",
                self.spill_monitor.idle_threshold(),
                delivery.timestamp,
                self.spill_number
            );
        }
        ended
    }

    /// Audit the current spill and start the next one.
    ///
    /// A spill with any unmatched fragment left is bad: its events do not count toward the total
    /// of good events. Its events are still handed back in the summary.
    pub fn finish_spill(&mut self, ended_at: u32) -> SpillSummary {
        let modules: Vec<ModuleReport> = self
            .enabled
            .iter()
            .map(|module| ModuleReport {
                module,
                fragment_counts: self.spill_stats.fragment_count_stats(module),
                discarded: self.spill_stats.discarded(module),
                unmatched: self.store.len(module),
                unmatched_preview: self
                    .store
                    .pending_event_numbers(module, self.unmatched_preview_length),
            })
            .collect();

        let total_completed_before = self.total_completed_events;
        let spill_completed_events = self.spill_stats.completed_events();
        let verdict = if self.missed_fragments() == 0 {
            self.total_completed_events += spill_completed_events;
            SpillVerdict::Good
        } else {
            self.bad_spills += 1;
            SpillVerdict::Bad
        };
        let total_spills = self.spill_number + 1;

        let report = SpillReport {
            spill_number: self.spill_number,
            enabled: self.enabled.clone(),
            ended_at,
            total_completed_before,
            spill_completed_events,
            modules,
            verdict,
            good_spills: total_spills.saturating_sub(self.bad_spills),
            total_spills,
            total_completed_after: self.total_completed_events,
        };
        spdlog::info!("\n{report}");
        match verdict {
            SpillVerdict::Good => spdlog::info!("{}", report.outcome_message()),
            SpillVerdict::Bad => spdlog::error!("{}", report.outcome_message()),
        }

        let events = std::mem::take(&mut self.completed_events);
        let dropped = self.clear_fragments();
        if dropped != 0 {
            spdlog::debug!("Dropped {dropped} queued fragment(s) at the end of the spill");
        }
        self.reset_event_numbers();
        self.spill_stats.reset();
        self.spill_monitor.reset();
        self.spill_number += 1;

        SpillSummary { report, events }
    }

    /// Run one trigger delivery through the builder.
    ///
    /// Returns the spill summary if this delivery ended a spill.
    pub fn process_delivery(&mut self, delivery: &TriggerDelivery) -> Option<SpillSummary> {
        self.add_fragments(delivery);
        self.check_complete_events();
        if self.check_end_of_spill(delivery) {
            Some(self.finish_spill(delivery.timestamp))
        } else {
            None
        }
    }

    /// Log the queued event numbers of every module
    pub fn log_fragment_queues(&self) {
        for module in ModuleId::all() {
            let numbers: Vec<String> = self
                .store
                .pending_event_numbers(module, usize::MAX)
                .iter()
                .map(|n| n.to_string())
                .collect();
            spdlog::debug!("Fragment queue for module {}: {}", module, numbers.join(" "));
        }
    }

    /// The events completed so far in this spill
    pub fn completed_events(&self) -> &[Event] {
        &self.completed_events
    }

    /// Take the events completed so far in this spill. They will not be part of the spill summary.
    pub fn take_completed_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.completed_events)
    }

    /// Good events over all finished good spills
    pub fn total_completed_events(&self) -> u64 {
        self.total_completed_events
    }

    pub fn spill_completed_events(&self) -> u64 {
        self.spill_stats.completed_events()
    }

    pub fn spill_number(&self) -> u32 {
        self.spill_number
    }

    pub fn bad_spills(&self) -> u32 {
        self.bad_spills
    }

    /// Fragments of enabled modules currently waiting for a match
    pub fn missed_fragments(&self) -> usize {
        self.store.pending(&self.enabled)
    }

    /// Fragments of a module dropped without a match so far this spill
    pub fn discarded_fragments(&self, module: ModuleId) -> u64 {
        self.spill_stats.discarded(module)
    }

    pub fn sequence_anomalies(&self) -> u64 {
        self.sequence.anomalies()
    }

    pub fn reset_event_numbers(&mut self) {
        self.store.reset_event_numbers();
    }

    pub fn reset_fragment_count_samples(&mut self) {
        self.spill_stats.reset_fragment_counts();
    }

    pub fn reset_total_completed_events(&mut self) {
        self.total_completed_events = 0;
        self.next_report = self.report_interval;
    }

    pub fn reset_spill_completed_events(&mut self) {
        self.spill_stats.reset_completed_events();
    }

    pub fn reset_spill_number(&mut self) {
        self.spill_number = 0;
    }

    pub fn reset_bad_spills(&mut self) {
        self.bad_spills = 0;
    }

    pub fn reset_sequence_monitor(&mut self) {
        self.sequence.reset();
    }

    pub fn clear_completed_events(&mut self) {
        self.completed_events.clear();
    }

    /// Drop every queued fragment. Returns how many were dropped.
    pub fn clear_fragments(&mut self) -> usize {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUMBER_OF_MODULES;
    use crate::delivery::WaveformRecord;
    use crate::fragment::TdcMeasurement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config(modules: &[usize]) -> BuilderConfig {
        let mut flags = [false; NUMBER_OF_MODULES];
        for m in modules {
            flags[*m] = true;
        }
        BuilderConfig {
            enabled: ModuleMask::from_flags(&flags),
            ..Default::default()
        }
    }

    fn builder(modules: &[usize]) -> EventBuilder {
        EventBuilder::new(&config(modules))
    }

    fn module(index: usize) -> ModuleId {
        ModuleId::new(index).unwrap()
    }

    fn numbered(index: usize, number: u32) -> Fragment {
        Fragment::new(
            module(index),
            number,
            0,
            number,
            FragmentPayload::Waveform(WaveformPayload::new()),
        )
    }

    /// A digitizer bank with `n_triggers` triggers of two channels each
    fn bank(index: usize, first_hw_event: u32, n_triggers: u32) -> DigitizerBank {
        let mut records = Vec::new();
        for trigger in 0..n_triggers {
            for channel in 0..2 {
                records.push(WaveformRecord {
                    channel,
                    samples: vec![channel as f64; 4],
                    hardware_event_number: first_hw_event + trigger,
                    trigger_time: 1000 * (first_hw_event + trigger),
                });
            }
        }
        DigitizerBank {
            module: module(index),
            records,
        }
    }

    fn delivery(timestamp: u32, banks: Vec<DigitizerBank>) -> TriggerDelivery {
        TriggerDelivery {
            timestamp,
            digitizer_banks: banks,
            tdc_bank: None,
        }
    }

    fn event_numbers(events: &[Event]) -> Vec<u32> {
        events.iter().map(|e| e.event_number()).collect()
    }

    #[test]
    fn test_two_modules_all_matched() {
        let mut evb = builder(&[0, 1]);
        for n in 0..3 {
            assert!(evb.ingest_fragment(numbered(0, n)));
            assert!(evb.ingest_fragment(numbered(1, n)));
        }
        assert_eq!(evb.check_complete_events(), CorrelationOutcome::AllMatched);
        assert_eq!(event_numbers(evb.completed_events()), vec![0, 1, 2]);
        assert_eq!(evb.discarded_fragments(module(0)), 0);
        assert_eq!(evb.discarded_fragments(module(1)), 0);
        assert_eq!(evb.missed_fragments(), 0);
    }

    #[test]
    fn test_missing_fragment_is_discarded() {
        let mut evb = builder(&[0, 1]);
        for n in 0..3 {
            evb.ingest_fragment(numbered(0, n));
        }
        evb.ingest_fragment(numbered(1, 0));
        evb.ingest_fragment(numbered(1, 2));
        assert_eq!(
            evb.check_complete_events(),
            CorrelationOutcome::FragmentsDiscarded
        );
        assert_eq!(event_numbers(evb.completed_events()), vec![0, 2]);
        assert_eq!(evb.discarded_fragments(module(0)), 1);
        assert_eq!(evb.discarded_fragments(module(1)), 0);
    }

    #[test]
    fn test_disabled_module_never_blocks() {
        let mut evb = builder(&[0]);
        for n in 0..5 {
            evb.ingest_fragment(numbered(0, n));
        }
        assert!(!evb.ingest_fragment(numbered(1, 0)));
        assert_eq!(evb.check_complete_events(), CorrelationOutcome::AllMatched);
        assert_eq!(evb.completed_events().len(), 5);
        assert_eq!(evb.discarded_fragments(module(0)), 0);
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let mut evb = builder(&[0, 1]);
        for n in 0..4 {
            evb.ingest_fragment(numbered(0, n));
        }
        evb.ingest_fragment(numbered(1, 0));
        evb.ingest_fragment(numbered(1, 2));
        evb.check_complete_events();
        let events = evb.completed_events().len();
        let missed = evb.missed_fragments();
        evb.check_complete_events();
        assert_eq!(evb.completed_events().len(), events);
        assert_eq!(evb.missed_fragments(), missed);
    }

    #[test]
    fn test_banks_split_into_fragments() {
        let mut evb = builder(&[0, 1]);
        let first = delivery(10, vec![bank(0, 0, 3), bank(1, 500, 2)]);
        assert_eq!(evb.add_fragments(&first), 5);
        assert_eq!(evb.check_complete_events(), CorrelationOutcome::AllMatched);
        assert_eq!(event_numbers(evb.completed_events()), vec![0, 1]);
        let event = &evb.completed_events()[1];
        assert_eq!(event.trigger_time(module(0)), 1000);
        assert_eq!(event.trigger_time(module(1)), 501_000);
        assert_eq!(event.waveform(module(1), 1), &[1.0; 4]);
        assert_eq!(event.timestamp(module(0)), 10);

        // Module 1 catches up with the third trigger of module 0
        let second = delivery(11, vec![bank(1, 502, 1)]);
        assert_eq!(evb.add_fragments(&second), 1);
        evb.check_complete_events();
        assert_eq!(event_numbers(evb.completed_events()), vec![0, 1, 2]);
        assert_eq!(evb.missed_fragments(), 0);
        assert_eq!(evb.sequence_anomalies(), 1);
    }

    #[test]
    fn test_hardware_gaps_do_not_change_numbering() {
        let mut evb = builder(&[0, 1]);
        let d = delivery(5, vec![bank(0, 0, 1), bank(1, 0, 1)]);
        evb.process_delivery(&d);
        let d = delivery(5, vec![bank(0, 7, 1), bank(1, 1, 1)]);
        evb.process_delivery(&d);
        assert_eq!(event_numbers(evb.completed_events()), vec![0, 1]);
        assert_eq!(evb.sequence_anomalies(), 1);
    }

    #[test]
    fn test_tdc_fragments() {
        let mut evb = builder(&[0, 4]);
        let mut d = delivery(1, vec![bank(0, 0, 1)]);
        d.tdc_bank = Some(TdcBank {
            trigger_number: 0,
            measurements: vec![TdcMeasurement {
                channel: 3,
                ..Default::default()
            }],
        });
        evb.process_delivery(&d);
        let events = evb.completed_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tdc_measurements()[0].channel, 3);
        assert_eq!(events[0].fragments().len(), 2);
    }

    #[test]
    fn test_good_spill_counts_toward_total() {
        let mut evb = builder(&[0, 1]);
        evb.process_delivery(&delivery(100, vec![bank(0, 0, 2), bank(1, 0, 2)]));
        evb.process_delivery(&delivery(101, vec![bank(0, 2, 1), bank(1, 2, 1)]));
        assert!(evb.process_delivery(&delivery(103, vec![])).is_none());
        let summary = evb.process_delivery(&delivery(105, vec![])).unwrap();
        assert!(summary.report.is_good());
        assert_eq!(summary.events.len(), 3);
        assert_eq!(summary.report.spill_completed_events, 3);
        assert_eq!(summary.report.modules[0].fragment_counts.n_samples, 2);
        assert_eq!(summary.report.modules[0].fragment_counts.max, 2);
        assert_eq!(evb.total_completed_events(), 3);
        assert_eq!(evb.spill_number(), 1);
        assert_eq!(evb.spill_completed_events(), 0);
        assert!(evb.completed_events().is_empty());

        // The next spill numbers from zero again
        evb.process_delivery(&delivery(200, vec![bank(0, 3, 1), bank(1, 3, 1)]));
        assert_eq!(evb.completed_events()[0].event_number(), 0);
        assert_eq!(evb.completed_events()[0].spill_number(), 1);
    }

    #[test]
    fn test_bad_spill_still_delivers_events() {
        let mut evb = builder(&[0, 1]);
        evb.process_delivery(&delivery(100, vec![bank(0, 0, 3), bank(1, 0, 2)]));
        assert_eq!(evb.missed_fragments(), 1);
        let summary = evb.process_delivery(&delivery(104, vec![])).unwrap();
        assert_eq!(summary.report.verdict, SpillVerdict::Bad);
        assert_eq!(summary.events.len(), 2);
        assert_eq!(summary.report.unmatched_fragments(), 1);
        assert_eq!(summary.report.modules[0].unmatched_preview, vec![2]);
        assert_eq!(evb.total_completed_events(), 0);
        assert_eq!(evb.bad_spills(), 1);
        assert_eq!(summary.report.good_spills, 0);
        assert_eq!(summary.report.total_spills, 1);
        assert_eq!(evb.missed_fragments(), 0);
    }

    #[test]
    fn test_set_enabled_refused_with_pending() {
        let mut evb = builder(&[0, 1]);
        evb.ingest_fragment(numbered(0, 0));
        assert!(!evb.set_enabled(module(2), true));
        evb.clear_fragments();
        assert!(evb.set_enabled(module(2), true));
        assert!(evb.is_enabled(module(2)));
    }

    #[test]
    fn test_old_numbers_refused_after_matching() {
        let mut evb = builder(&[0, 1]);
        assert!(evb.ingest_fragment(numbered(0, 5)));
        assert!(evb.ingest_fragment(numbered(1, 5)));
        assert_eq!(evb.check_complete_events(), CorrelationOutcome::AllMatched);

        // Queues are empty now, but 5 and everything before it is closed
        assert!(!evb.ingest_fragment(numbered(0, 3)));
        assert!(!evb.ingest_fragment(numbered(1, 3)));
        assert!(!evb.ingest_fragment(numbered(0, 5)));
        assert_eq!(evb.check_complete_events(), CorrelationOutcome::NotReady);

        assert!(evb.ingest_fragment(numbered(0, 6)));
        assert!(evb.ingest_fragment(numbered(1, 6)));
        evb.check_complete_events();
        assert_eq!(event_numbers(evb.completed_events()), vec![5, 6]);
    }

    #[test]
    fn test_disabled_channels_are_not_stored() {
        let mut conf = config(&[0, 1]);
        conf.channel_readout[0][1] = false;
        let mut evb = EventBuilder::new(&conf);
        evb.process_delivery(&delivery(10, vec![bank(0, 0, 1), bank(1, 0, 1)]));
        let event = &evb.completed_events()[0];
        assert_eq!(event.waveform(module(0), 0), &[0.0; 4]);
        assert!(event.waveform(module(0), 1).is_empty());
        assert_eq!(event.waveform(module(1), 1), &[1.0; 4]);
    }

    #[test]
    fn test_progress_report_interval() {
        let mut conf = config(&[0, 1]);
        conf.report_interval = 2;
        let mut evb = EventBuilder::new(&conf);
        let quiet = CorrelationLedger::default();

        // Nothing is reported before the first good spill is counted
        evb.process_delivery(&delivery(100, vec![bank(0, 0, 2), bank(1, 0, 2)]));
        assert_eq!(evb.next_report, 2);
        assert!(evb.process_delivery(&delivery(104, vec![])).is_some());
        assert_eq!(evb.total_completed_events(), 2);

        // The first pass of the next spill crosses the threshold
        evb.process_delivery(&delivery(200, vec![bank(0, 2, 2), bank(1, 2, 2)]));
        assert_eq!(evb.next_report, 4);
        assert!(!evb.report_progress(&quiet, 0));

        assert!(evb.process_delivery(&delivery(204, vec![])).is_some());
        assert_eq!(evb.total_completed_events(), 4);
        assert!(evb.report_progress(&quiet, 0));
        assert_eq!(evb.next_report, 6);

        evb.reset_total_completed_events();
        assert_eq!(evb.next_report, 2);
        assert!(!evb.report_progress(&quiet, 0));
    }

    #[test]
    fn test_progress_report_disabled() {
        let mut conf = config(&[0, 1]);
        conf.report_interval = 0;
        let mut evb = EventBuilder::new(&conf);
        evb.process_delivery(&delivery(100, vec![bank(0, 0, 2), bank(1, 0, 2)]));
        assert!(evb.process_delivery(&delivery(104, vec![])).is_some());
        assert_eq!(evb.total_completed_events(), 2);
        assert!(!evb.report_progress(&CorrelationLedger::default(), 0));
    }

    #[test]
    fn test_random_streams_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut evb = builder(&[0, 1, 2]);
            let mut ingested = [0usize; 3];
            let mut tag: u32 = 0;
            let mut events: Vec<Event> = Vec::new();
            for _ in 0..40 {
                let m = rng.random_range(0..3usize);
                // Occasionally skip a local number to mimic a lost fragment
                let skip = rng.random_bool(0.2) as u32;
                let number = evb.store.assign_event_number(module(m)) + skip;
                tag += 1;
                let fragment = Fragment::new(
                    module(m),
                    number,
                    0,
                    tag,
                    FragmentPayload::Waveform(WaveformPayload::new()),
                );
                if evb.ingest_fragment(fragment) {
                    ingested[m] += 1;
                }
                evb.check_complete_events();
                events.extend(evb.take_completed_events());

                let max_events = *ingested.iter().min().unwrap_or(&0);
                assert!(events.len() <= max_events);
            }

            let numbers = event_numbers(&events);
            assert!(numbers.windows(2).all(|w| w[0] <= w[1]));

            let mut tags: Vec<u32> = events
                .iter()
                .flat_map(|e| e.fragments().iter().map(|f| f.trigger_time))
                .collect();
            let n_tags = tags.len();
            tags.sort_unstable();
            tags.dedup();
            assert_eq!(tags.len(), n_tags);
            assert!(events.iter().all(|e| e.fragments().len() == 3));
        }
    }
}
