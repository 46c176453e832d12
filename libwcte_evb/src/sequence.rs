use super::constants::NUMBER_OF_MODULES;
use super::module::ModuleId;

/// Watches the hardware event counters for skipped triggers.
///
/// This is purely diagnostic: the local event numbers used for matching are never derived from
/// the hardware counters. A counter is expected to either repeat (several records of the same
/// trigger) or advance by one.
#[derive(Debug, Clone, Default)]
pub struct SequenceMonitor {
    last_seen: [u32; NUMBER_OF_MODULES],
    anomalies: u64,
}

impl SequenceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hardware event number for a module. Returns false if it was out of sequence.
    pub fn observe(&mut self, module: ModuleId, hardware_event_number: u32) -> bool {
        let last = &mut self.last_seen[module.index()];
        let in_sequence =
            hardware_event_number == *last || Some(hardware_event_number) == last.checked_add(1);
        if !in_sequence {
            self.anomalies += 1;
            spdlog::warn!(
                "Skipped event(s) in bank {}: last event = {} and current event = {}",
                module.bank_name(),
                last,
                hardware_event_number
            );
        }
        *last = hardware_event_number;
        in_sequence
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
