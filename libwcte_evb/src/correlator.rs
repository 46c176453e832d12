use fxhash::FxHashMap;

use super::constants::NUMBER_OF_MODULES;
use super::event::Event;
use super::fragment::Fragment;
use super::fragment_store::FragmentStore;
use super::module::{ModuleId, ModuleMask};

/// Per-module bookkeeping for a single correlation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationLedger {
    pub erased: [usize; NUMBER_OF_MODULES],
    pub matched: [usize; NUMBER_OF_MODULES],
}

impl CorrelationLedger {
    /// Fragments of a module which left the store without being matched
    pub fn unmatched(&self, module: ModuleId) -> usize {
        self.erased[module.index()] - self.matched[module.index()]
    }

    pub fn is_clean(&self, enabled: &ModuleMask) -> bool {
        enabled.iter().all(|m| self.unmatched(m) == 0)
    }
}

/// The result of a correlation pass which was able to run
#[derive(Debug, Default)]
pub struct CorrelationPass {
    pub boundary: u32,
    pub events: Vec<Event>,
    pub ledger: CorrelationLedger,
}

/// Match fragments from all enabled modules into Events.
///
/// The boundary of the pass is the smallest of the newest event numbers queued by each enabled
/// module; nothing beyond it can be decided yet. Returns None (without touching the store) if any
/// enabled module has nothing queued.
///
/// Fragments below the boundary are removed from the store and grouped by event number. Each group
/// with exactly one fragment per enabled module becomes an Event; any other group is dropped for
/// good. The group at the boundary is only removed from the store once it is complete.
pub fn correlate(
    store: &mut FragmentStore,
    enabled: &ModuleMask,
    spill_number: u32,
) -> Option<CorrelationPass> {
    let mut boundary: Option<u32> = None;
    for module in enabled.iter() {
        let newest = store.newest(module)?.event_number;
        boundary = Some(boundary.map_or(newest, |b| b.min(newest)));
    }
    // No enabled modules at all
    let boundary = boundary?;

    let mut pass = CorrelationPass {
        boundary,
        ..Default::default()
    };

    let mut slots: FxHashMap<u32, Vec<Fragment>> = FxHashMap::default();
    for module in enabled.iter() {
        let count = store.count_before(module, boundary);
        for fragment in store.take_prefix(module, count) {
            slots.entry(fragment.event_number).or_default().push(fragment);
        }
        pass.ledger.erased[module.index()] += count;
    }

    let mut numbers: Vec<u32> = slots.keys().copied().collect();
    numbers.sort_unstable();
    for number in numbers {
        let Some(fragments) = slots.remove(&number) else {
            continue;
        };
        if is_complete(&fragments, enabled) {
            for fragment in fragments.iter() {
                pass.ledger.matched[fragment.module.index()] += 1;
            }
            pass.events.push(Event::new(number, spill_number, fragments));
        } else {
            spdlog::debug!(
                "Dropping incomplete event {number} with {} fragment(s)",
                fragments.len()
            );
        }
    }

    // The boundary slot only contains the front of each queue
    let boundary_complete = enabled
        .iter()
        .all(|m| store.oldest(m).is_some_and(|f| f.event_number == boundary));
    if boundary_complete {
        let mut fragments = Vec::with_capacity(enabled.len());
        for module in enabled.iter() {
            if let Some(fragment) = store.pop_oldest(module) {
                pass.ledger.erased[module.index()] += 1;
                pass.ledger.matched[module.index()] += 1;
                fragments.push(fragment);
            }
        }
        pass.events.push(Event::new(boundary, spill_number, fragments));
    }

    Some(pass)
}

/// Check that a group holds exactly one fragment from each enabled module
fn is_complete(fragments: &[Fragment], enabled: &ModuleMask) -> bool {
    let mut counts = [0usize; NUMBER_OF_MODULES];
    for fragment in fragments {
        counts[fragment.module.index()] += 1;
    }
    ModuleId::all().all(|m| {
        if enabled.contains(m) {
            counts[m.index()] == 1
        } else {
            counts[m.index()] == 0
        }
    })
}
