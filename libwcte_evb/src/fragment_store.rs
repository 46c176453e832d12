use std::collections::VecDeque;

use super::constants::NUMBER_OF_MODULES;
use super::fragment::Fragment;
use super::module::{ModuleId, ModuleMask};

/// FragmentStore holds the fragments of each module which have not yet been matched.
///
/// Each module has its own FIFO queue ordered by event number. Event numbers are handed out
/// by the store itself from a per-module counter, so arrival order is always numeric order
/// no matter what the hardware counters do.
///
/// Once a fragment has left a queue, its event number is closed for that module until the
/// numbering is reset.
#[derive(Debug, Default)]
pub struct FragmentStore {
    queues: [VecDeque<Fragment>; NUMBER_OF_MODULES],
    next_event_numbers: [u32; NUMBER_OF_MODULES],
    /// Lowest event number a module may still queue
    open_from: [u32; NUMBER_OF_MODULES],
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next local event number for a module
    pub fn assign_event_number(&mut self, module: ModuleId) -> u32 {
        let counter = &mut self.next_event_numbers[module.index()];
        let number = *counter;
        *counter += 1;
        number
    }

    /// Append a fragment to the back of its module's queue.
    ///
    /// Fragments are refused (returns false) if they are numbered below the highest number
    /// ingested or assigned for the module, or below a number which already left the queue.
    /// A queue is therefore always in event number order, and a number is never matched twice.
    /// The module counter is moved past the fragment.
    pub fn ingest(&mut self, fragment: Fragment) -> bool {
        let idx = fragment.module.index();
        let number = fragment.event_number;
        if number < self.open_from[idx]
            || number.saturating_add(1) < self.next_event_numbers[idx]
        {
            return false;
        }
        let next = &mut self.next_event_numbers[idx];
        *next = (*next).max(number.saturating_add(1));
        self.queues[idx].push_back(fragment);
        true
    }

    pub fn oldest(&self, module: ModuleId) -> Option<&Fragment> {
        self.queues[module.index()].front()
    }

    pub fn newest(&self, module: ModuleId) -> Option<&Fragment> {
        self.queues[module.index()].back()
    }

    /// Remove and discard the first `count` fragments of a module. Returns how many were removed.
    pub fn evict_prefix(&mut self, module: ModuleId, count: usize) -> usize {
        self.take_prefix(module, count).count()
    }

    /// Remove the first `count` fragments of a module, handing them to the caller
    pub fn take_prefix(
        &mut self,
        module: ModuleId,
        count: usize,
    ) -> impl Iterator<Item = Fragment> + '_ {
        let idx = module.index();
        let queue = &mut self.queues[idx];
        let count = count.min(queue.len());
        if let Some(last) = count.checked_sub(1).and_then(|i| queue.get(i)) {
            let open_from = &mut self.open_from[idx];
            *open_from = (*open_from).max(last.event_number.saturating_add(1));
        }
        queue.drain(..count)
    }

    pub fn pop_oldest(&mut self, module: ModuleId) -> Option<Fragment> {
        self.take_prefix(module, 1).next()
    }

    /// Number of leading fragments whose event number is below `boundary`
    pub fn count_before(&self, module: ModuleId, boundary: u32) -> usize {
        self.queues[module.index()]
            .iter()
            .take_while(|f| f.event_number < boundary)
            .count()
    }

    pub fn len(&self, module: ModuleId) -> usize {
        self.queues[module.index()].len()
    }

    pub fn is_empty(&self, module: ModuleId) -> bool {
        self.queues[module.index()].is_empty()
    }

    /// Total number of fragments waiting in the queues of the given modules
    pub fn pending(&self, modules: &ModuleMask) -> usize {
        modules.iter().map(|m| self.len(m)).sum()
    }

    /// The event numbers of up to `limit` of the oldest fragments of a module
    pub fn pending_event_numbers(&self, module: ModuleId, limit: usize) -> Vec<u32> {
        self.queues[module.index()]
            .iter()
            .take(limit)
            .map(|f| f.event_number)
            .collect()
    }

    /// Drop every queued fragment. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        ModuleId::all()
            .map(|m| self.evict_prefix(m, usize::MAX))
            .sum()
    }

    /// Restart all local event numbers from zero
    pub fn reset_event_numbers(&mut self) {
        self.next_event_numbers = [0; NUMBER_OF_MODULES];
        self.open_from = [0; NUMBER_OF_MODULES];
    }
}
