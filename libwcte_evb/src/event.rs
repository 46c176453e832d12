use super::fragment::{Fragment, TdcMeasurement};
use super::module::ModuleId;

/// Event is a complete WCTE event: one Fragment from every enabled module.
///
/// Fragments are kept in module order. Events are only constructed by the correlator.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_number: u32,
    spill_number: u32,
    fragments: Vec<Fragment>,
}

impl Event {
    pub(crate) fn new(event_number: u32, spill_number: u32, mut fragments: Vec<Fragment>) -> Self {
        fragments.sort_by_key(|f| f.module);
        Self {
            event_number,
            spill_number,
            fragments,
        }
    }

    pub fn event_number(&self) -> u32 {
        self.event_number
    }

    pub fn spill_number(&self) -> u32 {
        self.spill_number
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment(&self, module: ModuleId) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.module == module)
    }

    /// The coarse timestamp of a module's fragment, or 0 if the module is not in this event
    pub fn timestamp(&self, module: ModuleId) -> u32 {
        self.fragment(module).map_or(0, |f| f.timestamp)
    }

    /// The hardware trigger time of a module's fragment, or 0 if the module is not in this event
    pub fn trigger_time(&self, module: ModuleId) -> u32 {
        self.fragment(module).map_or(0, |f| f.trigger_time)
    }

    /// The waveform of a digitizer channel. Empty if there is no such waveform.
    pub fn waveform(&self, module: ModuleId, channel: u8) -> &[f64] {
        self.fragment(module)
            .map(|f| f.waveform(channel))
            .unwrap_or(&[])
    }

    /// The TDC hits of this event. Empty if the TDC is not part of the event.
    pub fn tdc_measurements(&self) -> &[TdcMeasurement] {
        self.fragment(ModuleId::TDC)
            .map(|f| f.tdc_measurements())
            .unwrap_or(&[])
    }
}
