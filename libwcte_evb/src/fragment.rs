use serde::{Deserialize, Serialize};

use super::constants::CHANNELS_PER_DIGITIZER;
use super::error::FragmentError;
use super::module::{ModuleId, ModuleKind};

/// A single TRB3 TDC hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TdcMeasurement {
    pub board_id: u32,
    pub tdc_measurement: u32,
    pub final_time: f64,
    pub semi_final_time: f64,
    pub fine_time: u32,
    pub coarse_time: u32,
    pub epoch_counter: u32,
    pub channel: u32,
}

/// The sampled waveforms of a DT5730 for a single trigger.
///
/// Every channel is read out by default. Samples given for a channel whose readout
/// has been disabled are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformPayload {
    waveforms: Vec<Vec<f64>>,
    readout: [bool; CHANNELS_PER_DIGITIZER],
}

impl Default for WaveformPayload {
    fn default() -> Self {
        Self {
            waveforms: vec![Vec::new(); CHANNELS_PER_DIGITIZER],
            readout: [true; CHANNELS_PER_DIGITIZER],
        }
    }
}

impl WaveformPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_readout(&mut self, channel: u8, enabled: bool) -> Result<(), FragmentError> {
        let idx = Self::check_channel(channel)?;
        self.readout[idx] = enabled;
        Ok(())
    }

    pub fn can_read_out(&self, channel: u8) -> bool {
        match Self::check_channel(channel) {
            Ok(idx) => self.readout[idx],
            Err(_) => false,
        }
    }

    /// Store the samples for a channel. Returns false if the channel is not read out.
    pub fn set_waveform(&mut self, channel: u8, samples: Vec<f64>) -> Result<bool, FragmentError> {
        let idx = Self::check_channel(channel)?;
        if !self.readout[idx] {
            return Ok(false);
        }
        self.waveforms[idx] = samples;
        Ok(true)
    }

    /// The samples of a channel; empty if the channel is invalid, not read out, or had no data
    pub fn waveform(&self, channel: u8) -> &[f64] {
        match Self::check_channel(channel) {
            Ok(idx) if self.readout[idx] => self.waveforms[idx].as_slice(),
            _ => &[],
        }
    }

    fn check_channel(channel: u8) -> Result<usize, FragmentError> {
        let idx = channel as usize;
        if idx < CHANNELS_PER_DIGITIZER {
            Ok(idx)
        } else {
            Err(FragmentError::BadChannel(channel))
        }
    }
}

/// The module-specific content of a fragment
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentPayload {
    Waveform(WaveformPayload),
    Tdc(Vec<TdcMeasurement>),
}

impl FragmentPayload {
    pub fn kind(&self) -> ModuleKind {
        match self {
            Self::Waveform(_) => ModuleKind::Digitizer,
            Self::Tdc(_) => ModuleKind::Tdc,
        }
    }
}

/// Fragment is one module's data for a single trigger, waiting to be matched into an Event.
///
/// The event number is the module-local counter assigned by the FragmentStore, not the
/// hardware event number.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub module: ModuleId,
    pub event_number: u32,
    pub timestamp: u32,
    pub trigger_time: u32,
    pub payload: FragmentPayload,
}

impl Fragment {
    pub fn new(
        module: ModuleId,
        event_number: u32,
        timestamp: u32,
        trigger_time: u32,
        payload: FragmentPayload,
    ) -> Self {
        Self {
            module,
            event_number,
            timestamp,
            trigger_time,
            payload,
        }
    }

    pub fn waveform(&self, channel: u8) -> &[f64] {
        match &self.payload {
            FragmentPayload::Waveform(wave) => wave.waveform(channel),
            FragmentPayload::Tdc(_) => &[],
        }
    }

    pub fn tdc_measurements(&self) -> &[TdcMeasurement] {
        match &self.payload {
            FragmentPayload::Tdc(measurements) => measurements.as_slice(),
            FragmentPayload::Waveform(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_readout() {
        let mut payload = WaveformPayload::new();
        assert!(payload.set_waveform(3, vec![1.0, 2.0]).unwrap());
        payload.set_readout(5, false).unwrap();
        assert!(!payload.set_waveform(5, vec![7.0]).unwrap());
        assert!(payload.set_waveform(8, vec![7.0]).is_err());
        assert_eq!(payload.waveform(3), &[1.0, 2.0]);
        assert!(payload.waveform(5).is_empty());
        assert!(payload.waveform(12).is_empty());
    }

    #[test]
    fn test_payload_access() {
        let tdc = Fragment::new(
            ModuleId::TDC,
            0,
            10,
            0,
            FragmentPayload::Tdc(vec![TdcMeasurement {
                channel: 2,
                ..Default::default()
            }]),
        );
        assert_eq!(tdc.payload.kind(), ModuleKind::Tdc);
        assert_eq!(tdc.tdc_measurements().len(), 1);
        assert!(tdc.waveform(0).is_empty());
    }
}
