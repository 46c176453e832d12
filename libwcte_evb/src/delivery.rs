use serde::{Deserialize, Serialize};

use super::constants::CHANNELS_PER_DIGITIZER;
use super::error::{FragmentError, ModuleError};
use super::fragment::TdcMeasurement;
use super::module::{ModuleId, ModuleKind, ModuleMask};

/// One decoded channel readout from a digitizer bank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformRecord {
    pub channel: u8,
    pub samples: Vec<f64>,
    pub hardware_event_number: u32,
    pub trigger_time: u32,
}

/// A decoded D30x bank. Records of one trigger are contiguous and share a hardware event number;
/// a bank may contain several triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitizerBank {
    pub module: ModuleId,
    #[serde(default)]
    pub records: Vec<WaveformRecord>,
}

/// A decoded TRB0 bank. Always exactly one trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TdcBank {
    pub trigger_number: u32,
    #[serde(default)]
    pub measurements: Vec<TdcMeasurement>,
}

/// Everything the acquisition delivered for one MIDAS event.
///
/// `timestamp` is the coarse (seconds) MIDAS event time shared by all banks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerDelivery {
    pub timestamp: u32,
    #[serde(default)]
    pub digitizer_banks: Vec<DigitizerBank>,
    #[serde(default)]
    pub tdc_bank: Option<TdcBank>,
}

impl TriggerDelivery {
    pub fn new(timestamp: u32) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// Get the bank for a given digitizer, if it was delivered
    pub fn digitizer_bank(&self, module: ModuleId) -> Option<&DigitizerBank> {
        self.digitizer_banks
            .iter()
            .find(|bank| bank.module == module)
    }

    /// Check if any of the enabled modules delivered a bank
    pub fn has_data_for(&self, enabled: &ModuleMask) -> bool {
        enabled.iter().any(|module| match module.kind() {
            ModuleKind::Digitizer => self.digitizer_bank(module).is_some(),
            ModuleKind::Tdc => self.tdc_bank.is_some(),
        })
    }

    /// Check that every digitizer bank comes from a digitizer and uses valid channels
    pub fn validate(&self) -> Result<(), FragmentError> {
        for bank in self.digitizer_banks.iter() {
            if bank.module.kind() != ModuleKind::Digitizer {
                return Err(ModuleError::NotADigitizer(bank.module.index()).into());
            }
            if let Some(record) = bank
                .records
                .iter()
                .find(|r| r.channel as usize >= CHANNELS_PER_DIGITIZER)
            {
                return Err(FragmentError::BadChannel(record.channel));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_data() {
        let mut delivery = TriggerDelivery::new(100);
        let mask = ModuleMask::from_flags(&[false, true, false, false, true]);
        assert!(!delivery.has_data_for(&mask));
        delivery.digitizer_banks.push(DigitizerBank {
            module: ModuleId::new(0).unwrap(),
            records: vec![],
        });
        assert!(!delivery.has_data_for(&mask));
        delivery.tdc_bank = Some(TdcBank::default());
        assert!(delivery.has_data_for(&mask));
    }

    #[test]
    fn test_validate() {
        let mut delivery = TriggerDelivery::new(0);
        delivery.digitizer_banks.push(DigitizerBank {
            module: ModuleId::new(1).unwrap(),
            records: vec![WaveformRecord {
                channel: 9,
                ..Default::default()
            }],
        });
        assert!(matches!(
            delivery.validate(),
            Err(FragmentError::BadChannel(9))
        ));
        delivery.digitizer_banks[0].records[0].channel = 7;
        assert!(delivery.validate().is_ok());
        delivery.digitizer_banks[0].module = ModuleId::TDC;
        assert!(delivery.validate().is_err());
    }
}
