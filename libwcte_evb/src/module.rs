use bit_set::BitSet;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::constants::{BANK_NAMES, NUMBER_OF_DIGITIZERS, NUMBER_OF_MODULES, TDC_MODULE_INDEX};
use super::error::ModuleError;

/// The kind of readout hardware behind a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Digitizer,
    Tdc,
}

/// ModuleId is a validated index of one of the WCTE readout modules.
///
/// Indices 0 to 3 are the DT5730 waveform digitizers, index 4 is the TRB3 TDC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ModuleId(usize);

impl ModuleId {
    pub const TDC: ModuleId = ModuleId(TDC_MODULE_INDEX);

    /// Create a ModuleId, failing if the index is outside of the readout
    pub fn new(index: usize) -> Result<Self, ModuleError> {
        if index < NUMBER_OF_MODULES {
            Ok(Self(index))
        } else {
            Err(ModuleError::BadModuleIndex(index))
        }
    }

    /// Create a ModuleId for one of the digitizers
    pub fn digitizer(index: usize) -> Result<Self, ModuleError> {
        if index < NUMBER_OF_DIGITIZERS {
            Ok(Self(index))
        } else {
            Err(ModuleError::NotADigitizer(index))
        }
    }

    /// Iterate over every module in index order
    pub fn all() -> impl Iterator<Item = ModuleId> {
        (0..NUMBER_OF_MODULES).map(ModuleId)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    pub fn kind(&self) -> ModuleKind {
        if self.0 == TDC_MODULE_INDEX {
            ModuleKind::Tdc
        } else {
            ModuleKind::Digitizer
        }
    }

    pub fn bank_name(&self) -> &'static str {
        BANK_NAMES[self.0]
    }
}

impl TryFrom<usize> for ModuleId {
    type Error = ModuleError;
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleId> for usize {
    fn from(value: ModuleId) -> Self {
        value.0
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of modules which take part in event building.
///
/// Fixed once a run starts; disabled modules are never ingested and never block matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMask {
    enabled: BitSet,
}

impl ModuleMask {
    /// Build a mask from a per-module flag array
    pub fn from_flags(flags: &[bool; NUMBER_OF_MODULES]) -> Self {
        let mut enabled = BitSet::with_capacity(NUMBER_OF_MODULES);
        for (idx, flag) in flags.iter().enumerate() {
            if *flag {
                enabled.insert(idx);
            }
        }
        Self { enabled }
    }

    pub fn set(&mut self, module: ModuleId, enabled: bool) {
        if enabled {
            self.enabled.insert(module.index());
        } else {
            self.enabled.remove(module.index());
        }
    }

    pub fn contains(&self, module: ModuleId) -> bool {
        self.enabled.contains(module.index())
    }

    /// Enabled modules in index order
    pub fn iter(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.enabled.iter().map(ModuleId)
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

impl Display for ModuleMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.iter().map(|m| m.to_string()).collect();
        write!(f, "[{}]", names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_bounds() {
        assert!(ModuleId::new(4).is_ok());
        assert!(ModuleId::new(5).is_err());
        assert!(ModuleId::digitizer(3).is_ok());
        assert!(ModuleId::digitizer(4).is_err());
        assert_eq!(ModuleId::TDC.kind(), ModuleKind::Tdc);
        assert_eq!(ModuleId::TDC.bank_name(), "TRB0");
        assert_eq!(ModuleId::new(2).unwrap().bank_name(), "D302");
    }

    #[test]
    fn test_mask() {
        let mut mask = ModuleMask::from_flags(&[true, false, true, false, false]);
        assert_eq!(mask.len(), 2);
        assert_eq!(mask.to_string(), "[0 2]");
        mask.set(ModuleId::TDC, true);
        mask.set(ModuleId::new(0).unwrap(), false);
        let enabled: Vec<usize> = mask.iter().map(|m| m.index()).collect();
        assert_eq!(enabled, vec![2, 4]);
    }
}
