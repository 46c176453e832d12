use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::delivery::TriggerDelivery;
use super::error::TraceError;

/// A recorded sequence of trigger deliveries for one run.
///
/// Trace files are YAML lists of already-decoded MIDAS events, used to replay a run through the
/// event builder offline. Every delivery is checked when the file is opened.
#[derive(Debug)]
pub struct TraceFile {
    deliveries: VecDeque<TriggerDelivery>,
    total_deliveries: usize,
    file_path: PathBuf,
}

impl TraceFile {
    pub fn new(path: &Path) -> Result<Self, TraceError> {
        if !path.exists() {
            return Err(TraceError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml_str, path)
    }

    fn from_yaml(yaml_str: &str, path: &Path) -> Result<Self, TraceError> {
        let deliveries: Vec<TriggerDelivery> = serde_yaml::from_str(yaml_str)?;
        for (idx, delivery) in deliveries.iter().enumerate() {
            delivery
                .validate()
                .map_err(|e| TraceError::BadDelivery(idx, e))?;
        }
        Ok(Self {
            total_deliveries: deliveries.len(),
            deliveries: deliveries.into(),
            file_path: path.to_path_buf(),
        })
    }

    /// Get the next delivery. None once the trace is exhausted.
    pub fn get_next_delivery(&mut self) -> Option<TriggerDelivery> {
        self.deliveries.pop_front()
    }

    pub fn total_deliveries(&self) -> usize {
        self.total_deliveries
    }

    pub fn remaining_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleId;

    const TRACE: &str = r#"
- timestamp: 100
  digitizer_banks:
    - module: 0
      records:
        - channel: 0
          samples: [1.0, 2.0, 3.0]
          hardware_event_number: 0
          trigger_time: 10
  tdc_bank:
    trigger_number: 0
    measurements:
      - board_id: 1
        tdc_measurement: 5
        final_time: 1.5
        semi_final_time: 1.0
        fine_time: 3
        coarse_time: 4
        epoch_counter: 0
        channel: 2
- timestamp: 105
"#;

    #[test]
    fn test_parse_trace() {
        let mut trace = TraceFile::from_yaml(TRACE, Path::new("run_0001.yaml")).unwrap();
        assert_eq!(trace.total_deliveries(), 2);
        let first = trace.get_next_delivery().unwrap();
        assert_eq!(first.digitizer_banks[0].module, ModuleId::new(0).unwrap());
        assert_eq!(first.digitizer_banks[0].records[0].samples.len(), 3);
        assert_eq!(first.tdc_bank.as_ref().map(|b| b.measurements.len()), Some(1));
        let second = trace.get_next_delivery().unwrap();
        assert!(second.digitizer_banks.is_empty());
        assert!(second.tdc_bank.is_none());
        assert!(trace.get_next_delivery().is_none());
    }

    #[test]
    fn test_bad_module_is_rejected() {
        let yaml = "- timestamp: 1\n  digitizer_banks:\n    - module: 7\n";
        assert!(matches!(
            TraceFile::from_yaml(yaml, Path::new("bad.yaml")),
            Err(TraceError::ParsingError(_))
        ));
    }

    #[test]
    fn test_tdc_as_digitizer_is_rejected() {
        let yaml = "- timestamp: 1\n  digitizer_banks:\n    - module: 4\n";
        assert!(matches!(
            TraceFile::from_yaml(yaml, Path::new("bad.yaml")),
            Err(TraceError::BadDelivery(0, _))
        ));
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_0001.yaml");
        std::fs::write(&path, TRACE).unwrap();
        let trace = TraceFile::new(&path).unwrap();
        assert_eq!(trace.remaining_deliveries(), 2);
        assert_eq!(trace.file_path(), path.as_path());
        assert!(matches!(
            TraceFile::new(&dir.path().join("run_0002.yaml")),
            Err(TraceError::BadFilePath(_))
        ));
    }
}
