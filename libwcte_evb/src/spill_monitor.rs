/// Where the acquisition is with respect to a spill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpillState {
    /// Data has been seen and the idle threshold has not been exceeded
    Receiving { last_data_timestamp: u32 },
    /// No data since startup or since the last spill ended
    Idle,
}

/// SpillMonitor detects the end of a spill from the time since the last data was received.
///
/// There is no explicit end-of-spill marker in the data stream. Once the gap between the current
/// trigger and the last trigger carrying data from an enabled module exceeds the idle threshold,
/// the spill is over. The end is reported once; the monitor then waits for new data.
#[derive(Debug, Clone)]
pub struct SpillMonitor {
    state: SpillState,
    idle_threshold: u32,
}

impl SpillMonitor {
    pub fn new(idle_threshold: u32) -> Self {
        Self {
            state: SpillState::Idle,
            idle_threshold,
        }
    }

    /// Feed the timestamp of a trigger and whether any enabled module delivered data with it.
    ///
    /// Returns true exactly when this trigger ends the spill.
    pub fn update(&mut self, timestamp: u32, has_data: bool) -> bool {
        if has_data {
            self.state = SpillState::Receiving {
                last_data_timestamp: timestamp,
            };
            return false;
        }
        match self.state {
            SpillState::Receiving {
                last_data_timestamp,
            } if timestamp.saturating_sub(last_data_timestamp) > self.idle_threshold => {
                self.state = SpillState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> SpillState {
        self.state
    }

    pub fn idle_threshold(&self) -> u32 {
        self.idle_threshold
    }

    pub fn reset(&mut self) {
        self.state = SpillState::Idle;
    }
}
