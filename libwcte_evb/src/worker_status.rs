/// Progress of a replay worker, sent back to whoever spawned it
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub spill_number: u32,
    pub bad_spills: u32,
}

impl WorkerStatus {
    pub fn new(
        progress: f32,
        run_number: i32,
        worker_id: usize,
        spill_number: u32,
        bad_spills: u32,
    ) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            spill_number,
            bad_spills,
        }
    }
}
