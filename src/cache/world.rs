/// World-level bookkeeping that does not belong to any other cache.
#[derive(Debug, Default)]
pub struct WorldCache {
    prediction_sequence: i32,
    pub time_of_day: i64,
    pub world_age: i64,
}

impl WorldCache {
    /// Sequence number for the next block interaction sent to the backend.
    pub fn next_prediction_sequence(&mut self) -> i32 {
        self.prediction_sequence = self.prediction_sequence.wrapping_add(1);
        self.prediction_sequence
    }
}
