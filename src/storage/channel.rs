use crate::config::MEASUREMENT_BUFFER_SIZE;

/// Rolling one-hour window of samples of a single quantity.
///
/// Writing past the capacity overwrites the oldest sample and marks the
/// channel full, after which all `MEASUREMENT_BUFFER_SIZE` slots are valid.
#[derive(Debug, Clone)]
pub struct MeasurementChannel {
    samples: [i32; MEASUREMENT_BUFFER_SIZE],
    cursor: usize,
    last_index: usize,
    full: bool,
}

impl Default for MeasurementChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementChannel {
    pub const fn new() -> Self {
        Self {
            samples: [0; MEASUREMENT_BUFFER_SIZE],
            cursor: 0,
            last_index: 0,
            full: false,
        }
    }

    pub fn add_sample(&mut self, value: i32) {
        self.last_index = self.cursor;
        self.samples[self.cursor] = value;
        self.cursor += 1;
        if self.cursor >= MEASUREMENT_BUFFER_SIZE {
            self.cursor = 0;
            self.full = true;
        }
    }

    pub fn sample_count(&self) -> usize {
        if self.full {
            MEASUREMENT_BUFFER_SIZE
        } else {
            self.cursor
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Valid samples, in storage order (not chronological once wrapped).
    pub fn samples(&self) -> &[i32] {
        &self.samples[..self.sample_count()]
    }

    /// Most recently written sample.
    pub fn last_sample(&self) -> Option<i32> {
        if self.sample_count() == 0 {
            None
        } else {
            Some(self.samples[self.last_index])
        }
    }

    /// Forget all samples. The buffer contents are left in place but are no
    /// longer reachable.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.full = false;
    }
}
