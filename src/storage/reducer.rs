use heapless::Vec;

use super::MeasurementChannel;
use crate::config::MEASUREMENT_BUFFER_SIZE;

/// Statistic collapsing a channel into the single reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionPolicy {
    Min,
    Max,
    /// Median filter without averaging window.
    Median,
    /// Most recently written sample.
    Last,
}

impl ReductionPolicy {
    /// `None` when the channel holds no sample.
    pub fn reduce(self, channel: &MeasurementChannel) -> Option<i32> {
        let samples = channel.samples();
        match self {
            Self::Min => min(samples),
            Self::Max => max(samples),
            Self::Median => median_filter(samples, 0),
            Self::Last => channel.last_sample(),
        }
    }
}

pub fn min(samples: &[i32]) -> Option<i32> {
    samples.iter().copied().min()
}

pub fn max(samples: &[i32]) -> Option<i32> {
    samples.iter().copied().max()
}

/// Sort the samples and average the `average_length` values centred on the
/// median. A zero window yields the plain median (upper one for even counts).
pub fn median_filter(samples: &[i32], average_length: usize) -> Option<i32> {
    if samples.is_empty() || samples.len() > MEASUREMENT_BUFFER_SIZE {
        return None;
    }
    let mut sorted: Vec<i32, MEASUREMENT_BUFFER_SIZE> = Vec::new();
    sorted.extend_from_slice(samples).ok()?;
    sorted.sort_unstable();

    let middle = sorted.len() / 2;
    if average_length == 0 {
        return Some(sorted[middle]);
    }
    let window = average_length.min(sorted.len());
    let start = middle
        .saturating_sub(window / 2)
        .min(sorted.len() - window);
    average(&sorted[start..start + window])
}

fn average(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    Some((sum / values.len() as i64) as i32)
}
