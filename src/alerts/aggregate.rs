//! Reduction of a fetched series to the single value rules are evaluated on

use crate::data::DataPoint;

/// Mean over present samples. Null samples are skipped, zeros are counted.
#[derive(Debug, Clone, Default)]
pub struct MeanAccumulator {
    sum: f64,
    count: u64,
}

impl MeanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    /// NaN when no sample was present
    pub fn result(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            f64::NAN
        }
    }
}

/// Current value of a series: arithmetic mean of its non-null points
pub fn current_value(points: &[DataPoint]) -> f64 {
    let mut acc = MeanAccumulator::new();
    for point in points {
        acc.accumulate(point.value());
    }
    acc.result()
}
