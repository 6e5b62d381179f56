//! Time-series returned by the metrics render endpoint

use serde::{Deserialize, Serialize};

/// A single sample: `[value, timestamp]`, value is null when the backend has
/// no data for that slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint(pub Option<f64>, pub i64);

impl DataPoint {
    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.1
    }
}

/// One series per source/host reporting on a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    #[serde(rename = "target")]
    pub label: String,
    #[serde(rename = "datapoints", default)]
    pub points: Vec<DataPoint>,
}

impl MetricSeries {
    pub fn new(label: impl Into<String>, points: Vec<DataPoint>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}
