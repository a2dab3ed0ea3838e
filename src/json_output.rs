//! JSON output format for frequency matrices
//!
//! A run emits one document holding the row/column labels shared by the
//! batch and one flattened matrix per processed log file.

use crate::counter::{FreqCounter, FreqMatrix};
use crate::event::EventFeatureTuple;
use serde::{Deserialize, Serialize};

/// One file's normalized frequency matrix, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonMatrix {
    /// Source log file path
    pub source: String,
    /// Row count including the OOV row
    pub rows: usize,
    /// Column count including the OOV column
    pub cols: usize,
    /// Row-major cells
    pub data: Vec<f32>,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    /// Row labels: known processes, sorted; the final OOV row is implicit
    pub processes: Vec<String>,
    /// Column labels: known event-feature tuples, sorted; OOV column implicit
    pub evt_feature_tuples: Vec<EventFeatureTuple>,
    /// Active feature generator identifiers
    pub feature_generators: Vec<String>,
    /// One matrix per processed file, in input order
    pub matrices: Vec<JsonMatrix>,
}

impl JsonOutput {
    /// Create an output document labeled from a counter's vocabularies
    pub fn new(counter: &FreqCounter) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "escrutar-json-v1".to_string(),
            processes: counter.processes().map(String::from).collect(),
            evt_feature_tuples: counter.tuples().cloned().collect(),
            feature_generators: counter.generator_ids(),
            matrices: Vec::new(),
        }
    }

    /// Append one file's matrix
    pub fn add_matrix(&mut self, source: impl Into<String>, matrix: &FreqMatrix) {
        let (rows, cols) = matrix.shape();
        self.matrices.push(JsonMatrix {
            source: source.into(),
            rows,
            cols,
            data: matrix.flatten(),
        });
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
