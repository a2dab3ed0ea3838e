//! Persistence of trained vocabularies
//!
//! A training run ends with sorted vocabularies and a feature-generator list;
//! detection needs exactly these to reproduce the matrix shape. The bundle is
//! stored as JSON.

use crate::counter::FreqCounter;
use crate::event::EventFeatureTuple;
use crate::features::FeatureGenerator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors for model save/load operations
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid model format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("feature generator mismatch: model was trained with [{expected}], got [{found}]")]
    GeneratorMismatch { expected: String, found: String },
}

/// Result type for model persistence operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Everything a detection run needs to rebuild the training-time matrix shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyModel {
    /// Crate version that produced the model
    pub version: String,
    /// Known process names, sorted
    pub processes: Vec<String>,
    /// Known event-feature tuples, sorted
    pub evt_feature_tuples: Vec<EventFeatureTuple>,
    /// Identifiers of the feature generators active at training time
    pub feature_generators: Vec<String>,
}

impl VocabularyModel {
    /// Snapshot a training-run counter
    pub fn from_counter(counter: &FreqCounter) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            processes: counter.processes().map(String::from).collect(),
            evt_feature_tuples: counter.tuples().cloned().collect(),
            feature_generators: counter.generator_ids(),
        }
    }

    /// Rebuild a detection-mode counter over the frozen vocabularies
    ///
    /// The supplied generators must match the model's generator list, in
    /// order; a mismatch would silently change the tuple space and therefore
    /// the matrix columns.
    pub fn into_counter(self, generators: Vec<Box<dyn FeatureGenerator>>) -> Result<FreqCounter> {
        let found: Vec<String> = generators.iter().map(|g| g.id().to_string()).collect();
        if found != self.feature_generators {
            return Err(ModelError::GeneratorMismatch {
                expected: self.feature_generators.join(", "),
                found: found.join(", "),
            });
        }

        Ok(FreqCounter::with_vocabulary(
            self.processes,
            self.evt_feature_tuples,
            generators,
        ))
    }

    /// Write the model as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a model from JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        if !path.as_ref().exists() {
            return Err(ModelError::FileNotFound(
                path.as_ref().display().to_string(),
            ));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
