// src/config/classifier.rs

use serde::{Deserialize, Serialize};

use super::helpers::env_or;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Absolute path to the incident-classification subprocess binary.
    /// `None` disables the classifier job (it discards immediately).
    pub incident_classification_binary: Option<String>,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        let path = env_or("CLASSIFIER_INCIDENT_CLASSIFICATION_BINARY", "");
        Self {
            incident_classification_binary: if path.is_empty() { None } else { Some(path) },
        }
    }
}
