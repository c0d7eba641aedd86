use serde::{Deserialize, Serialize};

/// Summary of one fill run, written next to the output artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub product: String,
    pub mode: String,
    pub template: Option<String>,
    pub sources: Vec<String>,
    pub attempts: u32,
    pub artifact_path: String,
}
