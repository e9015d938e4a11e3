use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::upload::default_extensions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Directory holding `jobs.json` and `uploads.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub analysts: AnalystsConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".seqjobs")
        .join("data")
}

// One worker keeps jobs strictly first-in first-out.
fn default_worker_count() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            worker_count: default_worker_count(),
            uploads: UploadsConfig::default(),
            analysts: AnalystsConfig::default(),
        }
    }
}

impl Config {
    pub fn jobs_file(&self) -> PathBuf {
        self.data_dir.join("jobs.json")
    }

    pub fn uploads_file(&self) -> PathBuf {
        self.data_dir.join("uploads.json")
    }

    /// Rewrites relative paths so they point below `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        resolve(&mut self.data_dir, base);
        let metontiime = &mut self.analysts.metontiime;
        resolve(&mut metontiime.pipeline_source, base);
        resolve(&mut metontiime.database_dir, base);
    }
}

fn resolve(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalystsConfig {
    #[serde(default)]
    pub metontiime: MetontiimeConfig,
    #[serde(default)]
    pub example: ExampleConfig,
}

/// Settings for the containerized MetONTIIME pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetontiimeConfig {
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// Host directory containing `metontiime2.nf`.
    #[serde(default = "default_pipeline_source")]
    pub pipeline_source: PathBuf,
    /// Host directory containing the CARD reference files.
    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,
    #[serde(default = "default_sequences_fasta")]
    pub sequences_fasta: String,
    #[serde(default = "default_taxonomy_tsv")]
    pub taxonomy_tsv: String,
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Lets the pipeline start sibling containers.
    #[serde(default = "default_true")]
    pub mount_docker_socket: bool,
    /// Mounts the input directory read-only and moves the Nextflow work
    /// directory under the job's output directory.
    #[serde(default)]
    pub input_read_only: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_image() -> String {
    "metontiime-image".to_string()
}

fn default_pipeline_source() -> PathBuf {
    PathBuf::from("MetONTIIME")
}

fn default_database_dir() -> PathBuf {
    PathBuf::from("databases").join("card")
}

fn default_sequences_fasta() -> String {
    "nucleotide_fasta_protein_knockout_model.fasta".to_string()
}

fn default_taxonomy_tsv() -> String {
    "aro_index.tsv".to_string()
}

fn default_threads() -> u32 {
    8
}

impl Default for MetontiimeConfig {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            image: default_image(),
            pipeline_source: default_pipeline_source(),
            database_dir: default_database_dir(),
            sequences_fasta: default_sequences_fasta(),
            taxonomy_tsv: default_taxonomy_tsv(),
            threads: default_threads(),
            mount_docker_socket: true,
            input_read_only: false,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ExampleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
