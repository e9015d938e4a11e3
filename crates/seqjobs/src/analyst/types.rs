use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::upload::UploadRecord;

/// Name of the input carrying the uploaded sequence file.
pub const INPUT_FILE: &str = "inputFile";
/// Name of the input carrying the job-scoped output directory.
pub const OUTPUT_DIR: &str = "outputDir";
/// Name of the input carrying the human-readable job name.
pub const JOB_NAME: &str = "jobName";

/// Kind of value an analyst input expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    File,
    Directory,
    String,
}

/// Declarative description of a named analyst input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub description: String,
    pub required: bool,
    /// Accepted file name suffixes, e.g. `.fastq`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    /// Accepted values for string inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl InputSpec {
    fn new(name: &str, kind: InputKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            extensions: vec![],
            options: vec![],
        }
    }

    pub fn file(name: &str, description: &str) -> Self {
        Self::new(name, InputKind::File, description)
    }

    pub fn directory(name: &str, description: &str) -> Self {
        Self::new(name, InputKind::Directory, description)
    }

    pub fn text(name: &str, description: &str) -> Self {
        Self::new(name, InputKind::String, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Returns true if `file_name` ends with one of the declared extensions.
    /// An input without declared extensions accepts any name.
    pub fn accepts_file_name(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let lower = file_name.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

/// A reference dataset an analyst needs visible at run time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    /// Role name (`fasta`, `tsv`, ...) to file name inside `path`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub required_files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub required: bool,
}

impl DatabaseSpec {
    pub fn new(name: &str, kind: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            required_files: BTreeMap::new(),
            path: None,
            required: false,
        }
    }

    /// A request-side selection carrying only the database name.
    pub fn named(name: &str) -> Self {
        Self::new(name, "", "")
    }

    pub fn with_file(mut self, role: &str, file_name: &str) -> Self {
        self.required_files
            .insert(role.to_string(), file_name.to_string());
        self
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn file(&self, role: &str) -> Option<&str> {
        self.required_files.get(role).map(String::as_str)
    }

    /// Full host path of a required file, if both the directory and the role are known.
    pub fn file_path(&self, role: &str) -> Option<PathBuf> {
        let dir = self.path.as_ref()?;
        self.file(role).map(|f| dir.join(f))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Read-only metadata of a registered analyst.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalystDescriptor {
    /// Registry key (lower-case).
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub version: String,
    pub required_inputs: Vec<InputSpec>,
    pub supported_databases: Vec<DatabaseSpec>,
}

/// Value supplied for a named input.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InputValue {
    File(UploadRecord),
    Directory(PathBuf),
    Text(String),
}

impl InputValue {
    pub fn is_empty(&self) -> bool {
        match self {
            InputValue::File(_) => false,
            InputValue::Directory(dir) => dir.as_os_str().is_empty(),
            InputValue::Text(text) => text.trim().is_empty(),
        }
    }
}

/// Parameters handed to [`Analyst::analyze`](super::Analyst::analyze).
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    pub job_id: String,
    pub database: DatabaseSpec,
    inputs: BTreeMap<String, InputValue>,
}

impl AnalysisParams {
    pub fn new(job_id: &str, database: DatabaseSpec) -> Self {
        Self {
            job_id: job_id.to_string(),
            database,
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, name: &str, value: InputValue) -> Self {
        self.set_input(name, value);
        self
    }

    pub fn set_input(&mut self, name: &str, value: InputValue) {
        self.inputs.insert(name.to_string(), value);
    }

    /// Returns the value for `name`, treating blank values as absent.
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name).filter(|v| !v.is_empty())
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }

    pub fn input_file(&self) -> Option<&UploadRecord> {
        match self.input(INPUT_FILE) {
            Some(InputValue::File(upload)) => Some(upload),
            _ => None,
        }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        match self.input(OUTPUT_DIR) {
            Some(InputValue::Directory(dir)) => Some(dir.as_path()),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.input(name) {
            Some(InputValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn job_name(&self) -> Option<&str> {
        self.text(JOB_NAME)
    }
}

/// Result of a finished analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    pub message: String,
    pub result_files: Vec<String>,
    pub output_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

impl AnalysisOutcome {
    pub fn succeeded(message: &str, result_files: Vec<String>, output_directory: &Path) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            result_files,
            output_directory: output_directory.to_path_buf(),
            summary: None,
        }
    }

    /// An outcome the analyst reports as unsuccessful without raising an error.
    pub fn unsuccessful(message: &str, output_directory: &Path) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            result_files: vec![],
            output_directory: output_directory.to_path_buf(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: serde_json::Value) -> Self {
        self.summary = Some(summary);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_spec_extension_matching() {
        let spec = InputSpec::file(INPUT_FILE, "reads").with_extensions(&[".fastq", ".gz"]);
        assert!(spec.accepts_file_name("reads.fastq"));
        assert!(spec.accepts_file_name("READS.FASTQ"));
        assert!(spec.accepts_file_name("reads.fastq.gz"));
        assert!(!spec.accepts_file_name("reads.bam"));

        let any = InputSpec::file("other", "anything");
        assert!(any.accepts_file_name("whatever.bin"));
    }

    #[test]
    fn test_input_spec_serializes_type_field() {
        let spec = InputSpec::text("analysisType", "mode")
            .required()
            .with_options(&["word_count"]);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["required"], true);
        assert_eq!(json["options"][0], "word_count");
        assert!(json.get("extensions").is_none());
    }

    #[test]
    fn test_database_file_path() {
        let db = DatabaseSpec::new("CARD Database", "antibiotic_resistance", "CARD")
            .with_file("fasta", "card.fasta")
            .with_path("/data/card");
        assert_eq!(
            db.file_path("fasta"),
            Some(PathBuf::from("/data/card/card.fasta"))
        );
        assert_eq!(db.file_path("tsv"), None);
        assert!(DatabaseSpec::named("CARD Database").file_path("fasta").is_none());
    }

    #[test]
    fn test_database_name_matching_is_case_insensitive() {
        let db = DatabaseSpec::named("CARD Database");
        assert!(db.matches_name("card database"));
        assert!(db.matches_name("  CARD DATABASE "));
        assert!(!db.matches_name("SILVA"));
    }

    #[test]
    fn test_blank_inputs_are_absent() {
        let params = AnalysisParams::new("job-1", DatabaseSpec::named("db"))
            .with_input(JOB_NAME, InputValue::Text("   ".to_string()))
            .with_input(OUTPUT_DIR, InputValue::Directory(PathBuf::new()));
        assert!(!params.has_input(JOB_NAME));
        assert!(params.job_name().is_none());
        assert!(params.output_dir().is_none());
    }

    #[test]
    fn test_typed_accessors() {
        let params = AnalysisParams::new("job-1", DatabaseSpec::named("db"))
            .with_input(OUTPUT_DIR, InputValue::Directory(PathBuf::from("/out")))
            .with_input("analysisType", InputValue::Text("line_count".to_string()));
        assert_eq!(params.output_dir(), Some(Path::new("/out")));
        assert_eq!(params.text("analysisType"), Some("line_count"));
        assert!(params.input_file().is_none());
        // Typed accessor does not coerce across kinds
        assert!(params.text(OUTPUT_DIR).is_none());
    }
}
