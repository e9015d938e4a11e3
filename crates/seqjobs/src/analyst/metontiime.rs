use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use super::types::{
    AnalysisOutcome, AnalysisParams, DatabaseSpec, InputSpec, INPUT_FILE, JOB_NAME, OUTPUT_DIR,
};
use super::validation::ValidationIssue;
use super::Analyst;
use crate::config::MetontiimeConfig;
use crate::error::AnalysisError;
use crate::pipeline::{metontiime_command, MetontiimeRun, PipelineCommand, PipelineInvoker};
use crate::upload::DEFAULT_SEQUENCE_EXTENSIONS;

const CARD_DATABASE: &str = "CARD Database";

/// Taxonomic classification of ONT amplicon reads through the containerized
/// MetONTIIME Nextflow pipeline.
pub struct MetontiimeAnalyst {
    config: MetontiimeConfig,
    invoker: PipelineInvoker,
}

impl MetontiimeAnalyst {
    pub const KEY: &'static str = "metontiime";

    pub fn new(config: MetontiimeConfig) -> Self {
        let invoker = PipelineInvoker::new().with_timeout(config.timeout_secs.map(Duration::from_secs));
        Self { config, invoker }
    }

    /// Checks that the reference files and pipeline source exist on the host.
    pub fn check_configuration(&self, database: &DatabaseSpec) -> Vec<String> {
        let database_dir = self.database_dir(database);
        let required = [
            (
                "CARD FASTA file",
                database_dir.join(self.sequences_fasta(database)),
            ),
            ("CARD TSV file", database_dir.join(self.taxonomy_tsv(database))),
            (
                "MetONTIIME source directory",
                self.config.pipeline_source.clone(),
            ),
        ];

        required
            .into_iter()
            .filter(|(_, path)| !path.exists())
            .map(|(label, path)| format!("Missing {}: {}", label, path.display()))
            .collect()
    }

    /// The command that would run for `input_dir` and `output_dir`.
    pub fn command_for(
        &self,
        database: &DatabaseSpec,
        input_dir: &Path,
        output_dir: &Path,
    ) -> PipelineCommand {
        let run = MetontiimeRun {
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            database_dir: self.database_dir(database),
            sequences_fasta: self.sequences_fasta(database).to_string(),
            taxonomy_tsv: self.taxonomy_tsv(database).to_string(),
        };
        metontiime_command(&self.config, &run)
    }

    // The job's database snapshot wins over the live configuration.
    fn database_dir(&self, database: &DatabaseSpec) -> PathBuf {
        database
            .path
            .clone()
            .unwrap_or_else(|| self.config.database_dir.clone())
    }

    fn sequences_fasta<'a>(&'a self, database: &'a DatabaseSpec) -> &'a str {
        database
            .file("fasta")
            .unwrap_or(&self.config.sequences_fasta)
    }

    fn taxonomy_tsv<'a>(&'a self, database: &'a DatabaseSpec) -> &'a str {
        database.file("tsv").unwrap_or(&self.config.taxonomy_tsv)
    }
}

impl Analyst for MetontiimeAnalyst {
    fn name(&self) -> &str {
        "MetONTIIME"
    }

    fn description(&self) -> &str {
        "MetONTIIME: Metagenomic ONT amplIcons an Accurate Microbial taxonomic classification in real-TIME"
    }

    fn version(&self) -> &str {
        "2.0.0"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::file(INPUT_FILE, "FASTQ/FASTA input file (optionally gzip-compressed)")
                .required()
                .with_extensions(DEFAULT_SEQUENCE_EXTENSIONS),
            InputSpec::directory(OUTPUT_DIR, "Directory receiving the analysis results").required(),
            InputSpec::text(JOB_NAME, "Job name (optional)"),
        ]
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![DatabaseSpec::new(
            CARD_DATABASE,
            "antibiotic_resistance",
            "Comprehensive Antibiotic Resistance Database",
        )
        .with_file("fasta", &self.config.sequences_fasta)
        .with_file("tsv", &self.config.taxonomy_tsv)
        .with_path(&self.config.database_dir)
        .required()]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        info!("Starting MetONTIIME analysis for job {}", params.job_id);

        let validation = self.validate_params(params);
        if !validation.is_valid() {
            return Err(AnalysisError::InvalidParams(validation.into_issues()));
        }

        let config_errors = self.check_configuration(&params.database);
        if !config_errors.is_empty() {
            return Err(AnalysisError::Configuration(config_errors));
        }

        let (Some(upload), Some(output_dir)) = (params.input_file(), params.output_dir()) else {
            return Err(AnalysisError::InvalidParams(vec![ValidationIssue::Missing {
                input: INPUT_FILE.to_string(),
            }]));
        };

        let input_dir = upload.parent_dir().ok_or_else(|| AnalysisError::Io {
            path: upload.source_path.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "input file has no parent directory",
            ),
        })?;

        info!("Input file: {}", upload.source_path.display());
        info!("Output directory: {}", output_dir.display());

        std::fs::create_dir_all(output_dir).map_err(|e| AnalysisError::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let command = self.command_for(&params.database, input_dir, output_dir);
        let run = self.invoker.run(&command, output_dir)?;

        if run.result_files.is_empty() {
            warn!("Analysis completed but no result files were generated");
        } else {
            info!("Generated {} result files", run.result_files.len());
            for file in &run.result_files {
                info!("- {}", file);
            }
        }

        Ok(AnalysisOutcome::succeeded(
            "MetONTIIME analysis completed successfully",
            run.result_files,
            output_dir,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::types::InputValue;
    use crate::upload::UploadRecord;
    use tempfile::TempDir;

    fn layout(dir: &Path) -> MetontiimeConfig {
        let database_dir = dir.join("card");
        let pipeline_source = dir.join("MetONTIIME");
        std::fs::create_dir_all(&database_dir).unwrap();
        std::fs::create_dir_all(&pipeline_source).unwrap();
        std::fs::write(
            database_dir.join("nucleotide_fasta_protein_knockout_model.fasta"),
            b">seq\nACGT\n",
        )
        .unwrap();
        std::fs::write(database_dir.join("aro_index.tsv"), b"ARO\tName\n").unwrap();

        MetontiimeConfig {
            database_dir,
            pipeline_source,
            ..MetontiimeConfig::default()
        }
    }

    #[test]
    fn test_declarations() {
        let analyst = MetontiimeAnalyst::new(MetontiimeConfig::default());
        let inputs = analyst.required_inputs();
        let names: Vec<&str> = inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec![INPUT_FILE, OUTPUT_DIR, JOB_NAME]);
        assert!(!inputs[2].required);

        let dbs = analyst.supported_databases();
        assert_eq!(dbs.len(), 1);
        assert_eq!(dbs[0].name, "CARD Database");
        assert!(dbs[0].required);
        assert_eq!(dbs[0].file("tsv"), Some("aro_index.tsv"));
    }

    #[test]
    fn test_check_configuration_reports_missing_paths() {
        let dir = TempDir::new().unwrap();
        let config = MetontiimeConfig {
            database_dir: dir.path().join("missing-card"),
            pipeline_source: dir.path().join("missing-src"),
            ..MetontiimeConfig::default()
        };
        let analyst = MetontiimeAnalyst::new(config);
        let db = analyst.supported_databases().remove(0);

        let errors = analyst.check_configuration(&db);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("Missing CARD FASTA file"));
        assert!(errors[2].starts_with("Missing MetONTIIME source directory"));
    }

    #[test]
    fn test_check_configuration_passes_with_files() {
        let dir = TempDir::new().unwrap();
        let analyst = MetontiimeAnalyst::new(layout(dir.path()));
        let db = analyst.supported_databases().remove(0);
        assert!(analyst.check_configuration(&db).is_empty());
    }

    #[test]
    fn test_snapshot_path_overrides_config() {
        let dir = TempDir::new().unwrap();
        let analyst = MetontiimeAnalyst::new(layout(dir.path()));
        let snapshot = DatabaseSpec::named("CARD Database").with_path("/snapshots/card");

        let cmd = analyst.command_for(&snapshot, Path::new("/in"), Path::new("/out"));
        assert!(cmd
            .args
            .contains(&"/snapshots/card:/app/databases/card:ro".to_string()));
    }

    #[test]
    fn test_analyze_rejects_missing_inputs() {
        let analyst = MetontiimeAnalyst::new(MetontiimeConfig::default());
        let params = AnalysisParams::new("job-1", DatabaseSpec::named("CARD Database"));

        match analyst.analyze(&params) {
            Err(AnalysisError::InvalidParams(issues)) => assert_eq!(issues.len(), 2),
            other => panic!("Expected InvalidParams, got {:?}", other),
        }
    }

    #[test]
    fn test_analyze_fails_on_configuration_before_spawning() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("reads.fastq");
        std::fs::write(&input, b"@r\nA\n+\nI\n").unwrap();

        let config = MetontiimeConfig {
            database_dir: dir.path().join("nowhere"),
            pipeline_source: dir.path().join("nowhere-src"),
            docker_binary: "/nonexistent/docker".to_string(),
            ..MetontiimeConfig::default()
        };
        let analyst = MetontiimeAnalyst::new(config);
        let db = analyst.supported_databases().remove(0);
        let upload = UploadRecord::from_stored("reads.fastq", input, 8);
        let params = AnalysisParams::new("job-1", db)
            .with_input(INPUT_FILE, InputValue::File(upload))
            .with_input(OUTPUT_DIR, InputValue::Directory(dir.path().join("out")));

        let err = analyst.analyze(&params).unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
        assert!(err.to_string().starts_with("Invalid configuration: Missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_analyze_runs_container_command() {
        let dir = TempDir::new().unwrap();
        let input_dir = dir.path().join("uploads");
        std::fs::create_dir_all(&input_dir).unwrap();
        let input = input_dir.join("reads.fastq");
        std::fs::write(&input, b"@r\nA\n+\nI\n").unwrap();

        // Stand-in container runtime: records its arguments as a result file.
        let fake_docker = dir.path().join("fake-docker");
        let output_dir = dir.path().join("out");
        std::fs::write(
            &fake_docker,
            format!(
                "#!/bin/sh\necho \"$@\" > '{}/invocation.txt'\n",
                output_dir.display()
            ),
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&fake_docker, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = layout(dir.path());
        config.docker_binary = fake_docker.to_string_lossy().to_string();
        let analyst = MetontiimeAnalyst::new(config);
        let db = analyst.supported_databases().remove(0);
        let params = AnalysisParams::new("job-1", db)
            .with_input(
                INPUT_FILE,
                InputValue::File(UploadRecord::from_stored("reads.fastq", input, 8)),
            )
            .with_input(OUTPUT_DIR, InputValue::Directory(output_dir.clone()));

        let outcome = analyst.analyze(&params).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result_files, vec!["invocation.txt"]);
        assert_eq!(outcome.output_directory, output_dir);

        let invocation = std::fs::read_to_string(output_dir.join("invocation.txt")).unwrap();
        assert!(invocation.starts_with("run --rm"));
        assert!(invocation.contains(&format!("{}:/app/input", input_dir.display())));
        assert!(invocation.contains("nextflow run /app/src/metontiime2.nf"));
    }
}
