use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::MetontiimeConfig;

const CONTAINER_INPUT: &str = "/app/input";
const CONTAINER_OUTPUT: &str = "/app/output";
const CONTAINER_DATABASE: &str = "/app/databases/card";
const CONTAINER_SOURCE: &str = "/app/src";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// A fully-resolved external command: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PipelineCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for PipelineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Host-side locations for one MetONTIIME run.
#[derive(Debug, Clone)]
pub struct MetontiimeRun {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub database_dir: PathBuf,
    pub sequences_fasta: String,
    pub taxonomy_tsv: String,
}

/// Builds the `docker run ... nextflow run metontiime2.nf` invocation.
pub fn metontiime_command(config: &MetontiimeConfig, run: &MetontiimeRun) -> PipelineCommand {
    let input_mount = if config.input_read_only {
        format!("{}:{}:ro", display(&run.input_dir), CONTAINER_INPUT)
    } else {
        format!("{}:{}", display(&run.input_dir), CONTAINER_INPUT)
    };

    let mut cmd = PipelineCommand::new(&config.docker_binary)
        .args(["run", "--rm"])
        .arg("-v")
        .arg(input_mount)
        .arg("-v")
        .arg(format!("{}:{}", display(&run.output_dir), CONTAINER_OUTPUT))
        .arg("-v")
        .arg(format!("{}:{}:ro", display(&run.database_dir), CONTAINER_DATABASE))
        .arg("-v")
        .arg(format!(
            "{}:{}:ro",
            display(&config.pipeline_source),
            CONTAINER_SOURCE
        ));

    if config.mount_docker_socket {
        cmd = cmd
            .arg("-v")
            .arg(format!("{}:{}", DOCKER_SOCKET, DOCKER_SOCKET));
    }

    // A read-only input mount cannot host the Nextflow work directory.
    let work_dir = if config.input_read_only {
        format!("{}/work", CONTAINER_OUTPUT)
    } else {
        CONTAINER_INPUT.to_string()
    };

    cmd.arg(&config.image)
        .args(["nextflow", "run"])
        .arg(format!("{}/metontiime2.nf", CONTAINER_SOURCE))
        .args(["-profile", "docker"])
        .arg("--workDir")
        .arg(work_dir)
        .arg("--resultsDir")
        .arg(CONTAINER_OUTPUT)
        .arg("--dbSequencesFasta")
        .arg(format!("{}/{}", CONTAINER_DATABASE, run.sequences_fasta))
        .arg("--dbTaxonomyTsv")
        .arg(format!("{}/{}", CONTAINER_DATABASE, run.taxonomy_tsv))
        .arg("--threads")
        .arg(config.threads.to_string())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> MetontiimeRun {
        MetontiimeRun {
            input_dir: PathBuf::from("/data/uploads"),
            output_dir: PathBuf::from("/data/results/METONTIIME_job_abc"),
            database_dir: PathBuf::from("/opt/card"),
            sequences_fasta: "nucleotide_fasta_protein_knockout_model.fasta".to_string(),
            taxonomy_tsv: "aro_index.tsv".to_string(),
        }
    }

    fn config() -> MetontiimeConfig {
        MetontiimeConfig {
            pipeline_source: PathBuf::from("/opt/MetONTIIME"),
            ..MetontiimeConfig::default()
        }
    }

    fn value_after<'a>(cmd: &'a PipelineCommand, flag: &str) -> Option<&'a str> {
        cmd.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| cmd.args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_default_command_shape() {
        let cmd = metontiime_command(&config(), &run());
        assert_eq!(cmd.program, "docker");
        assert_eq!(&cmd.args[..2], &["run", "--rm"]);

        let mounts: Vec<&str> = cmd
            .args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && cmd.args[i - 1] == "-v")
            .map(|(_, a)| a.as_str())
            .collect();
        assert_eq!(
            mounts,
            vec![
                "/data/uploads:/app/input",
                "/data/results/METONTIIME_job_abc:/app/output",
                "/opt/card:/app/databases/card:ro",
                "/opt/MetONTIIME:/app/src:ro",
                "/var/run/docker.sock:/var/run/docker.sock",
            ]
        );

        assert_eq!(value_after(&cmd, "--workDir"), Some("/app/input"));
        assert_eq!(value_after(&cmd, "--resultsDir"), Some("/app/output"));
        assert_eq!(
            value_after(&cmd, "--dbSequencesFasta"),
            Some("/app/databases/card/nucleotide_fasta_protein_knockout_model.fasta")
        );
        assert_eq!(
            value_after(&cmd, "--dbTaxonomyTsv"),
            Some("/app/databases/card/aro_index.tsv")
        );
        assert_eq!(value_after(&cmd, "--threads"), Some("8"));
        assert_eq!(value_after(&cmd, "-profile"), Some("docker"));
    }

    #[test]
    fn test_read_only_input_moves_work_dir() {
        let mut config = config();
        config.input_read_only = true;
        config.mount_docker_socket = false;

        let cmd = metontiime_command(&config, &run());
        assert!(cmd.args.contains(&"/data/uploads:/app/input:ro".to_string()));
        assert!(!cmd.args.iter().any(|a| a.contains("docker.sock")));
        assert_eq!(value_after(&cmd, "--workDir"), Some("/app/output/work"));
    }

    #[test]
    fn test_image_precedes_nextflow() {
        let mut config = config();
        config.image = "registry.local/metontiime:2".to_string();
        let cmd = metontiime_command(&config, &run());
        let image = cmd.args.iter().position(|a| a == "registry.local/metontiime:2");
        let nextflow = cmd.args.iter().position(|a| a == "nextflow");
        assert_eq!(image.map(|i| i + 1), nextflow);
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = PipelineCommand::new("docker").args(["run", "/my data:/app/input"]);
        assert_eq!(cmd.to_string(), "docker run \"/my data:/app/input\"");
    }
}
