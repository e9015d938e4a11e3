use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use walkdir::WalkDir;

use super::command::PipelineCommand;
use crate::error::AnalysisError;

const STDERR_TAIL_LINES: usize = 40;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a pipeline process that exited with status zero.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Entry names found directly inside the output directory, sorted.
    pub result_files: Vec<String>,
}

/// Runs external pipeline commands to completion.
///
/// Stdout is inherited so progress streams to the operator. Stderr is
/// forwarded to the log line by line and its tail is kept for the failure
/// cause.
#[derive(Debug, Clone, Default)]
pub struct PipelineInvoker {
    timeout: Option<Duration>,
}

impl PipelineInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn run(
        &self,
        command: &PipelineCommand,
        output_dir: &Path,
    ) -> Result<PipelineRun, AnalysisError> {
        info!("Executing pipeline command: {}", command);
        let started = Instant::now();

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnalysisError::Spawn {
                program: command.program.clone(),
                source: e,
            })?;

        let stderr_reader = child.stderr.take().map(spawn_stderr_reader);

        let status = match self.timeout {
            Some(limit) => wait_with_timeout(&mut child, limit),
            None => child
                .wait()
                .map(WaitOutcome::from)
                .map_err(|e| wait_error(command, e)),
        };

        let status = match status? {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut(limit) => {
                // Grandchildren may still hold stderr open; the reader is left detached.
                warn!(
                    "Pipeline exceeded {}s and was killed: {}",
                    limit.as_secs(),
                    command.program
                );
                return Err(AnalysisError::Timeout { limit });
            }
        };
        let elapsed = started.elapsed();

        let stderr_tail = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            warn!("Pipeline failed with status {:?}", status.code());
            return Err(AnalysisError::ExitStatus {
                code: status.code(),
                stderr: stderr_tail,
            });
        }

        info!("Pipeline finished in {:.1}s", elapsed.as_secs_f64());
        let result_files = list_output_entries(output_dir)?;
        Ok(PipelineRun { result_files })
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut(Duration),
}

impl From<ExitStatus> for WaitOutcome {
    fn from(status: ExitStatus) -> Self {
        WaitOutcome::Exited(status)
    }
}

fn wait_error(command: &PipelineCommand, e: std::io::Error) -> AnalysisError {
    AnalysisError::Failed(format!("Failed to wait for '{}': {}", command.program, e))
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> Result<WaitOutcome, AnalysisError> {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.into()),
            Ok(None) => {}
            Err(e) => return Err(AnalysisError::Failed(format!("Failed to poll pipeline: {}", e))),
        }

        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                warn!("Failed to kill timed-out pipeline: {}", e);
            }
            // Reap the killed child.
            let _ = child.wait();
            return Ok(WaitOutcome::TimedOut(limit));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_stderr_reader<R>(stderr: R) -> JoinHandle<String>
where
    R: std::io::Read + Send + 'static,
{
    thread::spawn(move || {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        for line in BufReader::new(stderr).lines() {
            let Ok(line) = line else { break };
            debug!(target: "seqjobs::pipeline", "{}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Vec::from(tail).join("\n")
    })
}

/// Names of the entries directly inside `dir`, sorted.
pub fn list_output_entries(dir: &Path) -> Result<Vec<String>, AnalysisError> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| AnalysisError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    Ok(names)
}
