//! Stub analysts with scripted behavior.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use seqjobs::analyst::{INPUT_FILE, OUTPUT_DIR};
use seqjobs::{
    AnalysisError, AnalysisOutcome, AnalysisParams, Analyst, DatabaseSpec, InputSpec,
};

pub const DEMO_RESULT: &str = "demo_result.txt";

fn demo_inputs() -> Vec<InputSpec> {
    vec![
        InputSpec::file(INPUT_FILE, "reads").required(),
        InputSpec::directory(OUTPUT_DIR, "results").required(),
    ]
}

fn output_dir(params: &AnalysisParams) -> Result<&Path, AnalysisError> {
    params
        .output_dir()
        .ok_or_else(|| AnalysisError::Failed("no output directory".to_string()))
}

/// Writes one result file and succeeds.
pub struct DemoAnalyst;

impl Analyst for DemoAnalyst {
    fn name(&self) -> &str {
        "Demo"
    }

    fn description(&self) -> &str {
        "writes a single result file"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        demo_inputs()
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        let dir = output_dir(params)?;
        let upload = params
            .input_file()
            .ok_or_else(|| AnalysisError::Failed("no input".to_string()))?;
        std::fs::write(dir.join(DEMO_RESULT), &upload.original_name).map_err(|e| {
            AnalysisError::Io {
                path: dir.to_path_buf(),
                source: e,
            }
        })?;
        Ok(AnalysisOutcome::succeeded(
            "demo done",
            vec![DEMO_RESULT.to_string()],
            dir,
        ))
    }
}

/// Requires an extra `sampleId` string input and a declared database.
pub struct StrictAnalyst;

impl Analyst for StrictAnalyst {
    fn name(&self) -> &str {
        "Strict"
    }

    fn description(&self) -> &str {
        "declares extra inputs and a database"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        let mut inputs = demo_inputs();
        inputs.push(InputSpec::text("sampleId", "sample identifier").required());
        inputs
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![DatabaseSpec::new("Reference DB", "reference", "reference set").with_path("/refs")]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        Ok(AnalysisOutcome::succeeded("strict done", vec![], output_dir(params)?))
    }
}

/// Always fails with a fixed cause.
pub struct FailingAnalyst {
    pub cause: String,
}

impl Analyst for FailingAnalyst {
    fn name(&self) -> &str {
        "Failing"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        demo_inputs()
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![]
    }

    fn analyze(&self, _params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        Err(AnalysisError::Failed(self.cause.clone()))
    }
}

/// Returns an unsuccessful outcome without raising an error.
pub struct UnsuccessfulAnalyst;

impl Analyst for UnsuccessfulAnalyst {
    fn name(&self) -> &str {
        "Unsuccessful"
    }

    fn description(&self) -> &str {
        "reports success = false"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        demo_inputs()
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        Ok(AnalysisOutcome::unsuccessful(
            "no reads passed filtering",
            output_dir(params)?,
        ))
    }
}

pub struct PanickingAnalyst;

impl Analyst for PanickingAnalyst {
    fn name(&self) -> &str {
        "Panicking"
    }

    fn description(&self) -> &str {
        "panics during analysis"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        demo_inputs()
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![]
    }

    fn analyze(&self, _params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        panic!("index out of range in stub");
    }
}

/// Interval during which an analysis ran.
#[derive(Debug, Clone)]
pub struct RunWindow {
    pub job_id: String,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

/// Sleeps for a fixed time and records when each run happened.
pub struct RecordingAnalyst {
    pub delay: Duration,
    pub runs: Arc<Mutex<Vec<RunWindow>>>,
}

impl RecordingAnalyst {
    pub fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<RunWindow>>>) {
        let runs = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                delay,
                runs: Arc::clone(&runs),
            },
            runs,
        )
    }
}

impl Analyst for RecordingAnalyst {
    fn name(&self) -> &str {
        "Recording"
    }

    fn description(&self) -> &str {
        "records run windows"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        demo_inputs()
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        let started = Utc::now();
        thread::sleep(self.delay);
        let finished = Utc::now();
        self.runs.lock().unwrap().push(RunWindow {
            job_id: params.job_id.clone(),
            started,
            finished,
        });
        Ok(AnalysisOutcome::succeeded("recorded", vec![], output_dir(params)?))
    }
}

/// Blocks inside `analyze` until the gate is opened.
pub struct GateAnalyst {
    open: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct Gate {
    open: Arc<AtomicBool>,
}

impl Gate {
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

impl GateAnalyst {
    pub fn new() -> (Self, Gate) {
        let open = Arc::new(AtomicBool::new(false));
        (
            Self {
                open: Arc::clone(&open),
            },
            Gate { open },
        )
    }
}

impl Analyst for GateAnalyst {
    fn name(&self) -> &str {
        "Gate"
    }

    fn description(&self) -> &str {
        "waits for the test to open the gate"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        demo_inputs()
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        while !self.open.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));
        }
        Ok(AnalysisOutcome::succeeded("gate passed", vec![], output_dir(params)?))
    }
}
