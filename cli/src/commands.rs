use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use seqjobs::{
    AnalystRegistry, Config, JobStatus, JobStore, Orchestrator, RunRequest, UploadRecord,
    UploadStore,
};

use crate::Commands;

pub fn execute(command: &Commands, config: &Config) -> Result<Value> {
    match command {
        Commands::Analysts => list_analysts(config),
        Commands::Analyst { name } => show_analyst(config, name),
        Commands::Databases { analyst } => list_databases(config, analyst.as_deref()),
        Commands::Register { path } => register_upload(config, path),
        Commands::Uploads => list_uploads(config),
        Commands::Submit {
            file_id,
            analyst,
            database,
            output_root,
            name,
            options,
        } => {
            let mut request = RunRequest::new(file_id, analyst, database, output_root.clone());
            if let Some(name) = name {
                request = request.with_job_name(name);
            }
            for (key, value) in options {
                request = request.with_option(key, value);
            }
            submit(config, request)
        }
        Commands::Jobs { status } => list_jobs(config, status.as_deref()),
        Commands::Job { job_id } => show_job(config, job_id),
        Commands::Results { job_id } => list_results(config, job_id),
    }
}

fn registry(config: &Config) -> Result<AnalystRegistry> {
    AnalystRegistry::from_config(&config.analysts).context("Failed to register analysts")
}

// Query commands open the stores directly so they keep working while a
// running `submit` holds the data directory lock.
fn job_store(config: &Config) -> Result<JobStore> {
    JobStore::open(config.jobs_file())
        .with_context(|| format!("Failed to open job history in {}", config.data_dir.display()))
}

fn upload_store(config: &Config) -> Result<UploadStore> {
    UploadStore::open(config.uploads_file()).with_context(|| {
        format!("Failed to open upload history in {}", config.data_dir.display())
    })
}

fn list_analysts(config: &Config) -> Result<Value> {
    let analysts: Vec<Value> = registry(config)?
        .describe_all()
        .into_iter()
        .map(|d| {
            json!({
                "name": d.name,
                "displayName": d.display_name,
                "version": d.version,
                "description": d.description,
            })
        })
        .collect();
    Ok(Value::Array(analysts))
}

fn show_analyst(config: &Config, name: &str) -> Result<Value> {
    let descriptor = registry(config)?
        .describe(name)
        .ok_or_else(|| anyhow!("Analyst '{}' is not supported", name))?;
    Ok(serde_json::to_value(descriptor)?)
}

fn list_databases(config: &Config, analyst: Option<&str>) -> Result<Value> {
    let registry = registry(config)?;
    let databases = match analyst {
        Some(name) => registry
            .describe(name)
            .ok_or_else(|| anyhow!("Analyst '{}' is not supported", name))?
            .supported_databases,
        None => registry.all_databases(),
    };
    Ok(serde_json::to_value(databases)?)
}

fn register_upload(config: &Config, path: &Path) -> Result<Value> {
    let record = UploadRecord::from_local_file(path, &config.uploads.allowed_extensions)
        .with_context(|| format!("Cannot register {}", path.display()))?;
    let record = upload_store(config)?
        .record(record)
        .context("Failed to save upload")?;
    log::info!("Registered upload {} ({})", record.id, record.original_name);
    Ok(serde_json::to_value(record)?)
}

fn list_uploads(config: &Config) -> Result<Value> {
    Ok(serde_json::to_value(upload_store(config)?.list_all()?)?)
}

fn submit(config: &Config, request: RunRequest) -> Result<Value> {
    let orchestrator = Orchestrator::from_config(config).context("Failed to start orchestrator")?;
    // Subscribe before submitting so the queued event is not missed.
    let mut events = orchestrator.events();

    let receipt = match orchestrator.submit(request) {
        Ok(receipt) => receipt,
        Err(e) => {
            orchestrator.shutdown();
            return Err(e).context("Submission rejected");
        }
    };

    log::info!("Job {} queued as {}", receipt.job_id, receipt.job_name);

    loop {
        match events.blocking_recv() {
            Ok(event) if event.job_id == receipt.job_id => {
                log::info!(
                    "{}: {}",
                    event.status,
                    event.message.as_deref().unwrap_or_default()
                );
                if event.is_terminal() {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Missed {} job events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    let job = orchestrator.wait_for_job(&receipt.job_id, None)?;
    orchestrator.shutdown();

    if job.status == JobStatus::Failed {
        bail!(
            "Job {} failed: {}",
            job.id,
            job.message.as_deref().unwrap_or("no reason recorded")
        );
    }
    Ok(serde_json::to_value(job)?)
}

fn parse_status(raw: &str) -> Result<JobStatus> {
    JobStatus::ALL
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| anyhow!("Unknown job status '{}'", raw))
}

fn list_jobs(config: &Config, status: Option<&str>) -> Result<Value> {
    let status = status.map(parse_status).transpose()?;
    let jobs: Vec<Value> = job_store(config)?
        .list_all()?
        .into_iter()
        .filter(|job| status.map_or(true, |s| job.status == s))
        .map(|job| {
            json!({
                "id": job.id,
                "name": job.name,
                "analyst": job.analyst_name,
                "status": job.status,
                "file": job.file_name,
                "submittedAt": job.submitted_at.to_rfc3339(),
                "message": job.message,
            })
        })
        .collect();
    Ok(Value::Array(jobs))
}

fn show_job(config: &Config, job_id: &str) -> Result<Value> {
    let job = job_store(config)?
        .find(job_id)?
        .ok_or_else(|| anyhow!("Job '{}' not found", job_id))?;
    Ok(serde_json::to_value(job)?)
}

fn list_results(config: &Config, job_id: &str) -> Result<Value> {
    let job = job_store(config)?
        .find(job_id)?
        .ok_or_else(|| anyhow!("Job '{}' not found", job_id))?;
    let files = seqjobs::orchestrator::results::list_result_files(&job.output_dir)?;
    Ok(json!({
        "jobId": job.id,
        "outputDir": job.output_dir,
        "files": files,
    }))
}
