use std::collections::HashSet;

use chrono::Utc;
use log::info;
use serde_json::{json, Value};

use super::types::{AnalysisOutcome, AnalysisParams, DatabaseSpec, InputSpec, INPUT_FILE, OUTPUT_DIR};
use super::Analyst;
use crate::error::AnalysisError;

pub const ANALYSIS_TYPE: &str = "analysisType";
pub const RESULT_FILE: &str = "example_analysis_result.json";

const WORD_COUNT: &str = "word_count";
const LINE_COUNT: &str = "line_count";
const SIZE_ANALYSIS: &str = "size_analysis";

/// In-process demo analyst computing simple statistics over a text file.
#[derive(Debug, Default)]
pub struct TextStatsAnalyst;

impl TextStatsAnalyst {
    pub const KEY: &'static str = "example";

    pub fn new() -> Self {
        Self
    }
}

impl Analyst for TextStatsAnalyst {
    fn name(&self) -> &str {
        "Example"
    }

    fn description(&self) -> &str {
        "Example analyst for demonstration purposes, a template for new analysts"
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::file(INPUT_FILE, "Text, CSV or JSON input file")
                .required()
                .with_extensions(&[".txt", ".csv", ".json"]),
            InputSpec::directory(OUTPUT_DIR, "Directory receiving the analysis results").required(),
            InputSpec::text(ANALYSIS_TYPE, "Analysis type (word_count, line_count, size_analysis)")
                .required()
                .with_options(&[WORD_COUNT, LINE_COUNT, SIZE_ANALYSIS]),
        ]
    }

    fn supported_databases(&self) -> Vec<DatabaseSpec> {
        vec![DatabaseSpec::new(
            "Built-in Dictionary",
            "text_analysis",
            "Built-in dictionary for text analysis",
        )]
    }

    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        info!("Starting Example analysis for job {}", params.job_id);

        let validation = self.validate_params(params);
        if !validation.is_valid() {
            return Err(AnalysisError::InvalidParams(validation.into_issues()));
        }

        let (Some(upload), Some(output_dir)) = (params.input_file(), params.output_dir()) else {
            return Err(AnalysisError::Failed(
                "input file and output directory are required".to_string(),
            ));
        };
        let analysis_type = params.text(ANALYSIS_TYPE).unwrap_or(WORD_COUNT);

        std::fs::create_dir_all(output_dir).map_err(|e| AnalysisError::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let content =
            std::fs::read_to_string(&upload.source_path).map_err(|e| AnalysisError::Io {
                path: upload.source_path.clone(),
                source: e,
            })?;

        let results = compute(&content, analysis_type)?;

        let output = json!({
            "analyst": self.name(),
            "version": self.version(),
            "inputFile": upload.original_name,
            "analysisType": analysis_type,
            "timestamp": Utc::now().to_rfc3339(),
            "results": results,
        });

        let result_path = output_dir.join(RESULT_FILE);
        std::fs::write(&result_path, serde_json::to_string_pretty(&output)?).map_err(|e| {
            AnalysisError::Io {
                path: result_path.clone(),
                source: e,
            }
        })?;
        info!("Result saved to: {}", result_path.display());

        Ok(AnalysisOutcome::succeeded(
            "Example analysis completed successfully",
            vec![RESULT_FILE.to_string()],
            output_dir,
        )
        .with_summary(results))
    }
}

fn compute(content: &str, analysis_type: &str) -> Result<Value, AnalysisError> {
    match analysis_type {
        WORD_COUNT => Ok(word_count(content)),
        LINE_COUNT => Ok(line_count(content)),
        SIZE_ANALYSIS => Ok(size_analysis(content)),
        other => Err(AnalysisError::Failed(format!(
            "Unknown analysis type: {}",
            other
        ))),
    }
}

fn word_count(content: &str) -> Value {
    let words: Vec<&str> = content.split_whitespace().collect();
    let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let average = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64
    };

    json!({
        "totalWords": words.len(),
        "uniqueWords": unique.len(),
        "averageWordLength": average,
    })
}

fn line_count(content: &str) -> Value {
    // A trailing newline yields a final empty line.
    let lines: Vec<&str> = content.split('\n').collect();
    let non_empty = lines.iter().filter(|l| !l.trim().is_empty()).count();
    let average =
        lines.iter().map(|l| l.chars().count()).sum::<usize>() as f64 / lines.len() as f64;

    json!({
        "totalLines": lines.len(),
        "nonEmptyLines": non_empty,
        "averageLineLength": average,
    })
}

fn size_analysis(content: &str) -> Value {
    json!({
        "totalCharacters": content.chars().count(),
        "totalCharactersNoSpaces": content.chars().filter(|c| !c.is_whitespace()).count(),
        "totalBytes": content.len(),
        "encoding": "utf8",
    })
}
