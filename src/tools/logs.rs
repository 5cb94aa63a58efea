//! First-line digest of the most recently modified log files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use glob::Pattern;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::output::{require_exists, write_atomic};
use super::{OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

const RECENT_LIMIT: usize = 10;
const DEFAULT_PATTERN: &str = "*.log";

/// Files directly inside `dir` matching `pattern`, newest first, at most `limit`.
async fn recent_files(dir: &Path, pattern: &Pattern, limit: usize) -> std::io::Result<Vec<PathBuf>> {
    let mut matches: Vec<(SystemTime, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !pattern.matches(&name.to_string_lossy()) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        matches.push((metadata.modified()?, entry.path()));
    }

    matches.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(matches.into_iter().take(limit).map(|(_, path)| path).collect())
}

async fn first_line(path: &Path) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

pub struct WriteRecentLogLines;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecentLogArgs {
    input_location: String,
    output_location: String,
    #[serde(default)]
    pattern: Option<String>,
}

#[async_trait]
impl Tool for WriteRecentLogLines {
    type Args = RecentLogArgs;
    const NAME: &'static str = "write_recent_log_lines";

    fn description(&self) -> &'static str {
        "Reads the first line of the 10 most recently modified .log files in a directory \
         and writes them to the output file, most recent first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_location": { "type": "string", "description": "Directory path containing log files" },
                "output_location": { "type": "string", "description": "Output file path" },
                "pattern": { "type": "string", "description": "File name pattern to match (default *.log)" },
            },
            "required": ["input_location", "output_location"],
            "additionalProperties": false,
        })
    }

    async fn execute(
        &self,
        args: RecentLogArgs,
        _ctx: &DispatchContext,
    ) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Logs directory")?;

        let pattern = args.pattern.as_deref().unwrap_or(DEFAULT_PATTERN);
        let pattern = Pattern::new(pattern)
            .map_err(|e| TaskError::InvalidRequest(format!("Invalid pattern {}: {}", pattern, e)))?;

        let files = recent_files(Path::new(&args.input_location), &pattern, RECENT_LIMIT)
            .await
            .map_err(failed("Error processing log files"))?;

        let mut digest = String::new();
        for file in &files {
            let line = first_line(file)
                .await
                .map_err(failed("Error processing log files"))?;
            digest.push_str(&line);
            digest.push('\n');
        }

        write_atomic(Path::new(&args.output_location), digest.as_bytes())
            .await
            .map_err(failed("Error processing log files"))?;

        Ok(OperationResult::success(format!(
            "First lines of {} most recent logs saved to {}.",
            files.len(),
            args.output_location
        ))
        .with("file_count", files.len()))
    }
}
