//! Remote data-generation bootstrap.
//!
//! Downloads a script from a caller-supplied URL and runs it, so it is only
//! available when `ALLOW_REMOTE_EXEC` is set.

use std::path::Path;
use std::process::Output;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use super::output::write_atomic;
use super::web::{validate_url, PageFetcher};
use super::{OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

const EMAIL_PATTERN: &str = r"^[\w.-]+@[\w.-]+\.\w+$";
const DEFAULT_SCRIPT_NAME: &str = "datagen.py";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

fn is_valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email))
}

/// File name to store the downloaded script under: the URL's last path segment,
/// or `datagen.py` when that is empty or not a plain name.
fn script_name(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(DEFAULT_SCRIPT_NAME)
        .to_string()
}

/// Run `program` without a shell, logging its output. Non-zero exit is an error.
async fn run_logged(program: &str, args: &[&str], cwd: &Path) -> Result<Output, TaskError> {
    tracing::info!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| TaskError::OperationFailed(format!("Failed to run {}: {}", program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        tracing::info!("{} stdout: {}", program, stdout.trim());
    }
    if !stderr.trim().is_empty() {
        tracing::warn!("{} stderr: {}", program, stderr.trim());
    }

    if !output.status.success() {
        return Err(TaskError::OperationFailed(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

#[derive(Debug, PartialEq)]
enum UvStatus {
    Installed,
    Missing,
    Broken(String),
}

/// Classify the result of spawning `uv --version`.
fn classify_uv_version(result: std::io::Result<Output>) -> UvStatus {
    match result {
        Ok(output) if output.status.success() => UvStatus::Installed,
        Ok(output) => UvStatus::Broken(format!(
            "uv --version exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => UvStatus::Missing,
        Err(e) => UvStatus::Broken(format!("Failed to run uv --version: {}", e)),
    }
}

/// Make sure `uv` is on the PATH, installing it with pip when it is missing.
async fn ensure_uv(cwd: &Path) -> Result<(), TaskError> {
    match classify_uv_version(Command::new("uv").arg("--version").output().await) {
        UvStatus::Installed => {
            tracing::debug!("uv is already installed");
            Ok(())
        }
        UvStatus::Missing => {
            tracing::info!("Installing uv");
            run_logged("pip", &["install", "uv"], cwd).await.map(|_| ())
        }
        UvStatus::Broken(reason) => Err(TaskError::OperationFailed(reason)),
    }
}

pub struct SetupAndRunDatagen;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatagenArgs {
    pub user_email: String,
    pub datagen_url: String,
}

#[async_trait]
impl Tool for SetupAndRunDatagen {
    type Args = DatagenArgs;
    const NAME: &'static str = "setup_and_run_datagen";

    fn description(&self) -> &'static str {
        "Ensures uv is installed, downloads the data generation script from the given URL and \
         runs it with the user's email as its only argument."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_email": { "type": "string", "description": "The user's email address" },
                "datagen_url": { "type": "string", "description": "URL of the datagen.py script" },
            },
            "required": ["user_email", "datagen_url"],
            "additionalProperties": false,
        })
    }

    async fn execute(&self, args: DatagenArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        if !ctx.config.allow_remote_exec {
            return Err(TaskError::InvalidRequest(
                "Remote script execution is disabled; set ALLOW_REMOTE_EXEC=true to enable it."
                    .to_string(),
            ));
        }
        if !is_valid_email(&args.user_email) {
            return Ok(OperationResult::error("Invalid email format."));
        }
        let url = validate_url(&args.datagen_url)?;
        let workdir = ctx.config.datagen_workdir.as_path();

        ensure_uv(workdir).await?;

        let script = script_name(&url);
        tracing::info!("Downloading {} from {}", script, url);
        let bytes = PageFetcher::new(&ctx.config, None)?.fetch_bytes(&url).await?;
        write_atomic(&workdir.join(&script), &bytes)
            .await
            .map_err(failed("Error saving datagen script"))?;

        tracing::info!("Running {} for {}", script, args.user_email);
        run_logged("uv", &["run", "python", &script, &args.user_email], workdir).await?;

        Ok(OperationResult::success(format!(
            "Data generation completed successfully for the user {}.",
            args.user_email
        )))
    }
}
