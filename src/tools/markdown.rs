//! Markdown operations: heading index, model-driven HTML conversion, prettier formatting.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use super::output::{require_exists, write_atomic, write_json};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};
use crate::llm::ChatMessage;

const PRETTIER: &str = "prettier@3.4.2";

const HTML_SYSTEM_PROMPT: &str = "You are a markdown to HTML converter. Convert the given markdown \
    to valid HTML. Only respond with the HTML code, no explanations.";

/// Text of the first `# ` heading in `content`, if any.
fn first_h1(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
}

/// Map each `.md` file name under `dir` (recursively) to its first H1 heading.
///
/// Files without a heading are omitted; later files with the same name win.
fn build_index(dir: &Path) -> std::io::Result<Map<String, Value>> {
    let mut index = Map::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let content = std::fs::read_to_string(path)?;
        if let Some(title) = first_h1(&content) {
            index.insert(entry.file_name().to_string_lossy().to_string(), Value::String(title));
        }
    }
    Ok(index)
}

pub struct GenerateMarkdownIndex;

#[async_trait]
impl Tool for GenerateMarkdownIndex {
    type Args = IoArgs;
    const NAME: &'static str = "generate_markdown_index";

    fn description(&self) -> &'static str {
        "Finds all Markdown (.md) files in the docs directory, extracts the first H1 header \
         from each file and writes an index mapping file names to their titles."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Directory containing Markdown files", "Output file path for the index")
    }

    /// The search root and index path are the configured fixed locations;
    /// the path arguments are accepted but not used.
    async fn execute(&self, _args: IoArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        let docs_dir = ctx.config.docs_dir.clone();
        let index_path = ctx.config.docs_index_path.clone();
        if !docs_dir.exists() {
            return Err(TaskError::NotFound(format!(
                "Docs directory {} does not exist.",
                docs_dir.display()
            )));
        }

        let index = tokio::task::spawn_blocking(move || build_index(&docs_dir))
            .await
            .map_err(failed("Error generating markdown index"))?
            .map_err(failed("Error generating markdown index"))?;

        write_json(&index_path, &index)
            .await
            .map_err(failed("Error generating markdown index"))?;

        Ok(OperationResult::success(format!(
            "Markdown index saved to {}.",
            index_path.display()
        ))
        .with("entries", index.len()))
    }
}

pub struct ConvertMarkdownToHtml;

#[async_trait]
impl Tool for ConvertMarkdownToHtml {
    type Args = IoArgs;
    const NAME: &'static str = "convert_markdown_to_html";

    fn description(&self) -> &'static str {
        "Converts a Markdown file to HTML using AI-powered conversion and writes the HTML to the output location."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the input Markdown file", "Path to the output HTML file")
    }

    async fn execute(&self, args: IoArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input file")?;

        let markdown = tokio::fs::read_to_string(&args.input_location)
            .await
            .map_err(failed("Error converting markdown to HTML"))?;

        let messages = [
            ChatMessage::system(HTML_SYSTEM_PROMPT),
            ChatMessage::user(markdown),
        ];
        let html = ctx
            .llm
            .chat_completion(&ctx.config.chat_model, &messages, None)
            .await?
            .into_text()?;

        write_atomic(Path::new(&args.output_location), html.as_bytes())
            .await
            .map_err(failed("Error converting markdown to HTML"))?;

        Ok(OperationResult::success(format!(
            "Markdown converted to HTML and saved to {}.",
            args.output_location
        )))
    }
}

pub struct FormatMarkdown;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatArgs {
    file_path: String,
}

#[async_trait]
impl Tool for FormatMarkdown {
    type Args = FormatArgs;
    const NAME: &'static str = "format_markdown_with_prettier";

    fn description(&self) -> &'static str {
        "Formats the contents of a given markdown file in place using prettier@3.4.2."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "The path to the markdown file to be formatted." },
            },
            "required": ["file_path"],
            "additionalProperties": false,
        })
    }

    async fn execute(&self, args: FormatArgs, _ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.file_path, "File")?;

        let output = tokio::process::Command::new("npx")
            .arg(PRETTIER)
            .arg("--write")
            .arg(&args.file_path)
            .output()
            .await
            .map_err(failed("Unexpected error formatting file"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("prettier exited with {}: {}", output.status, stderr);
            return Err(TaskError::OperationFailed(format!(
                "Error formatting file: {}",
                stderr
            )));
        }

        Ok(OperationResult::success(format!("Successfully formatted {}", args.file_path))
            .with("details", stdout))
    }
}
