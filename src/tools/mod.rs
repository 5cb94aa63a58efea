//! Operation registry and handlers.
//!
//! Every operation the model may pick is a unit struct implementing [`Tool`],
//! with its strongly typed arguments, schema and handler side by side. The
//! `operations!` table below lists each tool exactly once and generates the
//! [`Invocation`] sum type, its decoder and the schema list sent to the model,
//! so the advertised schema and the handler cannot drift apart.

mod audio;
mod contacts;
mod csv_json;
mod datagen;
mod dates;
mod email;
mod logs;
mod markdown;
mod output;
mod sales;
mod similarity;
mod vision;
mod web;

pub use dates::{parse_date, DATE_FORMATS};
pub use similarity::cosine_similarity;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::dispatch::DispatchContext;
use crate::error::TaskError;
use crate::llm::{FunctionDefinition, ToolDefinition};

use audio::TranscribeAudio;
use contacts::SortContacts;
use csv_json::FilterCsvToJson;
use datagen::SetupAndRunDatagen;
use dates::CountDays;
use email::ExtractSenderEmail;
use logs::WriteRecentLogLines;
use markdown::{ConvertMarkdownToHtml, FormatMarkdown, GenerateMarkdownIndex};
use sales::CalculateGoldSales;
use similarity::FindSimilarComments;
use vision::ExtractCreditCard;
use web::ScrapeWebsite;

/// Information about a tool for display purposes.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Outcome status reported to the HTTP caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Structured result of one operation, returned verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub message: String,
    /// Operation-specific fields (counts, scores, destinations).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Success,
            message: message.into(),
            extra: Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Error,
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Typed arguments decoded from the model's JSON.
    type Args: DeserializeOwned + std::fmt::Debug + Send + 'static;

    /// The unique name of this tool.
    const NAME: &'static str;

    /// A description of what this tool does.
    fn description(&self) -> &'static str;

    /// JSON schema for the tool's parameters. Must describe exactly `Args`.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with decoded arguments.
    async fn execute(
        &self,
        args: Self::Args,
        ctx: &DispatchContext,
    ) -> Result<OperationResult, TaskError>;
}

/// Arguments shared by every "read one path, write one path" operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoArgs {
    pub input_location: String,
    pub output_location: String,
}

/// Schema for [`IoArgs`] with per-tool descriptions.
fn io_schema(input: &str, output: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "input_location": { "type": "string", "description": input },
            "output_location": { "type": "string", "description": output },
        },
        "required": ["input_location", "output_location"],
        "additionalProperties": false,
    })
}

fn definition<T: Tool>(tool: &T) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: T::NAME.to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        },
    }
}

fn decode_args<T: Tool>(value: Value) -> Result<T::Args, TaskError> {
    serde_json::from_value(value)
        .map_err(|e| TaskError::InvalidRequest(format!("Invalid arguments for {}: {}", T::NAME, e)))
}

macro_rules! operations {
    ($($variant:ident => $tool:ident),+ $(,)?) => {
        /// A decoded, strongly typed request to run one registered operation.
        #[derive(Debug)]
        pub enum Invocation {
            $($variant(<$tool as Tool>::Args),)+
        }

        impl Invocation {
            /// Decode a model tool call into a typed invocation.
            ///
            /// Fails with `MalformedArguments` when `arguments` is not a JSON
            /// object, `UnknownOperation` for unregistered names and
            /// `InvalidRequest` when the object does not fit the tool's arguments.
            pub fn decode(name: &str, arguments: &str) -> Result<Self, TaskError> {
                let value: Value = serde_json::from_str(arguments)
                    .map_err(|e| TaskError::MalformedArguments(e.to_string()))?;
                if !value.is_object() {
                    return Err(TaskError::MalformedArguments(
                        "arguments must be a JSON object".to_string(),
                    ));
                }
                $(
                    if name == <$tool as Tool>::NAME {
                        return decode_args::<$tool>(value).map(Self::$variant);
                    }
                )+
                Err(TaskError::UnknownOperation(name.to_string()))
            }

            /// Registered name of the selected operation.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$tool as Tool>::NAME,)+
                }
            }

            pub async fn execute(self, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
                match self {
                    $(Self::$variant(args) => $tool.execute(args, ctx).await,)+
                }
            }
        }

        fn all_definitions() -> Vec<ToolDefinition> {
            vec![$(definition(&$tool),)+]
        }
    };
}

operations! {
    SortContacts => SortContacts,
    WriteRecentLogLines => WriteRecentLogLines,
    GenerateMarkdownIndex => GenerateMarkdownIndex,
    CountDays => CountDays,
    CalculateGoldSales => CalculateGoldSales,
    FindSimilarComments => FindSimilarComments,
    ExtractCreditCard => ExtractCreditCard,
    ScrapeWebsite => ScrapeWebsite,
    ExtractSenderEmail => ExtractSenderEmail,
    ConvertMarkdownToHtml => ConvertMarkdownToHtml,
    FilterCsvToJson => FilterCsvToJson,
    TranscribeAudio => TranscribeAudio,
    SetupAndRunDatagen => SetupAndRunDatagen,
    FormatMarkdown => FormatMarkdown,
}

/// Registry of available tools. Built once at startup and immutable afterwards.
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Create a registry with every operation.
    pub fn new() -> Self {
        Self {
            definitions: all_definitions(),
        }
    }

    /// List all available tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.definitions
            .iter()
            .map(|d| ToolInfo {
                name: d.function.name.clone(),
                description: d.function.description.clone(),
            })
            .collect()
    }

    /// Get tool schemas in LLM-compatible format.
    pub fn get_tool_schemas(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Decode and execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &str,
        ctx: &DispatchContext,
    ) -> Result<OperationResult, TaskError> {
        Invocation::decode(name, arguments)?.execute(ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
