//! Dispatcher - turns one free-text task into at most one operation call.
//!
//! # Flow
//! 1. Send the task plus every registered schema to the chat model with
//!    automatic tool selection.
//! 2. No tool call in the reply: return [`DispatchOutcome::NoAction`].
//! 3. Otherwise decode the first call into a typed [`Invocation`] and run it.
//!    Further calls in the same reply are logged and ignored.
//!
//! The model is the sole authority on which operation runs; the dispatcher
//! performs no interpretation of the task text itself.

mod context;

pub use context::DispatchContext;

use std::time::Instant;

use serde_json::{json, Value};

use crate::error::TaskError;
use crate::llm::ChatMessage;
use crate::tools::{Invocation, OperationResult, ToolRegistry};

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// What a dispatch ended in.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The model chose no operation.
    NoAction,
    /// An operation ran to completion.
    Completed {
        operation: &'static str,
        result: OperationResult,
    },
}

impl DispatchOutcome {
    /// JSON payload returned to the HTTP caller.
    pub fn into_json(self) -> Value {
        match self {
            Self::NoAction => json!({ "message": "No tool calls found." }),
            Self::Completed { result, .. } => json!(result),
        }
    }
}

/// Every failure raised inside a handler reaches the caller as `OperationFailed`.
fn handler_failure(err: impl std::fmt::Display) -> TaskError {
    TaskError::OperationFailed(format!("Error calling function: {}", err))
}

/// Routes free-text tasks to registered operations.
pub struct Dispatcher {
    ctx: DispatchContext,
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(ctx: DispatchContext, registry: ToolRegistry) -> Self {
        Self { ctx, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    /// Resolve `free_text` to at most one operation and run it.
    ///
    /// # Errors
    /// - `InvalidRequest` for blank input or arguments that do not fit the tool
    /// - `RemoteServiceError` when the tool-selection call fails
    /// - `MalformedArguments` / `UnknownOperation` for unusable tool calls
    /// - `OperationFailed` for any handler error or panic, carrying its message
    pub async fn dispatch(&self, free_text: &str) -> Result<DispatchOutcome, TaskError> {
        let task = free_text.trim();
        if task.is_empty() {
            return Err(TaskError::InvalidRequest("Task cannot be empty".to_string()));
        }

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(task)];
        let response = self
            .ctx
            .llm
            .chat_completion(
                &self.ctx.config.chat_model,
                &messages,
                Some(self.registry.get_tool_schemas()),
            )
            .await?;

        let calls = response.tool_calls();
        let Some(first) = calls.first() else {
            tracing::info!("Model selected no operation for task");
            return Ok(DispatchOutcome::NoAction);
        };
        if calls.len() > 1 {
            let ignored: Vec<&str> = calls[1..].iter().map(|c| c.function.name.as_str()).collect();
            tracing::warn!(
                "Model returned {} tool calls; running {} and ignoring {:?}",
                calls.len(),
                first.function.name,
                ignored
            );
        }

        let invocation = Invocation::decode(&first.function.name, &first.function.arguments)?;
        let operation = invocation.name();
        tracing::info!("Dispatching task to {}", operation);
        tracing::debug!("Arguments: {:?}", invocation);

        let started = Instant::now();
        let ctx = self.ctx.clone();
        let result = match tokio::spawn(async move { invocation.execute(&ctx).await }).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("{} failed ({}): {}", operation, e.kind(), e);
                return Err(handler_failure(e));
            }
            Err(e) => {
                tracing::warn!("{} aborted: {}", operation, e);
                return Err(handler_failure(e));
            }
        };

        tracing::info!(
            "{} completed in {} ms",
            operation,
            started.elapsed().as_millis()
        );
        Ok(DispatchOutcome::Completed { operation, result })
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;

    use super::DispatchContext;
    use crate::config::Config;
    use crate::llm::scripted::ScriptedClient;

    /// Context with default configuration and no scripted remote responses.
    pub fn context() -> DispatchContext {
        scripted(ScriptedClient::new()).0
    }

    /// Context backed by `client`, returned alongside for inspection.
    pub fn scripted(client: ScriptedClient) -> (DispatchContext, Arc<ScriptedClient>) {
        scripted_with(Config::default(), client)
    }

    pub fn scripted_with(
        config: Config,
        client: ScriptedClient,
    ) -> (DispatchContext, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let ctx = DispatchContext::new(Arc::new(config), client.clone());
        (ctx, client)
    }
}
