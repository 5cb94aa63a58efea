use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::output::{require_exists, write_atomic};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};
use crate::llm::{ChatMessage, ChatOptions};

const SENDER_SYSTEM_PROMPT: &str =
    "You are an AI assistant that extracts the sender's email from an email message.";

const SENDER_INSTRUCTION: &str = "Extract the sender's email address from the following email \
    message. The sender is the person who originally sent the email, not the recipient. Identify \
    the sender by analyzing the email structure, headers, and context. Return only the sender's \
    email address as plain text, nothing else:";

pub struct ExtractSenderEmail;

#[async_trait]
impl Tool for ExtractSenderEmail {
    type Args = IoArgs;
    const NAME: &'static str = "extract_sender_email";

    fn description(&self) -> &'static str {
        "Reads an email message from a file, extracts the sender's email address and writes it to the output file."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the input email file", "Path to the output file")
    }

    async fn execute(&self, args: IoArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input file")?;

        let email = tokio::fs::read_to_string(&args.input_location)
            .await
            .map_err(failed("Error extracting sender's email"))?;

        let messages = [
            ChatMessage::system(SENDER_SYSTEM_PROMPT),
            ChatMessage::user(format!("{}\n\n{}", SENDER_INSTRUCTION, email)),
        ];
        let options = ChatOptions {
            temperature: Some(0.2),
            ..ChatOptions::default()
        };
        let reply = ctx
            .llm
            .chat_completion_with_options(&ctx.config.chat_model, &messages, None, options)
            .await?
            .into_text()?;
        let sender = reply.trim();

        write_atomic(Path::new(&args.output_location), sender.as_bytes())
            .await
            .map_err(failed("Error extracting sender's email"))?;

        Ok(OperationResult::success(format!(
            "Sender's email extracted and saved to {}",
            args.output_location
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests_support::scripted;
    use crate::llm::scripted::ScriptedClient;

    #[tokio::test]
    async fn test_reply_is_trimmed_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("email.txt");
        let output = dir.path().join("sender.txt");
        std::fs::write(&input, "From: Alice <alice@example.com>\nTo: bob@example.com\n\nHi Bob").unwrap();

        let (ctx, client) = scripted(ScriptedClient::new().reply("  alice@example.com\n"));
        ExtractSenderEmail
            .execute(
                IoArgs {
                    input_location: input.to_string_lossy().to_string(),
                    output_location: output.to_string_lossy().to_string(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "alice@example.com");

        let recorded = client.recorded.lock().unwrap();
        assert_eq!(recorded[0].temperature, Some(0.2));
        assert!(recorded[0].tool_names.is_empty());
        let prompt = recorded[0].messages[1].content.as_str();
        assert!(prompt.starts_with(SENDER_INSTRUCTION));
        assert!(prompt.ends_with("Hi Bob"));
    }

    #[tokio::test]
    async fn test_missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, client) = scripted(ScriptedClient::new().reply("x@example.com"));
        let err = ExtractSenderEmail
            .execute(
                IoArgs {
                    input_location: dir.path().join("missing.txt").to_string_lossy().to_string(),
                    output_location: dir.path().join("out.txt").to_string_lossy().to_string(),
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
        assert!(client.recorded.lock().unwrap().is_empty());
    }
}
