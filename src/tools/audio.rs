use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::output::{require_exists, write_atomic};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

pub struct TranscribeAudio;

#[async_trait]
impl Tool for TranscribeAudio {
    type Args = IoArgs;
    const NAME: &'static str = "transcribe_audio";

    fn description(&self) -> &'static str {
        "Transcribes an audio file to text and writes the transcript to the output location."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the input audio file", "Path to the output text file")
    }

    async fn execute(&self, args: IoArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input audio file")?;

        let input = Path::new(&args.input_location);
        let audio = tokio::fs::read(input)
            .await
            .map_err(failed("Error transcribing audio"))?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let transcript = ctx
            .llm
            .transcription(&ctx.config.transcription_model, &file_name, audio)
            .await?;

        write_atomic(Path::new(&args.output_location), transcript.as_bytes())
            .await
            .map_err(failed("Error transcribing audio"))?;

        Ok(OperationResult::success(format!(
            "Audio transcription saved to {}.",
            args.output_location
        )))
    }
}
