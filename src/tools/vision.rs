use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;

use super::output::{require_exists, write_atomic};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};
use crate::llm::ChatOptions;

const CARD_PROMPT: &str = "This image contains a credit card number. Please extract only the \
    16-digit number from the card. Return only the digits without any spaces or special characters.";

/// MIME type for an image path, from its extension (PNG when unknown).
fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

pub struct ExtractCreditCard;

#[async_trait]
impl Tool for ExtractCreditCard {
    type Args = IoArgs;
    const NAME: &'static str = "extract_credit_card";

    fn description(&self) -> &'static str {
        "Extracts the credit card number from an image and writes it to a text file without spaces."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the input image file", "Path to the output text file")
    }

    async fn execute(&self, args: IoArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input image")?;

        let input = Path::new(&args.input_location);
        let bytes = tokio::fs::read(input)
            .await
            .map_err(failed("Error processing credit card image"))?;
        let image = data_url(image_mime(input), &bytes);

        let options = ChatOptions {
            max_tokens: Some(300),
            ..ChatOptions::default()
        };
        let reply = ctx
            .llm
            .vision(&ctx.config.vision_model, CARD_PROMPT, &image, options)
            .await?
            .into_text()?;
        let card_number = digits_only(&reply);

        write_atomic(Path::new(&args.output_location), card_number.as_bytes())
            .await
            .map_err(failed("Error processing credit card image"))?;

        Ok(OperationResult::success(format!(
            "Credit card number extracted and saved to {}.",
            args.output_location
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests_support::scripted;
    use crate::llm::scripted::ScriptedClient;

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("Card: 4111 1111-1111 1111."), "4111111111111111");
        assert_eq!(digits_only("no digits"), "");
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("card.JPG")), "image/jpeg");
        assert_eq!(image_mime(Path::new("card.webp")), "image/webp");
        assert_eq!(image_mime(Path::new("card")), "image/png");
    }

    #[tokio::test]
    async fn test_reply_is_stripped_to_digits() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("card.png");
        let output = dir.path().join("card.txt");
        std::fs::write(&input, [0x89, b'P', b'N', b'G']).unwrap();

        let (ctx, client) = scripted(ScriptedClient::new().reply("4026 3990 0000 1234\n"));
        ExtractCreditCard
            .execute(
                IoArgs {
                    input_location: input.to_string_lossy().to_string(),
                    output_location: output.to_string_lossy().to_string(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "4026399000001234");
        let urls = client.vision_urls.lock().unwrap();
        assert_eq!(urls[0], format!("data:image/png;base64,{}", BASE64.encode([0x89, b'P', b'N', b'G'])));
    }
}
