//! Most-similar comment pair via embeddings.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::output::{require_exists, write_atomic};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

/// Cosine similarity `dot / (|a| * |b|)`. A zero-norm vector yields 0, never NaN.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Indices `(i, j)` with `i < j` of the most similar pair, and its score.
///
/// Strictly greater scores replace the current best, so the first pair found wins ties.
/// Requires at least two vectors.
fn most_similar_pair(vectors: &[Vec<f64>]) -> ((usize, usize), f64) {
    let mut best = (0, 1);
    let mut best_score = -1.0;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let score = cosine_similarity(&vectors[i], &vectors[j]);
            if score > best_score {
                best_score = score;
                best = (i, j);
            }
        }
    }
    (best, best_score)
}

pub struct FindSimilarComments;

#[async_trait]
impl Tool for FindSimilarComments {
    type Args = IoArgs;
    const NAME: &'static str = "find_similar_comments";

    fn description(&self) -> &'static str {
        "Reads comments (one per line) from a file, uses embeddings to find the most similar pair \
         of comments, and writes them to the output file, one per line."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the input file containing comments", "Path to the output file")
    }

    async fn execute(&self, args: IoArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input file")?;

        let text = tokio::fs::read_to_string(&args.input_location)
            .await
            .map_err(failed("Error processing comments"))?;
        let comments: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if comments.len() < 2 {
            return Err(TaskError::InvalidRequest(
                "Need at least 2 comments to find similar pairs".to_string(),
            ));
        }

        let mut embeddings = Vec::with_capacity(comments.len());
        for comment in &comments {
            embeddings.push(ctx.llm.embedding(&ctx.config.embedding_model, comment).await?);
        }
        tracing::debug!("Embedded {} comments", embeddings.len());

        let ((i, j), score) = most_similar_pair(&embeddings);
        let contents = format!("{}\n{}\n", comments[i], comments[j]);
        write_atomic(Path::new(&args.output_location), contents.as_bytes())
            .await
            .map_err(failed("Error processing comments"))?;

        Ok(OperationResult::success(format!(
            "Most similar comments saved to {}",
            args.output_location
        ))
        .with("similarity_score", score))
    }
}
