//! CSV to JSON records conversion.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Number, Value};

use super::output::{require_exists, write_json};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

/// Type a single cell: integer, then float, then null for empty, else string.
fn infer_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/// Read `path` as CSV with a header row into one JSON object per data row.
///
/// Rows shorter than the header fill the missing columns with null; cells past
/// the last header are dropped.
fn read_records(path: &Path) -> Result<Vec<Value>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let object: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.to_string(), row.get(i).map_or(Value::Null, infer_cell)))
            .collect();
        records.push(Value::Object(object));
    }
    Ok(records)
}

pub struct FilterCsvToJson;

#[async_trait]
impl Tool for FilterCsvToJson {
    type Args = IoArgs;
    const NAME: &'static str = "filter_csv_to_json";

    fn description(&self) -> &'static str {
        "Reads a CSV file with a header row and writes its rows as a JSON array of objects keyed by column name."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the input CSV file", "Path to the output JSON file")
    }

    async fn execute(&self, args: IoArgs, _ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input file")?;

        let input = PathBuf::from(&args.input_location);
        let records = tokio::task::spawn_blocking(move || read_records(&input))
            .await
            .map_err(failed("Error processing CSV file"))?
            .map_err(failed("Error processing CSV file"))?;

        write_json(Path::new(&args.output_location), &records)
            .await
            .map_err(failed("Error processing CSV file"))?;

        Ok(OperationResult::success(format!(
            "CSV data converted to JSON and saved to {}.",
            args.output_location
        ))
        .with("record_count", records.len()))
    }
}
