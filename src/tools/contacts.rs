use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;

use super::output::{require_exists, write_json};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

/// Lowercased string field, or empty when missing or not a string.
fn name_field(contact: &Value, key: &str) -> String {
    contact
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

fn compare_contacts(a: &Value, b: &Value) -> Ordering {
    name_field(a, "last_name")
        .cmp(&name_field(b, "last_name"))
        .then_with(|| name_field(a, "first_name").cmp(&name_field(b, "first_name")))
}

/// Stable sort by (last_name, first_name), case-insensitive.
pub fn sort_contacts(contacts: &mut [Value]) {
    contacts.sort_by(compare_contacts);
}

pub struct SortContacts;

#[async_trait]
impl Tool for SortContacts {
    type Args = IoArgs;
    const NAME: &'static str = "sort_contacts";

    fn description(&self) -> &'static str {
        "Sorts a JSON array of contacts by last_name, then first_name (case-insensitive) \
         and writes the sorted array to the output location."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Input file path", "Output file path")
    }

    async fn execute(&self, args: IoArgs, _ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input file")?;

        let raw = tokio::fs::read_to_string(&args.input_location)
            .await
            .map_err(failed("Error sorting contacts"))?;
        let mut contacts: Vec<Value> =
            serde_json::from_str(&raw).map_err(failed("Error sorting contacts"))?;

        sort_contacts(&mut contacts);

        let destination = std::path::absolute(&args.output_location)
            .map_err(failed("Error sorting contacts"))?;
        write_json(&destination, &contacts)
            .await
            .map_err(failed("Error sorting contacts"))?;

        tracing::debug!("Sorted {} contacts", contacts.len());
        Ok(OperationResult::success(format!(
            "Contacts sorted and saved to {}.",
            destination.display()
        )))
    }
}
