//! Weekday counting over a file of loosely formatted dates.

use std::path::Path;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::Deserialize;
use serde_json::{json, Value};

use super::output::{require_exists, write_atomic};
use super::{OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

/// Recognized date formats, tried in this order; the first that parses wins.
pub const DATE_FORMATS: [&str; 5] = [
    "%Y-%m-%d",          // 2022-01-19
    "%d-%b-%Y",          // 07-Mar-2010
    "%Y/%m/%d %H:%M:%S", // 2011/08/05 11:28:37
    "%b %d, %Y",         // Oct 03, 2007
    "%Y/%m/%d",          // 2009/07/10
];

const DAY_NAMES: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Parse `input` with the first matching entry of [`DATE_FORMATS`].
///
/// Surrounding whitespace is ignored. Returns `None` when no format matches.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS.iter().find_map(|fmt| {
        if fmt.contains("%H") {
            NaiveDateTime::parse_from_str(input, fmt).ok().map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(input, fmt).ok()
        }
    })
}

/// Full English day name to weekday, case-insensitive.
fn weekday_from_name(name: &str) -> Option<Weekday> {
    let name = name.trim().to_lowercase();
    DAY_NAMES
        .iter()
        .find(|(day, _)| *day == name)
        .map(|(_, weekday)| *weekday)
}

/// Count lines of `text` whose date falls on `weekday`.
fn count_weekday(text: &str, weekday: Weekday) -> usize {
    text.lines()
        .filter_map(parse_date)
        .filter(|date| date.weekday() == weekday)
        .count()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct CountDays;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountDaysArgs {
    input_location: String,
    output_location: String,
    day_name: String,
}

#[async_trait]
impl Tool for CountDays {
    type Args = CountDaysArgs;
    const NAME: &'static str = "count_days";

    fn description(&self) -> &'static str {
        "Reads dates (one per line) from a file, counts how many fall on the given day of the week, \
         and writes the count to dates-{dayname}.txt next to the requested output location."
    }

    fn parameters_schema(&self) -> Value {
        let days: Vec<&str> = DAY_NAMES.iter().map(|(name, _)| *name).collect();
        json!({
            "type": "object",
            "properties": {
                "input_location": { "type": "string", "description": "Path to the input file containing dates" },
                "output_location": { "type": "string", "description": "Path to the output file" },
                "day_name": { "type": "string", "description": "Name of the day to count", "enum": days },
            },
            "required": ["input_location", "output_location", "day_name"],
            "additionalProperties": false,
        })
    }

    async fn execute(
        &self,
        args: CountDaysArgs,
        _ctx: &DispatchContext,
    ) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Input file")?;

        let weekday = weekday_from_name(&args.day_name).ok_or_else(|| {
            TaskError::InvalidRequest(format!("Invalid day name: {}", args.day_name))
        })?;
        let day = args.day_name.trim().to_lowercase();

        let text = tokio::fs::read_to_string(&args.input_location)
            .await
            .map_err(failed("Error processing dates"))?;
        let count = count_weekday(&text, weekday);

        let destination = Path::new(&args.output_location)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("dates-{}.txt", day));
        write_atomic(&destination, count.to_string().as_bytes())
            .await
            .map_err(failed("Error processing dates"))?;

        Ok(OperationResult::success(format!(
            "Count of {}s saved to {}.",
            capitalize(&day),
            destination.display()
        ))
        .with("count", count))
    }
}
