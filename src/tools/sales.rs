//! Gold ticket revenue from the ticket database.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;

use super::output::{require_exists, write_atomic};
use super::{io_schema, IoArgs, OperationResult, Tool};
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};

const GOLD_SALES_QUERY: &str = "SELECT SUM(units * price) FROM tickets WHERE type = 'Gold'";

/// Render an aggregate the way it is written to the output file.
///
/// No matching rows (NULL) is a zero total. Integral reals keep one decimal.
fn format_total(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "0".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.1}", f),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => String::from_utf8_lossy(b).to_string(),
    }
}

fn query_gold_total(db: &Path) -> rusqlite::Result<SqlValue> {
    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    conn.query_row(GOLD_SALES_QUERY, [], |row| row.get::<_, SqlValue>(0))
}

pub struct CalculateGoldSales;

#[async_trait]
impl Tool for CalculateGoldSales {
    type Args = IoArgs;
    const NAME: &'static str = "calculate_gold_sales";

    fn description(&self) -> &'static str {
        "Calculates the total sales (units * price) for the Gold ticket type from the SQLite \
         database's tickets table and writes the result to the output file."
    }

    fn parameters_schema(&self) -> Value {
        io_schema("Path to the SQLite database file", "Path to the output file")
    }

    async fn execute(&self, args: IoArgs, _ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        require_exists(&args.input_location, "Database file")?;

        let db = args.input_location.clone();
        let total = tokio::task::spawn_blocking(move || query_gold_total(Path::new(&db)))
            .await
            .map_err(failed("Error calculating gold ticket sales"))?
            .map_err(failed("Error calculating gold ticket sales"))?;
        let total = format_total(&total);

        write_atomic(Path::new(&args.output_location), total.as_bytes())
            .await
            .map_err(failed("Error calculating gold ticket sales"))?;

        Ok(OperationResult::success(format!(
            "Gold ticket sales total saved to {}.",
            args.output_location
        ))
        .with("total", total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests_support::context;

    fn ticket_db(path: &Path, rows: &[(&str, i64, f64)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "CREATE TABLE tickets (type TEXT, units INTEGER, price DECIMAL)",
            [],
        )
        .unwrap();
        for (kind, units, price) in rows {
            conn.execute(
                "INSERT INTO tickets (type, units, price) VALUES (?1, ?2, ?3)",
                rusqlite::params![kind, units, price],
            )
            .unwrap();
        }
    }

    async fn run(dir: &Path) -> Result<String, TaskError> {
        let output = dir.join("gold.txt");
        CalculateGoldSales
            .execute(
                IoArgs {
                    input_location: dir.join("tickets.db").to_string_lossy().to_string(),
                    output_location: output.to_string_lossy().to_string(),
                },
                &context(),
            )
            .await?;
        Ok(std::fs::read_to_string(output).unwrap())
    }

    #[test]
    fn test_format_total() {
        assert_eq!(format_total(&SqlValue::Null), "0");
        assert_eq!(format_total(&SqlValue::Integer(42)), "42");
        assert_eq!(format_total(&SqlValue::Real(100.0)), "100.0");
        assert_eq!(format_total(&SqlValue::Real(12.5)), "12.5");
    }

    #[tokio::test]
    async fn test_sums_only_gold_rows() {
        let dir = tempfile::tempdir().unwrap();
        ticket_db(
            &dir.path().join("tickets.db"),
            &[("Gold", 2, 10.5), ("Silver", 100, 1.0), ("Gold", 1, 4.0), ("gold", 9, 9.0)],
        );
        assert_eq!(run(dir.path()).await.unwrap(), "25.0");
    }

    #[tokio::test]
    async fn test_no_gold_rows_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        ticket_db(&dir.path().join("tickets.db"), &[("Silver", 3, 2.0)]);
        assert_eq!(run(dir.path()).await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(run(dir.path()).await, Err(TaskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_table_is_operation_failure() {
        let dir = tempfile::tempdir().unwrap();
        Connection::open(dir.path().join("tickets.db"))
            .unwrap()
            .execute("CREATE TABLE other (x INTEGER)", [])
            .unwrap();
        assert!(matches!(run(dir.path()).await, Err(TaskError::OperationFailed(_))));
    }
}
