use std::time::Instant;

use serde_json::json;
use tickvault_warehouse::{QueryGuardrails, Warehouse};

use crate::cli::SqlArgs;
use crate::envelope::SourceId;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &SqlArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let started = Instant::now();

    let query = args.query.trim();
    if query.is_empty() {
        return Err(CliError::Command(String::from("query must not be empty")));
    }

    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };

    let result = warehouse
        .execute_query(query, guardrails)
        .map_err(|error| CliError::Command(error.to_string()))?;

    let truncated = result.truncated;
    let row_count = result.row_count;
    let data = json!({
        "columns": result.columns,
        "rows": result.rows,
        "row_count": row_count,
        "truncated": truncated,
    });

    let mut command_result = CommandResult::ok(data, vec![SourceId::Warehouse]);
    if truncated {
        command_result = command_result.with_warning(format!(
            "results truncated to {} row(s); raise --max-rows to see more",
            args.max_rows
        ));
    }
    Ok(command_result.with_latency(super::elapsed_ms(started)))
}
