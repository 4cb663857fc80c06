//! Partition-filtered extract query composition

use crate::partition::PartitionKey;

/// Compose the query an Extract stage sends to the source database.
///
/// With a date column and a partition the base query is wrapped and
/// filtered to exactly that date; otherwise it is returned unchanged.
/// The partition is a parsed calendar date, so the literal cannot carry
/// quotes.
pub fn partition_query(
    query: &str,
    date_column: Option<&str>,
    partition: Option<PartitionKey>,
) -> String {
    let query = query.trim().trim_end_matches(';').trim_end();
    match (date_column.map(str::trim).filter(|c| !c.is_empty()), partition) {
        (Some(column), Some(partition)) => format!(
            "SELECT * FROM ({query}) AS src WHERE {column} = DATE '{partition}'"
        ),
        _ => query.to_string(),
    }
}
