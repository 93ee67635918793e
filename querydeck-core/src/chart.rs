//! Chart construction from query results
//!
//! A chart picks one column of the current result as its category axis and
//! one or more columns as value series. Values are stored as strings, exactly
//! as the result rendered them, so a saved chart needs no result to redraw.

use crate::error::{Error, Result};
use crate::types::{
    stringify_value, ChartData, ChartDefinition, ChartId, ChartType, Dataset, DatasetStyle,
    QueryResult, Record,
};

/// What the user asked for when creating a chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub title: String,
    pub chart_type: ChartType,
    /// Column whose values become labels (x-axis for axis charts)
    pub category: String,
    /// Columns whose values become datasets (y-axis for axis charts)
    pub values: Vec<String>,
}

/// Rows charts are built from: the first backend sub-table when the result
/// is grouped, otherwise the plain rows.
pub fn source_rows(result: &QueryResult) -> &[Record] {
    match result.tables().first() {
        Some(table) => &table.data,
        None => &result.data,
    }
}

/// Columns a chart can use, in row order
pub fn available_columns(result: &QueryResult) -> Vec<String> {
    source_rows(result)
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Whether the result has anything to chart
pub fn has_chartable_rows(result: &QueryResult) -> bool {
    !source_rows(result).is_empty()
}

/// Build a chart definition with the given id
pub fn build_chart(
    result: &QueryResult,
    request: &ChartRequest,
    id: ChartId,
) -> Result<ChartDefinition> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(Error::Chart("chart title is required".to_string()));
    }

    let rows = source_rows(result);
    if rows.is_empty() {
        return Err(Error::Chart("no table data available for charts".to_string()));
    }

    let columns = available_columns(result);
    if !columns.iter().any(|c| c == &request.category) {
        return Err(Error::Chart(format!(
            "unknown category column: {}",
            request.category
        )));
    }

    let mut values: Vec<&str> = Vec::new();
    for column in &request.values {
        if !columns.iter().any(|c| c == column) {
            return Err(Error::Chart(format!("unknown value column: {}", column)));
        }
        if !values.contains(&column.as_str()) {
            values.push(column);
        }
    }
    if values.is_empty() {
        return Err(Error::Chart("select at least one value column".to_string()));
    }

    let labels = rows
        .iter()
        .map(|row| cell(row, &request.category))
        .collect();

    let datasets = values
        .iter()
        .enumerate()
        .map(|(idx, column)| Dataset {
            label: column.to_string(),
            data: rows.iter().map(|row| cell(row, column)).collect(),
            style: DatasetStyle::for_index(idx),
        })
        .collect();

    Ok(ChartDefinition {
        id,
        title: title.to_string(),
        chart_type: request.chart_type,
        data: ChartData { labels, datasets },
    })
}

/// A time-based id that does not collide with any existing chart.
///
/// Ids are millisecond timestamps; when two charts land in the same
/// millisecond (or a loaded dashboard carries ids from the future) the new id
/// is bumped past the largest one already present.
pub fn next_chart_id(existing: &[ChartDefinition], now_millis: i64) -> ChartId {
    let floor = existing
        .iter()
        .map(|c| c.id.0.saturating_add(1))
        .max()
        .unwrap_or(i64::MIN);
    ChartId(now_millis.max(floor))
}

/// Stringified cell; missing columns render as "undefined" like the browser did
fn cell(row: &Record, column: &str) -> String {
    row.get(column)
        .map(stringify_value)
        .unwrap_or_else(|| "undefined".to_string())
}
