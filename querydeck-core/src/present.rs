//! Presentation of query results and charts
//!
//! [`ResultView`] decides how a result is shown; the `render_*` functions
//! turn results and charts into plain text for the terminal.

use serde_json::Value;

use crate::types::{
    stringify_value, Card, ChartDefinition, ChartType, Intent, QueryResult, Record, ResultTable,
};

/// Width of the longest bar in bar renderings
const BAR_WIDTH: usize = 40;

/// How a query result is displayed
#[derive(Debug, Clone, PartialEq)]
pub enum ResultView {
    /// Nothing to show
    Empty,
    /// Plain table of all rows
    Table { columns: Vec<String>, rows: Vec<Record> },
    /// KPI cards and/or named sub-tables
    Grouped {
        cards: Vec<Card>,
        tables: Vec<ResultTable>,
    },
}

impl ResultView {
    /// Choose the display for a result.
    ///
    /// - several rows: a table
    /// - one row with backend cards or sub-tables: those
    /// - one row with a single scalar field: one card labelled with the field
    /// - any other single row: a table
    pub fn from_result(result: &QueryResult) -> Self {
        let Some(first) = result.data.first() else {
            return ResultView::Empty;
        };

        if result.data.len() > 1 {
            return Self::table(result);
        }

        let cards = result.cards().to_vec();
        let tables = result.tables().to_vec();
        if !cards.is_empty() || !tables.is_empty() {
            return ResultView::Grouped { cards, tables };
        }

        match first.iter().next() {
            None => ResultView::Empty,
            Some((label, value)) if first.len() == 1 && !value.is_array() => {
                ResultView::Grouped {
                    cards: vec![Card {
                        label: label.clone(),
                        value: value.clone(),
                    }],
                    tables: Vec::new(),
                }
            }
            Some(_) => Self::table(result),
        }
    }

    fn table(result: &QueryResult) -> Self {
        let columns = if result.columns.is_empty() {
            result
                .data
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            result.columns.clone()
        };
        ResultView::Table {
            columns,
            rows: result.data.clone(),
        }
    }
}

/// "top_selling_items" -> "Top Selling Items"
pub fn humanize_heading(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for ch in name.replace('_', " ").chars() {
        if at_word_start && ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }
    out
}

/// "sql_query" -> "SQL QUERY"
pub fn intent_label(intent: Intent) -> String {
    intent.as_str().replace('_', " ").to_uppercase()
}

/// Render a result view as text
pub fn render_result(view: &ResultView) -> String {
    match view {
        ResultView::Empty => "No rows returned.\n".to_string(),
        ResultView::Table { columns, rows } => render_table(columns, rows),
        ResultView::Grouped { cards, tables } => {
            let mut out = String::new();
            for card in cards {
                out.push_str(&render_card(card));
            }
            for table in tables {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&humanize_heading(&table.name));
                out.push('\n');
                let columns: Vec<String> = table
                    .data
                    .first()
                    .map(|row| row.keys().cloned().collect())
                    .unwrap_or_default();
                out.push_str(&render_table(&columns, &table.data));
            }
            out
        }
    }
}

/// One KPI card: `label: value`
pub fn render_card(card: &Card) -> String {
    format!("{}: {}\n", card.label, stringify_value(&card.value))
}

/// Fixed-width text table
pub fn render_table(columns: &[String], rows: &[Record]) -> String {
    if columns.is_empty() {
        return "No rows returned.\n".to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(stringify_value).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_row(&mut out, columns.iter().map(String::as_str), &widths);
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out.push_str(&format!(
        "({} row{})\n",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    ));
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Render a chart as text, dispatching on its type
pub fn render_chart(chart: &ChartDefinition) -> String {
    let body = match chart.chart_type {
        ChartType::Bar | ChartType::HorizontalBar => render_bars(chart),
        ChartType::Pie | ChartType::Doughnut => render_shares(chart),
        ChartType::Line | ChartType::Area | ChartType::Radar => render_series(chart),
    };
    format!(
        "{} [{}]\n{}",
        chart.title,
        chart.chart_type.display_name(),
        body
    )
}

/// Bar charts: one scaled bar per label and dataset
fn render_bars(chart: &ChartDefinition) -> String {
    let max = chart
        .data
        .datasets
        .iter()
        .flat_map(|d| d.data.iter().map(|v| numeric(v).abs()))
        .fold(0.0_f64, f64::max);
    let label_width = label_width(chart);

    let mut out = String::new();
    for dataset in &chart.data.datasets {
        out.push_str(&format!("{}\n", dataset.label));
        for (label, value) in chart.data.labels.iter().zip(&dataset.data) {
            let len = if max > 0.0 {
                ((numeric(value).abs() / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!(
                "  {:<width$} {} {}\n",
                label,
                "#".repeat(len),
                value,
                width = label_width
            ));
        }
    }
    out
}

/// Pie and doughnut charts: each label's share of the first dataset
fn render_shares(chart: &ChartDefinition) -> String {
    let Some(dataset) = chart.data.datasets.first() else {
        return String::new();
    };
    let total: f64 = dataset.data.iter().map(|v| numeric(v).max(0.0)).sum();
    let label_width = label_width(chart);

    let mut out = format!("{}\n", dataset.label);
    for (label, value) in chart.data.labels.iter().zip(&dataset.data) {
        let share = if total > 0.0 {
            numeric(value).max(0.0) / total * 100.0
        } else {
            0.0
        };
        out.push_str(&format!(
            "  {:<width$} {:>5.1}%  ({})\n",
            label,
            share,
            value,
            width = label_width
        ));
    }
    out
}

/// Line, area and radar charts: labels down, one column per dataset
fn render_series(chart: &ChartDefinition) -> String {
    let mut columns = vec![String::new()];
    columns.extend(chart.data.datasets.iter().map(|d| d.label.clone()));

    let rows: Vec<Record> = chart
        .data
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let mut row = Record::new();
            row.insert(String::new(), Value::String(label.clone()));
            for dataset in &chart.data.datasets {
                let value = dataset.data.get(i).cloned().unwrap_or_default();
                row.insert(dataset.label.clone(), Value::String(value));
            }
            row
        })
        .collect();

    render_table(&columns, &rows)
}

fn label_width(chart: &ChartDefinition) -> usize {
    chart
        .data
        .labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
}

fn numeric(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChartData, ChartId, Dataset, DatasetStyle};
    use serde_json::json;

    fn result(value: serde_json::Value) -> QueryResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_single_field_single_row_is_card() {
        let view = ResultView::from_result(&result(json!({
            "columns": ["total"],
            "data": [{"total": 1000}]
        })));
        assert_eq!(
            view,
            ResultView::Grouped {
                cards: vec![Card {
                    label: "total".to_string(),
                    value: json!(1000)
                }],
                tables: vec![]
            }
        );
    }

    #[test]
    fn test_single_row_multi_field_is_table() {
        let view = ResultView::from_result(&result(json!({
            "columns": ["region", "total"],
            "data": [{"region": "north", "total": 5}]
        })));
        match view {
            ResultView::Table { columns, rows } => {
                assert_eq!(columns, vec!["region", "total"]);
                assert_eq!(rows.len(), 1);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_single_row_array_field_is_table() {
        let view = ResultView::from_result(&result(json!({
            "columns": ["tags"],
            "data": [{"tags": ["a", "b"]}]
        })));
        assert!(matches!(view, ResultView::Table { .. }));
    }

    #[test]
    fn test_backend_cards_and_tables_win() {
        let view = ResultView::from_result(&result(json!({
            "columns": ["total", "items"],
            "data": [{"total": 3, "items": []}],
            "cards": [{"label": "total", "value": 3}],
            "tables": [{"name": "items", "data": []}]
        })));
        match view {
            ResultView::Grouped { cards, tables } => {
                assert_eq!(cards.len(), 1);
                assert_eq!(tables[0].name, "items");
            }
            other => panic!("expected grouped, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_row_is_table_and_empty_is_empty() {
        let view = ResultView::from_result(&result(json!({
            "columns": ["n"],
            "data": [{"n": 1}, {"n": 2}],
            "cards": [{"label": "n", "value": 1}]
        })));
        assert!(matches!(view, ResultView::Table { .. }));

        assert_eq!(ResultView::from_result(&QueryResult::default()), ResultView::Empty);
    }

    #[test]
    fn test_humanize_heading() {
        assert_eq!(humanize_heading("top_selling_items"), "Top Selling Items");
        assert_eq!(humanize_heading("q1 sales"), "Q1 Sales");
    }

    #[test]
    fn test_intent_label() {
        assert_eq!(intent_label(Intent::SqlQuery), "SQL QUERY");
        assert_eq!(intent_label(Intent::SarcasticResponse), "SARCASTIC RESPONSE");
    }

    #[test]
    fn test_render_table() {
        let rows: Vec<Record> = vec![
            serde_json::from_value(json!({"region": "north", "total": 5})).unwrap(),
        ];
        let text = render_table(&["region".to_string(), "total".to_string()], &rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "region | total");
        assert_eq!(lines[2], "north  | 5");
        assert_eq!(lines[3], "(1 row)");
    }

    fn chart(chart_type: ChartType) -> ChartDefinition {
        ChartDefinition {
            id: ChartId(1),
            title: "Orders".to_string(),
            chart_type,
            data: ChartData {
                labels: vec!["north".to_string(), "south".to_string()],
                datasets: vec![Dataset {
                    label: "orders".to_string(),
                    data: vec!["30".to_string(), "10".to_string()],
                    style: DatasetStyle::for_index(0),
                }],
            },
        }
    }

    #[test]
    fn test_render_bars_scales_to_max() {
        let text = render_chart(&chart(ChartType::Bar));
        assert!(text.starts_with("Orders [Bar Chart]"));
        assert!(text.contains(&format!("north {} 30", "#".repeat(BAR_WIDTH))));
        assert!(text.contains(&format!("south {} 10", "#".repeat(13))));
    }

    #[test]
    fn test_render_shares() {
        let text = render_chart(&chart(ChartType::Doughnut));
        assert!(text.contains(" 75.0%"));
        assert!(text.contains(" 25.0%"));
    }

    #[test]
    fn test_render_series() {
        let text = render_chart(&chart(ChartType::Line));
        assert!(text.contains("orders"));
        assert!(text.contains("north | 30"));
    }
}
