//! Text formatting shared by the one-shot commands and the studio

use querydeck_core::present::{self, ResultView};
use querydeck_core::session::is_read_only_refusal;
use querydeck_core::{ChatTurn, Dashboard, QueryResult, Session};

/// A chat turn as printed after asking, or in a history listing
pub fn format_turn(number: Option<usize>, turn: &ChatTurn) -> String {
    let mut out = String::new();
    let label = present::intent_label(turn.intent);
    match number {
        Some(n) => out.push_str(&format!("#{} [{}] {}\n", n, label, turn.question)),
        None => out.push_str(&format!("[{}] {}\n", label, turn.question)),
    }

    if let Some(sql) = turn.sql_query.as_deref() {
        if is_read_only_refusal(sql) {
            out.push_str(&format!("  Warning: {}\n", sql));
        } else {
            out.push_str(&format!("  SQL: {}\n", sql));
        }
    }
    if let Some(tables) = turn.filtered_tables.as_ref().filter(|t| !t.is_empty()) {
        out.push_str(&format!("  Tables: {}\n", tables.join(", ")));
    }
    if let Some(response) = turn.response.as_deref() {
        out.push_str(&format!("  {}\n", response));
    }
    out
}

pub fn format_result(result: &QueryResult) -> String {
    present::render_result(&ResultView::from_result(result))
}

/// Header line of a dashboard listing
pub fn dashboard_list_header() -> String {
    format!(
        "{:>6}  {:<30} {:<20} {:>5} {:>6}  {}\n{:-<88}\n",
        "ID", "Title", "Database", "Chats", "Charts", "Updated", ""
    )
}

pub fn format_dashboard_row(dashboard: &Dashboard) -> String {
    let database = match (&dashboard.db_name, dashboard.db_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => "-".to_string(),
    };
    let updated = dashboard
        .updated_at
        .or(dashboard.created_at)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "{:>6}  {:<30} {:<20} {:>5} {:>6}  {}\n",
        dashboard.id,
        truncate(dashboard.display_title(), 30),
        truncate(&database, 20),
        dashboard.chats.len(),
        dashboard.charts.len(),
        updated
    )
}

/// Everything a loaded session holds: header, chat history, charts
pub fn format_session(session: &Session) -> String {
    let mut out = String::new();

    let title = if session.title().is_empty() {
        "Untitled"
    } else {
        session.title()
    };
    match session.dashboard_id() {
        Some(id) => out.push_str(&format!("{} (dashboard #{})\n", title, id)),
        None => out.push_str(&format!("{} (unsaved)\n", title)),
    }
    match (session.db_name(), session.db_id()) {
        (Some(name), _) => out.push_str(&format!("Database: {}\n", name)),
        (None, Some(id)) => out.push_str(&format!("Database: #{}\n", id)),
        (None, None) => out.push_str("Database: <none>\n"),
    }

    out.push_str(&format!("\nChat history ({})\n", session.chats().len()));
    for (i, turn) in session.chats().iter().enumerate() {
        out.push_str(&format_turn(Some(i + 1), turn));
    }

    out.push_str(&format!("\nCharts ({})\n", session.charts().len()));
    for chart in session.charts() {
        out.push_str(&format!("\n#{} ", chart.id));
        out.push_str(&present::render_chart(chart));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
