//! Session state model
//!
//! A [`Session`] is the authoritative view of one analysis session: the chat
//! log, the charts built so far, the SQL currently driving the results panel
//! and the last result it produced. It is what gets rendered, what gets saved
//! as a dashboard, and what a loaded dashboard is restored into.
//!
//! ## Persistence
//!
//! Saving sends the whole chat log and chart list; the backend replaces what
//! it had (no diffing). The first save creates the dashboard and adopts the id
//! the backend assigns; later saves update that id. Loading replaces chats,
//! charts and title in one step. A failed save or load leaves the session
//! exactly as it was.
//!
//! ## Out-of-order results
//!
//! Executions are tagged with a monotonically increasing sequence number.
//! A result is applied only if its ticket is the most recently issued one, so
//! a slow response to an older query can never overwrite a newer result.

use chrono::Utc;

use crate::api::ApiClient;
use crate::chart::{self, ChartRequest};
use crate::error::{Error, Result};
use crate::types::{
    ChartDefinition, ChartId, ChatTurn, Dashboard, DashboardId, DashboardPayload, QueryResult,
};

/// Texts the backend puts in place of SQL when it refuses to write a
/// modifying statement. These must never be sent for execution.
const READ_ONLY_REFUSALS: [&str; 2] = [
    "I can only generate SELECT queries",
    "cannot modify the database",
];

/// What the main panel shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Results,
    Chart(ChartId),
}

/// Handle for one in-flight SQL execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTicket {
    sequence: u64,
    sql: String,
}

impl ExecutionTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// In-memory state of one analysis session
#[derive(Debug, Clone)]
pub struct Session {
    dashboard_id: Option<DashboardId>,
    title: String,
    db_id: Option<i64>,
    db_name: Option<String>,
    client_id: Option<i64>,
    chats: Vec<ChatTurn>,
    charts: Vec<ChartDefinition>,
    active_query: Option<String>,
    result: Option<QueryResult>,
    active_view: ActiveView,
    issued_sequence: u64,
}

impl Session {
    /// Start an empty session against a database, on behalf of a tenant
    pub fn new(db_id: Option<i64>, client_id: Option<i64>) -> Self {
        Self {
            dashboard_id: None,
            title: String::new(),
            db_id,
            db_name: None,
            client_id,
            chats: Vec::new(),
            charts: Vec::new(),
            active_query: None,
            result: None,
            active_view: ActiveView::Results,
            issued_sequence: 0,
        }
    }

    pub fn dashboard_id(&self) -> Option<DashboardId> {
        self.dashboard_id
    }

    /// Saved title; empty until the first save or load
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn db_id(&self) -> Option<i64> {
        self.db_id
    }

    pub fn db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn set_db_name(&mut self, name: impl Into<String>) {
        self.db_name = Some(name.into());
    }

    pub fn client_id(&self) -> Option<i64> {
        self.client_id
    }

    pub fn chats(&self) -> &[ChatTurn] {
        &self.chats
    }

    pub fn charts(&self) -> &[ChartDefinition] {
        &self.charts
    }

    /// SQL currently driving the results panel
    pub fn active_query(&self) -> Option<&str> {
        self.active_query.as_deref()
    }

    /// Result of the latest applied execution
    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    pub fn active_view(&self) -> ActiveView {
        self.active_view
    }

    /// The chart shown in the main panel, if a chart is selected
    pub fn active_chart(&self) -> Option<&ChartDefinition> {
        match self.active_view {
            ActiveView::Chart(id) => self.chart(id),
            ActiveView::Results => None,
        }
    }

    pub fn chart(&self, id: ChartId) -> Option<&ChartDefinition> {
        self.charts.iter().find(|c| c.id == id)
    }

    /// Whether the session has been saved as a dashboard
    pub fn is_saved(&self) -> bool {
        self.dashboard_id.is_some()
    }

    // ============================================
    // Chat
    // ============================================

    /// Append an answered question to the chat log.
    ///
    /// A `sql_query` turn makes its SQL the active query; any other intent
    /// clears it.
    pub fn append_chat_turn(&mut self, turn: ChatTurn) -> &ChatTurn {
        self.active_query = turn.executable_sql().map(str::to_string);
        self.chats.push(turn);
        &self.chats[self.chats.len() - 1]
    }

    /// Ask the backend a question and append the answer as a chat turn
    pub async fn ask(&mut self, client: &ApiClient, question: &str) -> Result<&ChatTurn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }

        let response = client.query(question).await?;
        tracing::info!(
            intent = %response.intent,
            has_sql = response.sql_query.is_some(),
            "Question answered"
        );
        Ok(self.append_chat_turn(ChatTurn::from_response(question, response)))
    }

    /// Make the SQL of an earlier turn the active query again.
    ///
    /// Returns false when that turn has no SQL to run.
    pub fn rerun(&mut self, index: usize) -> Result<bool> {
        if self.db_id.is_none() {
            return Err(Error::NoDatabase);
        }
        let turn = self
            .chats
            .get(index)
            .ok_or_else(|| Error::InvalidInput(format!("no chat turn #{}", index + 1)))?;

        match turn.executable_sql() {
            Some(sql) => {
                self.active_query = Some(sql.to_string());
                self.active_view = ActiveView::Results;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ============================================
    // Execution
    // ============================================

    /// Issue a ticket for executing the active query.
    ///
    /// Returns `None` when there is nothing to execute: no active query, or
    /// the backend's read-only refusal text in place of SQL. A refusal also
    /// clears the current result and invalidates executions still in flight.
    pub fn begin_execution(&mut self) -> Option<ExecutionTicket> {
        let sql = self.active_query.clone()?;

        if is_read_only_refusal(&sql) {
            self.result = None;
            self.issued_sequence += 1;
            return None;
        }

        self.issued_sequence += 1;
        Some(ExecutionTicket {
            sequence: self.issued_sequence,
            sql,
        })
    }

    /// Apply an execution result if its ticket is still the newest.
    ///
    /// Returns false when the result was stale and discarded.
    pub fn complete_execution(&mut self, ticket: &ExecutionTicket, result: QueryResult) -> bool {
        if ticket.sequence != self.issued_sequence {
            tracing::debug!(
                ticket = ticket.sequence,
                latest = self.issued_sequence,
                "Discarding stale execution result"
            );
            return false;
        }

        self.result = Some(result);
        true
    }

    /// Execute the active query and apply its result.
    ///
    /// Returns the applied result, or `None` when nothing was executed or a
    /// newer execution superseded this one.
    pub async fn execute_active(&mut self, client: &ApiClient) -> Result<Option<&QueryResult>> {
        let Some(ticket) = self.begin_execution() else {
            return Ok(None);
        };

        let result = client.execute_sql(ticket.sql()).await?;
        if self.complete_execution(&ticket, result) {
            Ok(self.result.as_ref())
        } else {
            Ok(None)
        }
    }

    // ============================================
    // Charts
    // ============================================

    /// Add a chart under a freshly generated id, returning that id.
    ///
    /// The id carried by `definition` is ignored.
    pub fn add_chart(&mut self, mut definition: ChartDefinition) -> ChartId {
        let id = chart::next_chart_id(&self.charts, Utc::now().timestamp_millis());
        definition.id = id;
        tracing::debug!(chart_id = %id, chart_type = %definition.chart_type, "Chart added");
        self.charts.push(definition);
        id
    }

    /// Build a chart from the current result and add it
    pub fn build_chart(&mut self, request: &ChartRequest) -> Result<ChartId> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| Error::Chart("no table data available for charts".to_string()))?;
        let definition = chart::build_chart(result, request, ChartId(0))?;
        Ok(self.add_chart(definition))
    }

    /// Remove a chart. If it was on screen, the results view comes back.
    pub fn delete_chart(&mut self, id: ChartId) -> Result<ChartDefinition> {
        let index = self
            .charts
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::ChartNotFound(id))?;

        if self.active_view == ActiveView::Chart(id) {
            self.active_view = ActiveView::Results;
        }
        Ok(self.charts.remove(index))
    }

    pub fn select_chart(&mut self, id: ChartId) -> Result<()> {
        if self.chart(id).is_none() {
            return Err(Error::ChartNotFound(id));
        }
        self.active_view = ActiveView::Chart(id);
        Ok(())
    }

    pub fn select_results(&mut self) {
        self.active_view = ActiveView::Results;
    }

    // ============================================
    // Persistence
    // ============================================

    /// Body sent when saving this session under `title`
    pub fn to_payload<'a>(&'a self, title: &'a str) -> DashboardPayload<'a> {
        DashboardPayload {
            client_id: self.client_id,
            db_id: self.db_id,
            chats: &self.chats,
            charts: &self.charts,
            title,
        }
    }

    /// Save the session as a dashboard.
    ///
    /// Updates the existing dashboard when this session has one, otherwise
    /// creates it. Nothing changes locally unless the backend accepts the save.
    pub async fn save_dashboard(&mut self, client: &ApiClient, title: &str) -> Result<DashboardId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("dashboard title is required".to_string()));
        }

        let payload = self.to_payload(title);
        let saved = match self.dashboard_id {
            Some(id) => {
                client.update_dashboard(id, &payload).await?;
                id
            }
            None => client.create_dashboard(&payload).await?.id,
        };

        tracing::info!(
            dashboard_id = saved,
            chats = self.chats.len(),
            charts = self.charts.len(),
            "Dashboard saved"
        );

        self.dashboard_id = Some(saved);
        self.title = title.to_string();
        Ok(saved)
    }

    /// Replace this session's contents with a saved dashboard
    pub async fn load_dashboard(&mut self, client: &ApiClient, id: DashboardId) -> Result<()> {
        let dashboard = client.get_dashboard(id).await?;
        self.restore(dashboard);
        Ok(())
    }

    /// Replace chats, charts, title and database context in one step.
    ///
    /// Any execution still in flight is invalidated.
    pub fn restore(&mut self, dashboard: Dashboard) {
        tracing::info!(
            dashboard_id = dashboard.id,
            chats = dashboard.chats.len(),
            charts = dashboard.charts.len(),
            "Dashboard loaded"
        );

        self.dashboard_id = Some(dashboard.id);
        self.title = dashboard.title.unwrap_or_default();
        self.db_id = dashboard.db_id;
        self.db_name = dashboard.db_name;
        self.client_id = dashboard.client_id.or(self.client_id);
        self.chats = dashboard.chats;
        self.charts = dashboard.charts;
        self.active_query = None;
        self.result = None;
        self.active_view = ActiveView::Results;
        self.issued_sequence += 1;
    }

    /// Create a session from a saved dashboard
    pub fn from_dashboard(dashboard: Dashboard) -> Self {
        let mut session = Self::new(dashboard.db_id, dashboard.client_id);
        session.restore(dashboard);
        session
    }
}

/// Whether the "SQL" is really the backend refusing a modifying statement
pub fn is_read_only_refusal(sql: &str) -> bool {
    READ_ONLY_REFUSALS.iter().any(|marker| sql.contains(marker))
}
