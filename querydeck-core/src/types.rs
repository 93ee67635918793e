//! Core domain types for querydeck
//!
//! These types mirror the JSON the analytics backend speaks, and the shape a
//! dashboard takes when it is saved and loaded again.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Intent** | Backend classification of a question (`sql_query`, `casual_chat`, ...) |
//! | **ChatTurn** | One answered question: the question, its intent and the backend's answer |
//! | **QueryResult** | Rows returned by executing one SQL statement (never persisted) |
//! | **ChartDefinition** | A chart built from a result's columns |
//! | **Dashboard** | Persisted bundle of chat turns and charts tied to one database |
//! | **Card** | Single-value KPI rendering of a one-row, one-field result |
//!
//! Chat turns and chart definitions must survive a save/load round-trip
//! unchanged, so their serde representation is the wire format.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// A result row: column name to value, in backend column order.
pub type Record = serde_json::Map<String, Value>;

/// Backend identifier of a saved dashboard.
pub type DashboardId = i64;

// ============================================
// Intent & Chat
// ============================================

/// Backend-classified category of a user question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SqlQuery,
    CasualChat,
    SarcasticResponse,
    /// Also used for intents this client does not recognise
    #[default]
    Ambiguous,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SqlQuery => "sql_query",
            Intent::CasualChat => "casual_chat",
            Intent::SarcasticResponse => "sarcastic_response",
            Intent::Ambiguous => "ambiguous",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sql_query" => Ok(Intent::SqlQuery),
            "casual_chat" => Ok(Intent::CasualChat),
            "sarcastic_response" => Ok(Intent::SarcasticResponse),
            "ambiguous" => Ok(Intent::Ambiguous),
            _ => Err(format!("unknown intent: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .and_then(|s| s.parse().ok())
            .unwrap_or(Intent::Ambiguous))
    }
}

/// Response of `POST /database/query`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub sql_query: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub filtered_tables: Option<Vec<String>>,
}

/// One answered question in the chat log.
///
/// Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_tables: Option<Vec<String>>,
}

impl ChatTurn {
    /// Build a turn from the question and the backend's classification
    pub fn from_response(question: impl Into<String>, response: QueryResponse) -> Self {
        Self {
            question: question.into(),
            intent: response.intent,
            sql_query: response.sql_query,
            response: response.response,
            filtered_tables: response.filtered_tables,
        }
    }

    /// SQL this turn contributes to the session, if any.
    ///
    /// Only `sql_query` intents drive execution.
    pub fn executable_sql(&self) -> Option<&str> {
        match self.intent {
            Intent::SqlQuery => self.sql_query.as_deref().filter(|s| !s.trim().is_empty()),
            _ => None,
        }
    }
}

// ============================================
// Query results
// ============================================

/// KPI card supplied by the backend (or derived for one-field results)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub label: String,
    pub value: Value,
}

/// Named sub-table supplied by the backend for grouped results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<Record>,
}

/// Response of `POST /database/execute-sql`.
///
/// Transient: replaced by the next execution and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<ResultTable>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Backend-supplied cards, empty when absent
    pub fn cards(&self) -> &[Card] {
        self.cards.as_deref().unwrap_or_default()
    }

    /// Backend-supplied sub-tables, empty when absent
    pub fn tables(&self) -> &[ResultTable] {
        self.tables.as_deref().unwrap_or_default()
    }
}

// ============================================
// Charts
// ============================================

/// Identifier of a chart within a session or dashboard.
///
/// Millisecond timestamps in practice; stored as a JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartId(pub i64);

impl std::fmt::Display for ChartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChartId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ChartId)
    }
}

/// Supported chart kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartType {
    Line,
    Bar,
    HorizontalBar,
    Pie,
    Doughnut,
    Area,
    Radar,
}

impl ChartType {
    pub const ALL: [ChartType; 7] = [
        ChartType::Line,
        ChartType::Bar,
        ChartType::HorizontalBar,
        ChartType::Pie,
        ChartType::Doughnut,
        ChartType::Area,
        ChartType::Radar,
    ];

    /// Identifier used on the wire
    pub fn id(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::HorizontalBar => "horizontalBar",
            ChartType::Pie => "pie",
            ChartType::Doughnut => "doughnut",
            ChartType::Area => "area",
            ChartType::Radar => "radar",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChartType::Line => "Line Chart",
            ChartType::Bar => "Bar Chart",
            ChartType::HorizontalBar => "Horizontal Bar",
            ChartType::Pie => "Pie Chart",
            ChartType::Doughnut => "Doughnut",
            ChartType::Area => "Area Chart",
            ChartType::Radar => "Radar Chart",
        }
    }

    /// Whether the chart has category/value axes (pie and doughnut do not)
    pub fn has_axis(&self) -> bool {
        !matches!(self, ChartType::Pie | ChartType::Doughnut)
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartType::ALL
            .iter()
            .copied()
            .find(|t| t.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown chart type: {}", s))
    }
}

/// Saved form of a chart type: the descriptor object dashboards already hold.
#[derive(Serialize)]
struct ChartTypeDescriptor {
    id: &'static str,
    name: &'static str,
    #[serde(rename = "hasAxis")]
    has_axis: bool,
}

impl Serialize for ChartType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ChartTypeDescriptor {
            id: self.id(),
            name: self.display_name(),
            has_axis: self.has_axis(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChartType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Id(String),
            Descriptor { id: String },
        }

        let id = match Wire::deserialize(deserializer)? {
            Wire::Id(id) | Wire::Descriptor { id } => id,
        };
        id.parse().map_err(de::Error::custom)
    }
}

/// Colours of one dataset, flattened into the dataset object on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatasetStyle {
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
}

impl DatasetStyle {
    /// Palette entry for the `index`-th dataset of a chart
    pub fn for_index(index: usize) -> Self {
        let hue = index * 60;
        Self {
            background_color: format!("hsla({}, 70%, 60%, 0.6)", hue),
            border_color: format!("hsla({}, 70%, 60%, 1)", hue),
            border_width: 2,
        }
    }
}

impl Default for DatasetStyle {
    fn default() -> Self {
        Self::for_index(0)
    }
}

/// One series of a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    #[serde(default, deserialize_with = "string_values")]
    pub data: Vec<String>,
    #[serde(flatten)]
    pub style: DatasetStyle,
}

/// Labels plus series; every dataset has one value per label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(default, deserialize_with = "string_values")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub datasets: Vec<Dataset>,
}

/// A user-created chart. Never edited in place; regenerate instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub id: ChartId,
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub data: ChartData,
}

// ============================================
// Dashboards
// ============================================

/// A persisted session as returned by `/dashboards`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: DashboardId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub db_id: Option<i64>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chats: Vec<ChatTurn>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub charts: Vec<ChartDefinition>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Dashboard {
    /// Title for display, "Untitled" when none was saved
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => "Untitled",
        }
    }
}

/// Body of `POST /dashboards` and `PUT /dashboards/{id}`.
///
/// Collections are always sent whole; the backend replaces what it had.
#[derive(Debug, Serialize)]
pub struct DashboardPayload<'a> {
    pub client_id: Option<i64>,
    pub db_id: Option<i64>,
    pub chats: &'a [ChatTurn],
    pub charts: &'a [ChartDefinition],
    pub title: &'a str,
}

// ============================================
// Accounts
// ============================================

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub client_id: Option<i64>,
}

impl User {
    /// Owners may manage connections and dashboards; viewers may only read
    pub fn is_owner(&self) -> bool {
        matches!(self.role.as_deref(), Some("internal_superuser") | Some("client"))
    }
}

/// Tenant the user belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientAccount {
    pub id: i64,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response of `POST /users/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub client: Option<ClientAccount>,
}

/// Response of `GET /users/me`
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub user: User,
    #[serde(default)]
    pub client: Option<ClientAccount>,
}

/// The subset of `GET /databases/{id}` used to label a session
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    pub id: i64,
    pub db_name: String,
}

// ============================================
// Serde helpers
// ============================================

/// Render a JSON value the way the dashboard UI stringifies chart values:
/// strings verbatim, integral floats without a fraction, `null` as "null".
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{}", f as i128)
            }
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(stringify_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Bool(_) => value.to_string(),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept numbers (older dashboards) as well as strings
fn string_values<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.iter().map(stringify_value).collect())
}

/// RFC 3339, or a naive timestamp taken as UTC; anything else becomes `None`
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }))
}
