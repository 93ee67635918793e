//! # querydeck-core
//!
//! Core library for querydeck - a client for a natural-language-to-SQL
//! analytics backend.
//!
//! This library provides:
//! - Domain types for chat turns, query results, charts, and dashboards
//! - The session state model and its save/load round-trip
//! - Chart construction and text presentation of results
//! - An HTTP client for the backend API
//! - Configuration, token storage, and logging infrastructure
//!
//! ## Architecture
//!
//! The backend owns everything that touches data: it classifies questions,
//! writes SQL, runs it, and stores dashboards. querydeck keeps the session in
//! memory and talks to the backend over JSON:
//! - **Ask:** question -> [`ChatTurn`] appended to the [`Session`]
//! - **Execute:** the active SQL -> [`QueryResult`] -> [`present::ResultView`]
//! - **Chart:** result columns -> [`ChartDefinition`]
//! - **Persist:** chats + charts <-> [`Dashboard`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use querydeck_core::{ApiClient, Config, Session, TokenStore};
//!
//! # async fn run() -> querydeck_core::Result<()> {
//! let config = Config::load()?;
//! let token = TokenStore::default_location().load()?;
//! let client = ApiClient::new(&config.api, token.as_ref().map(|t| t.access_token.as_str()))?;
//!
//! let mut session = Session::new(Some(1), token.and_then(|t| t.client_id));
//! session.ask(&client, "show total revenue").await?;
//! session.execute_active(&client).await?;
//! session.save_dashboard(&client, "Revenue").await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::ApiClient;
pub use auth::{StoredToken, TokenStore};
pub use chart::ChartRequest;
pub use config::Config;
pub use error::{Error, Result};
pub use session::{ActiveView, ExecutionTicket, Session};
pub use types::*;

// Public modules
pub mod api;
pub mod auth;
pub mod chart;
pub mod config;
pub mod error;
pub mod logging;
pub mod present;
pub mod session;
pub mod types;
