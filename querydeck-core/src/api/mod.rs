//! Analytics backend API
//!
//! querydeck never runs SQL or talks to a database itself. Questions, SQL
//! execution and dashboard persistence all go through the backend's JSON API,
//! authenticated with a bearer token obtained from `/users/login`.
//!
//! ## Usage
//!
//! Point querydeck at the backend in `~/.config/querydeck/config.toml`:
//!
//! ```toml
//! [api]
//! base_url = "https://analytics.example.com"
//! timeout_secs = 60
//! ```
//!
//! or export `QUERYDECK_API_URL`.

mod client;

pub use client::ApiClient;
