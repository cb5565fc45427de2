//! Mini Notion HTTP back-end.
//!
//! ## Overview
//!
//! Accounts sign in through an OAuth provider handled by the client, then
//! build templates (ordered lists of labelled fields) and write notes that
//! fill one section per template field. Once any note uses a template its
//! field structure is locked.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, CORS, ServerConfig)    │
//! │          │ <─────── │    └─ api.rs  (route handlers, Actor, ApiError)  │
//! └──────────┘   JSON   │         │                                        │
//!                       │         │ DbHandle::call(|db| service::...)      │
//!                       │         v                                        │
//!                       │  service.rs  (use cases, one transaction each)   │
//!                       │         │                                        │
//!                       │         │ mini_notion_common rules               │
//!                       │         v                                        │
//!                       │  db.rs  (NotionDb over rusqlite)                 │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! | Module    | Responsibility                                           |
//! |-----------|----------------------------------------------------------|
//! | `models`  | Request/response bodies and query strings                |
//! | `db`      | SQLite schema and queries via `DbHandle`                 |
//! | `service` | Ownership checks, validation, structural lock, logging   |
//!
//! ## Typical Request Flow (edit a used template)
//!
//! 1. `PUT /api/templates/{id}` → `api::update_template()`; the `Actor`
//!    extractor reads `X-Account-ID`.
//! 2. `service::update_template()` opens a transaction, loads the template
//!    with its usage flag and checks ownership.
//! 3. `plan_field_changes()` turns the submitted fields into deletes,
//!    updates and inserts, refusing anything but relabels while locked.
//! 4. The plan is applied and the refreshed template is returned; any error
//!    rolls the whole edit back.

pub mod api;
pub mod db;
pub mod models;
pub mod server;
pub mod service;
