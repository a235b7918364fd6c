//! # pdf-rag
//!
//! An HTTP front end that orchestrates a PDF question-answering system built
//! from external scripts. The scripts know nothing about each other; they
//! share a working directory and report back only through exit status,
//! stderr and stdout. This crate decides what runs, in which order, and
//! what their output means.
//!
//! ## Architecture
//!
//! ```text
//!   POST /upload                         POST /query {question}
//!        │                                      │
//!        │                              ┌───────┴────────┐
//!        │                              │ validate input │──▶ 400
//!        │                              └───────┬────────┘
//!        │                                      ▼
//!        │                              ┌────────────────┐
//!        │                              │ artifact probe │
//!        │                              └───┬────────┬───┘
//!        │                          missing │        │ present
//!        ▼                                  ▼        │
//!  ┌──────────────────────────────────────────────┐  │
//!  │ ingestion (exclusive gate)                   │  │
//!  │  extraction → preprocessing → embedding      │  │
//!  │  first failure stops the chain ─────────────────────▶ 500
//!  └──────────────────────┬───────────────────────┘  │
//!                         │                          ▼
//!                         │             ┌──────────────────────────┐
//!                         │             │ query unit (shared gate) │
//!                         │             │ last `{` line → JSON     │──▶ 500
//!                         ▼             └────────────┬─────────────┘
//!                  200 {message}                     ▼
//!                                            200 {answer, ...}
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration: paths, scripts, timeouts, output framing
//! - [`models`] - Processing units, unit results, query result and HTTP bodies
//! - [`error`] - `PipelineError` taxonomy and its HTTP status mapping
//! - [`process`] - `ProcessRunner` trait, the tokio child-process runner and a scripted fake (tests and `test-util` only)
//! - [`pipeline::artifact`] - Index artifact existence probe
//! - [`pipeline::ingest`] - Ordered, short-circuiting, mutually exclusive ingestion
//! - [`pipeline::query`] - Ingest-if-missing, run the query unit, parse its answer
//! - [`api`] - Axum handlers for `/upload` and `/query`
//! - [`state`] - Shared application state wiring the pipelines together

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod process;
pub mod state;
