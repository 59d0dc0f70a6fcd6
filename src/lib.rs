//! # kanflow-core
//!
//! A multi-agent task orchestrator built atop a Kanban-style board. Two
//! cooperating control loops share a single board document:
//!
//! - the **spec generator** ([`spec_generator`]) watches a backlog of
//!   projects flagged for specification, enriches them via the
//!   [`context`] pipeline, and synthesizes a structured spec + task list
//!   through the [`llm`] fallback chain and the [`extract`] extractor;
//! - the **task runner** ([`runner`]) watches the `Queue` column, routes
//!   each task to a best-fit external CLI agent via [`router`], executes
//!   it under [`supervisor`] discipline, archives results with
//!   [`archiver`], and advances the task through its workflow state
//!   machine.
//!
//! Both loops read and write the board exclusively through [`board`]'s
//! `BoardStore` trait. Orchestration state that the board's free-text
//! model has no room for rides inside a task's description via the
//! [`meta`] codec.

/// Small HTTP control surface: health/status, agent listing, backup export.
pub mod api;
/// Typed access to the shared board document (remote, local-file, or in-memory).
pub mod board;
/// Workflow columns bootstrap (`Queue`, `Agent WIP`, `Review`).
pub mod columns;
/// Process-wide configuration loaded from the environment.
pub mod config;
/// System-wide tunables shared by both loops.
pub mod constants;
/// README/file-tree/manifest/document enrichment for the spec generator.
pub mod context;
/// Error types and handling.
pub mod error;
/// Structured `{spec, tasks}` extraction from free-form model output.
pub mod extract;
/// Primary/fallback LLM provider chain.
pub mod llm;
/// Free-memory sampling for RAM-floor backpressure.
pub mod mem;
/// Embedded agent-meta codec (the sentinel-delimited block in a task's description).
pub mod meta;
/// Core board data model.
pub mod models;
/// Agent Registry: hot-reloadable catalog of dispatchable CLI agents.
pub mod registry;
/// Router: picks an agent for a task.
pub mod router;
/// Task Runner Loop.
pub mod runner;
/// Spec Generator Loop.
pub mod spec_generator;
/// Task Supervisor: runs a registered agent as a bounded child process.
pub mod supervisor;
/// Per-task result archiving.
pub mod archiver;

pub use error::{CoreError, Result};
