// src/render/mod.rs

//! Text diagram of a plan and its per-task state.
//!
//! - [`diagram`] renders a Mermaid flowchart deterministically.
//! - [`cache`] memoizes renders by a structural hash of the input.

pub mod cache;
pub mod diagram;

pub use cache::DiagramCache;
pub use diagram::{render, sanitize_id};
