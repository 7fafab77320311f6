//! Folio Core - Book model, rendering pipeline, and diff alignment
//!
//! This crate contains the core logic for folio, independent of any display
//! surface:
//! - Book/spread document model with JSON persistence
//! - Markdown rendering pipeline with protected math/diagram/code spans
//! - Engine trait seams for the diagram, math and highlighting collaborators
//! - Line-based diff alignment for side-by-side comparison
//! - Configuration management

pub mod book;
pub mod config;
pub mod diff;
pub mod engine;
pub mod html;
pub mod render;

#[cfg(feature = "highlight")]
pub mod highlight;

// Re-export commonly used types
pub use book::{Book, PageSide, Spread};
pub use config::{Config, ThemeVariant};
pub use diff::{compute_diff, render_diff_html, AlignedDiff, DiffLine, DiffLineKind};
pub use render::{prepare, RenderContext, Renderer};
